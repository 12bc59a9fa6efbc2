// The result of a search.
//
// A `Path` is the node sequence from the start to either the target (when
// `reached`) or the closest approach found. Nodes are copied out of the
// search's `NodeGraph`, so a path outlives the evaluator state it came
// from and can be handed across threads.
//
// The node list is fixed at construction apart from `truncate_nodes`. A
// follower walks it with the `next_node_index` cursor (`advance`,
// `next_node`, `is_done`).
//
// See also: `pathfinding.rs` which builds paths via `reconstruct_path`.

use std::fmt;

use crate::node::Node;
use crate::types::VoxelCoord;

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    nodes: Vec<Node>,
    target: VoxelCoord,
    reached: bool,
    /// Nodes expanded by the search that produced this path.
    visited_nodes: u32,
    next_node_index: usize,
}

impl Path {
    pub fn new(nodes: Vec<Node>, target: VoxelCoord, reached: bool) -> Self {
        Self {
            nodes,
            target,
            reached,
            visited_nodes: 0,
            next_node_index: 0,
        }
    }

    pub fn with_visited_nodes(mut self, visited_nodes: u32) -> Self {
        self.visited_nodes = visited_nodes;
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn coords(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        self.nodes.iter().map(|n| n.coord)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The literal goal position, whether or not it was reached.
    pub fn target(&self) -> VoxelCoord {
        self.target
    }

    pub fn reached(&self) -> bool {
        self.reached
    }

    /// Same as `reached()`: true if the path ends within reach range of the
    /// target.
    pub fn can_reach(&self) -> bool {
        self.reached
    }

    pub fn visited_nodes(&self) -> u32 {
        self.visited_nodes
    }

    pub fn next_node_index(&self) -> usize {
        self.next_node_index
    }

    pub fn set_next_node_index(&mut self, index: usize) {
        self.next_node_index = index;
    }

    pub fn advance(&mut self) {
        self.next_node_index += 1;
    }

    pub fn is_done(&self) -> bool {
        self.next_node_index >= self.nodes.len()
    }

    pub fn next_node(&self) -> Option<&Node> {
        self.nodes.get(self.next_node_index)
    }

    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn end_node(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Manhattan distance from the last node to the target; infinite for an
    /// empty path.
    pub fn dist_to_target(&self) -> f32 {
        self.end_node()
            .map_or(f32::INFINITY, |n| n.manhattan_distance(self.target) as f32)
    }

    /// Drop nodes past `len`.
    pub fn truncate_nodes(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// True if both paths visit the same coordinates in the same order.
    pub fn same_as(&self, other: &Path) -> bool {
        self.nodes.len() == other.nodes.len() && self.coords().eq(other.coords())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Path[{} nodes to {}, reached={}]",
            self.nodes.len(),
            self.target,
            self.reached
        )
    }
}
