// Search nodes and the per-search node arena.
//
// A `Node` is the search-scoped state for one voxel coordinate: cost so far
// (`g`), heuristic (`h`), total (`f`), back-pointer, open-set position,
// closed flag, walked distance, and the terrain classification with its
// malus. Nodes live in a `NodeGraph` arena and refer to each other by
// `NodeId` index, so back-pointers and open-set membership are plain
// integers and no reference cycles exist.
//
// `NodeGraph` is the coordinate→node table: `get_or_create` always returns
// the same `NodeId` for a given coordinate within one search, which is what
// lets the open set assume it never holds two entries for one voxel. The
// key is `VoxelCoord::pack()`.
//
// `Target` wraps a goal node with best-effort tracking: the lowest raw
// heuristic seen over the whole search and the node it came from.
//
// See also: `open_set.rs` for the heap over `NodeId`s, `evaluator.rs` for
// the owner of the graph, `pathfinding.rs` for the search loop.
//
// **Critical constraint: lifetime.** A graph belongs to exactly one search.
// It is cleared by `NodeEvaluator::prepare`/`done`; ids from a previous
// search are meaningless afterwards.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::path_type::PathType;
use crate::types::VoxelCoord;

/// Index of a node in its `NodeGraph`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Search state for one voxel coordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub coord: VoxelCoord,
    /// Position in the open set's heap; `None` when not in the open set.
    pub heap_idx: Option<usize>,
    pub g: f32,
    pub h: f32,
    pub f: f32,
    pub came_from: Option<NodeId>,
    pub closed: bool,
    /// Euclidean length of the route from the start to here.
    pub walked_distance: f32,
    pub cost_malus: f32,
    pub path_type: PathType,
}

impl Node {
    pub fn new(coord: VoxelCoord) -> Self {
        Self {
            coord,
            heap_idx: None,
            g: 0.0,
            h: 0.0,
            f: 0.0,
            came_from: None,
            closed: false,
            walked_distance: 0.0,
            cost_malus: 0.0,
            path_type: PathType::Blocked,
        }
    }

    pub fn in_open_set(&self) -> bool {
        self.heap_idx.is_some()
    }

    /// Straight-line distance to another node's voxel.
    pub fn distance_to(&self, other: &Node) -> f32 {
        self.coord.distance(other.coord)
    }

    pub fn manhattan_distance(&self, coord: VoxelCoord) -> u32 {
        self.coord.manhattan_distance(coord)
    }
}

/// A search goal with best-effort tracking.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub node: NodeId,
    pub coord: VoxelCoord,
    /// Lowest raw heuristic from any evaluated node to this target.
    pub best_heuristic: f32,
    /// The node that produced `best_heuristic`.
    pub best_node: Option<NodeId>,
    /// The closed node that came within reach range, once one has.
    pub reached_by: Option<NodeId>,
}

impl Target {
    pub fn new(node: NodeId, coord: VoxelCoord) -> Self {
        Self {
            node,
            coord,
            best_heuristic: f32::INFINITY,
            best_node: None,
            reached_by: None,
        }
    }

    /// Record `node` as the closest approach if `heuristic` beats the best
    /// so far. Ties keep the earlier node.
    pub fn update_best(&mut self, heuristic: f32, node: NodeId) {
        if heuristic < self.best_heuristic {
            self.best_heuristic = heuristic;
            self.best_node = Some(node);
        }
    }

    pub fn set_reached(&mut self, by: NodeId) {
        self.reached_by = Some(by);
    }

    pub fn reached(&self) -> bool {
        self.reached_by.is_some()
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Coordinate→node table for one search.
#[derive(Clone, Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    by_coord: FxHashMap<u64, NodeId>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node for `coord`, creating it on first use.
    pub fn get_or_create(&mut self, coord: VoxelCoord) -> NodeId {
        let nodes = &mut self.nodes;
        *self.by_coord.entry(coord.pack()).or_insert_with(|| {
            let id = NodeId(nodes.len() as u32);
            nodes.push(Node::new(coord));
            id
        })
    }

    pub fn find(&self, coord: VoxelCoord) -> Option<NodeId> {
        self.by_coord.get(&coord.pack()).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_coord.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}
