// The node evaluator contract.
//
// A `NodeEvaluator` turns terrain into search nodes for one kind of mover:
// it resolves the start node, creates goal targets, enumerates admissible
// neighbors, and classifies voxels. It owns the per-search `NodeGraph`, so
// every node the driver sees comes from the evaluator's table.
//
// Lifecycle per search: `prepare(start)` → `start_node` / `goal` /
// `neighbors` → `done()`. The terrain is passed into each call that reads
// it rather than bound at `prepare`, so an evaluator holds no borrow
// between searches and stays `Send` + serializable for offloading.
//
// See also: `walk.rs` for the ground-walking implementation,
// `pathfinding.rs` for the driver that calls these methods.

use smallvec::SmallVec;

use crate::node::{NodeGraph, NodeId, Target};
use crate::path_type::{PathType, PathTypeCostMap};
use crate::terrain::TerrainSampler;
use crate::types::{Vec3, VoxelCoord};

/// Neighbor list returned by `NodeEvaluator::neighbors`: four orthogonal
/// plus four diagonal moves at most.
pub type Neighbors = SmallVec<[NodeId; 8]>;

pub trait NodeEvaluator {
    /// Reset per-search state and anchor the search at `start`, the mover's
    /// current world position. Preparing twice without `done()` discards the
    /// previous search's state with a warning.
    fn prepare(&mut self, start: Vec3);

    /// Release per-search state: node table and classification cache.
    fn done(&mut self);

    /// The walkable node the search starts from.
    fn start_node(&mut self, terrain: &dyn TerrainSampler) -> NodeId;

    /// A target at `coord`, sharing the node table entry for that voxel.
    fn goal(&mut self, coord: VoxelCoord) -> Target {
        let id = self.graph_mut().get_or_create(coord);
        Target::new(id, coord)
    }

    /// Admissible moves out of `node`. Order only affects tie-breaking.
    fn neighbors(&mut self, terrain: &dyn TerrainSampler, node: NodeId) -> Neighbors;

    /// Classification of `coord`, memoized for the rest of the search.
    fn cached_path_type(&mut self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType;

    /// Classification of `coord` without touching the cache.
    fn path_type(&self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType;

    fn costs(&self) -> &PathTypeCostMap;

    fn graph(&self) -> &NodeGraph;

    fn graph_mut(&mut self) -> &mut NodeGraph;
}
