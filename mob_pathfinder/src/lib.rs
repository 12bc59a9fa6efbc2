// mob_pathfinder: cost-weighted pathfinding for mobs in a 3D voxel world.
//
// This crate finds walking routes for entities through voxel terrain. Cells
// are not uniform: each voxel is classified (open, walkable, water, fence,
// lava, door, ...) and every classification carries a malus that is added
// to the route cost or forbids the cell outright. The search is A* over a
// node graph built lazily as the frontier reaches new voxels, bounded by a
// visit budget and a distance limit, and falls back to the closest approach
// when the goal cannot be reached.
//
// Module overview:
// - `types.rs`:       VoxelCoord, Vec3, Aabb, Facing.
// - `voxel.rs`:       Voxel identities, collision shapes, medium passability.
// - `terrain.rs`:     TerrainSampler trait + dense in-memory VoxelWorld.
// - `path_type.rs`:   PathType classifications, default maluses, cost overrides.
// - `node.rs`:        Node, Target, and the per-search NodeGraph arena.
// - `open_set.rs`:    Indexed binary min-heap with change-cost.
// - `evaluator.rs`:   NodeEvaluator trait (start, goal, neighbors, classification).
// - `walk.rs`:        WalkNodeEvaluator: classification and step/jump/fall rules.
// - `pathfinding.rs`: Search driver: find_path, find_path_to_any, search.
// - `path.rs`:        Path result with a follower cursor.
// - `config.rs`:      MobProfile, SearchLimits, PathfinderConfig (JSON).
// - `error.rs`:       ConfigError.
//
// The companion crate `mob_pathfinder_offload` runs the same search on a
// worker thread against a terrain snapshot.
//
// **Critical constraint: single-threaded searches.** A search runs start to
// finish on one thread with no suspension points. Evaluators own their node
// table and cache for exactly one search at a time; run concurrent searches
// with separate evaluators.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod node;
pub mod open_set;
pub mod path;
pub mod path_type;
pub mod pathfinding;
pub mod terrain;
pub mod types;
pub mod voxel;
pub mod walk;

pub use config::{EntitySize, MobProfile, PathfinderConfig, SearchLimits};
pub use error::ConfigError;
pub use evaluator::NodeEvaluator;
pub use node::{Node, NodeGraph, NodeId, Target};
pub use path::Path;
pub use path_type::{PathType, PathTypeCostMap, PathTypeSet};
pub use pathfinding::{find_path, find_path_to_any, reconstruct_path, search};
pub use terrain::{TerrainSampler, VoxelWorld};
pub use types::{Aabb, Facing, Vec3, VoxelCoord};
pub use voxel::{DoorMaterial, Liquid, TraversalMedium, Voxel, is_pathfindable};
pub use walk::WalkNodeEvaluator;
