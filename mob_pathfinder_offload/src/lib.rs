// mob_pathfinder_offload: run mob_pathfinder searches on a worker thread.
//
// The caller's thread keeps the live world. A search submitted with
// `find_path_offloaded` takes a snapshot of the terrain between start and
// goal, ships it with the evaluator to a worker thread, and returns a
// `PathTask`. The owner then polls the task; each poll answers the worker's
// requests for terrain outside the snapshot and, once the search is done,
// hands the path to the completion callback.
//
// Module overview:
// - `snapshot.rs`: RegionPos, Chunk, SnapshotSampler, and the blocking
//                  region fetch (RegionLink).
// - `task.rs`:     find_path_offloaded, PathTask, TaskStatus.
// - `error.rs`:    OffloadError.
//
// **Critical constraint: one owner thread.** A `PathTask` is not `Send`; the
// completion callback runs on whichever thread polls it, and that thread
// must also be the one that owns the world being served.

pub mod error;
pub mod snapshot;
pub mod task;

pub use error::OffloadError;
pub use snapshot::{Chunk, RegionPos, SnapshotSampler};
pub use task::{PathTask, TaskStatus, find_path_offloaded};
