// Errors raised when submitting an offloaded search.
//
// Both variants are reported by `find_path_offloaded` itself, before any
// worker exists. Once a worker is running, nothing it does is surfaced as
// an error: a request that cannot be decoded is logged and the task ends in
// `TaskStatus::Failed`, and a missing terrain region is treated as absent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("failed to encode search request: {0}")]
    Encode(#[from] bincode::Error),
    #[error("failed to spawn path worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OffloadError>;
