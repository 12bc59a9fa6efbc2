// Error types for configuration loading.
//
// Searches themselves never fail: an unreached target or an exhausted node
// budget is a normal `Path` with `reached == false`. The only fallible
// surface in the core is turning JSON into a validated `PathfinderConfig`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse pathfinder config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
