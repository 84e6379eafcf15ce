//! Rollout error types.

use thiserror::Error;

/// Result type alias for rollout operations.
pub type Result<T, E = RolloutError> = std::result::Result<T, E>;

/// Errors that can occur while computing a rollout.
///
/// Everything except `Status` is a configuration error: retrying the same
/// strategy will fail the same way.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("invalid timeout {0:?}: expected \"None\" or a duration like 90s, 5m, 2h")]
    InvalidTimeout(String),

    #[error("invalid max concurrency {0:?}: expected an integer or a percentage")]
    InvalidMaxConcurrency(String),

    #[error("unsupported rollout strategy type {0:?}")]
    UnsupportedRolloutType(String),

    #[error("failed to get rollout status of cluster {cluster}: {source}")]
    Status {
        cluster: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid rollout strategy document: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
