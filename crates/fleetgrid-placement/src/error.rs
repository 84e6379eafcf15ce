//! Placement error types.

use thiserror::Error;

/// Result type alias for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors that can occur while refreshing placement decisions.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("failed to list placement decisions: {0}")]
    List(#[source] anyhow::Error),

    #[error("incorrect group index {value:?} on placement decision {decision}")]
    InvalidGroupIndex { decision: String, value: String },
}
