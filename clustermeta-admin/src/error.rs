//! Errors surfaced to the query layer.

use clustermeta_cluster::ClusterError;
use thiserror::Error;

/// Result type for system table operations.
pub type AdminResult<T> = Result<T, AdminError>;

/// Why a row read or write failed.
///
/// A failed write never leaves a partial row behind, except after
/// [`AdminError::Interrupted`], whose outcome is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The row is malformed or asks for something this table doesn't allow.
    #[error("{0}")]
    Validation(String),

    /// The row collides with other resources or references one that
    /// doesn't exist.
    #[error("{0}")]
    Conflict(String),

    /// The caller gave up before the write finished.
    #[error("the operation was interrupted")]
    Interrupted,
}

impl From<ClusterError> for AdminError {
    fn from(e: ClusterError) -> Self {
        match e {
            ClusterError::Validation(reason) => Self::Validation(reason),
            ClusterError::Conflict(reason) => Self::Conflict(reason),
            ClusterError::Interrupted | ClusterError::ChannelClosed => Self::Interrupted,
            ClusterError::Codec(e) => Self::Validation(format!("malformed value: {e}")),
        }
    }
}

impl From<clustermeta_types::Error> for AdminError {
    fn from(e: clustermeta_types::Error) -> Self {
        Self::Validation(e.to_string())
    }
}
