//! Error types for the cluster layer.

use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur in cluster operations.
///
/// Join never produces an error; everything here comes from the RPC and
/// validation boundary.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The command or value is malformed or semantically invalid. Retrying
    /// the same request won't help.
    #[error("validation error: {0}")]
    Validation(String),

    /// The request collides with current state (name taken, referenced
    /// resource missing). Re-read and retry may succeed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's interruptor fired before the operation finished. The
    /// remote side may or may not have applied the command.
    #[error("operation interrupted")]
    Interrupted,

    /// Wire data could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A local channel closed while the operation was waiting on it.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<clustermeta_types::Error> for ClusterError {
    fn from(e: clustermeta_types::Error) -> Self {
        Self::Validation(e.to_string())
    }
}
