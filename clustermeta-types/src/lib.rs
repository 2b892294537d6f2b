//! Core type definitions for clustermeta.
//!
//! This crate defines the fundamental types shared by the metadata,
//! RPC and admin layers:
//! - Resource and peer identifiers (UUID v7)
//! - Validated resource names
//! - Logical versions for replicated fields

mod ids;
mod name;
mod version;

pub use ids::{DatabaseId, PeerId, ServerId, TableId};
pub use name::{MAX_NAME_LEN, Name};
pub use version::Version;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
