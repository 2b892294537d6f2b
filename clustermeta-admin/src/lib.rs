//! System tables over replicated cluster metadata.
//!
//! Each system table is an [`ArtificialTableBackend`]: its rows are
//! rendered on demand from a snapshot of the local metadata view, and row
//! writes are validated in full before being turned into owner commands
//! (`server_config`) or direct joins (`table_config`).
//!
//! Rows are `serde_json::Value`s. Whether rows name related databases and
//! servers by name or by UUID is set by [`IdentifierFormat`].

mod backend;
mod config;
mod datum;
mod error;
mod server_config;
mod table_config;
mod tables;

pub use backend::ArtificialTableBackend;
pub use config::{AdminConfig, IdentifierFormat};
pub use error::{AdminError, AdminResult};
pub use server_config::ServerConfigBackend;
pub use table_config::{DEFAULT_PRIMARY_KEY, TableConfigBackend, table_config_to_datum};
pub use tables::{AdminTables, SERVER_CONFIG_TABLE, TABLE_CONFIG_TABLE};
