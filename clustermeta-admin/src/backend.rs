//! The interface the query layer uses to read and write system tables.

use crate::error::AdminResult;
use async_trait::async_trait;
use clustermeta_cluster::Interruptor;
use serde_json::Value;

/// A table whose rows are computed from cluster metadata rather than
/// stored.
///
/// Reads see a single snapshot of the local metadata view, so a row never
/// shows a half-merged record. Writes validate the whole row before
/// changing anything.
#[async_trait]
pub trait ArtificialTableBackend: Send + Sync {
    /// Name of the primary key field in every row.
    fn primary_key_name(&self) -> &str;

    /// Returns every row.
    async fn read_all_rows(&self, interruptor: &Interruptor) -> AdminResult<Vec<Value>>;

    /// Returns the row with `primary_key`, or `None` if there is none.
    async fn read_row(
        &self,
        primary_key: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<Option<Value>>;

    /// Replaces the row with `primary_key` by `new_value`. `Value::Null`
    /// deletes the row. `pkey_was_autogenerated` is set when the query
    /// layer made up the key for an insert.
    async fn write_row(
        &self,
        primary_key: &Value,
        pkey_was_autogenerated: bool,
        new_value: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<()>;
}
