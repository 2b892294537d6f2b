//! The `table_config` table: one row per table,
//! `{id, name, db, primary_key, shards: [{replicas, primary_replica}]}`.
//!
//! Tables are cluster-global, so a validated write is joined straight into
//! the local view and spreads from there; there is no owner to ask.

use crate::backend::ArtificialTableBackend;
use crate::config::IdentifierFormat;
use crate::datum::{
    self, check_interrupted, check_keys, database_to_datum, expect_object, parse_id,
    server_to_datum,
};
use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use clustermeta_cluster::{
    ClusterMetadata, Interruptor, ReplicationConfig, SemilatticeView, ShardConfig, TableMetadata,
};
use clustermeta_semilattice::Deletable;
use clustermeta_types::{DatabaseId, Name, TableId};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Primary key field of tables created without an explicit one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Renders a table's configuration as a row.
///
/// Databases and servers are shown by name or by UUID depending on
/// `format`, resolved against `snapshot`.
pub fn table_config_to_datum(
    table_id: TableId,
    table: &TableMetadata,
    format: IdentifierFormat,
    snapshot: &ClusterMetadata,
) -> Value {
    let shards: Vec<Value> = table
        .replication()
        .shards
        .iter()
        .map(|shard| {
            let replicas: Vec<Value> = shard
                .replicas
                .iter()
                .map(|server| server_to_datum(*server, format, snapshot))
                .collect();
            json!({
                "replicas": replicas,
                "primary_replica": server_to_datum(shard.primary_replica, format, snapshot),
            })
        })
        .collect();

    json!({
        "id": table_id.to_string(),
        "name": table.name().as_str(),
        "db": database_to_datum(table.database(), format, snapshot),
        "primary_key": table.primary_key(),
        "shards": shards,
    })
}

/// A fully validated `table_config` row.
struct TableRow {
    name: Name,
    database: DatabaseId,
    primary_key: Option<String>,
    replication: ReplicationConfig,
}

/// Backend for the `table_config` table.
pub struct TableConfigBackend {
    view: Arc<dyn SemilatticeView<ClusterMetadata>>,
    format: IdentifierFormat,
}

impl TableConfigBackend {
    pub fn new(view: Arc<dyn SemilatticeView<ClusterMetadata>>, format: IdentifierFormat) -> Self {
        Self { view, format }
    }

    fn parse_row(&self, value: &Value, snapshot: &ClusterMetadata) -> AdminResult<TableRow> {
        let row = expect_object(value, "a `table_config` row")?;
        check_keys(
            row,
            "a `table_config` row",
            &["id", "name", "db", "shards"],
            &["primary_key"],
        )?;

        let name = datum::to_name(datum::field(row, "name"), "`name`")?;
        let database = datum::database_from_datum(datum::field(row, "db"), self.format, snapshot)?;
        let primary_key = match row.get("primary_key") {
            Some(value) => Some(datum::to_str(value, "`primary_key`")?.to_string()),
            None => None,
        };
        let replication = self.parse_shards(datum::field(row, "shards"), snapshot)?;

        Ok(TableRow {
            name,
            database,
            primary_key,
            replication,
        })
    }

    fn parse_shards(&self, value: &Value, snapshot: &ClusterMetadata) -> AdminResult<ReplicationConfig> {
        let items = datum::to_array(value, "`shards`")?;
        if items.is_empty() {
            return Err(AdminError::Validation(
                "a table must have at least one shard".to_string(),
            ));
        }

        let mut shards = Vec::with_capacity(items.len());
        for item in items {
            let shard = expect_object(item, "a shard")?;
            check_keys(shard, "a shard", &["replicas", "primary_replica"], &[])?;

            let mut replicas = BTreeSet::new();
            for replica in datum::to_array(datum::field(shard, "replicas"), "`replicas`")? {
                let server = datum::server_from_datum(replica, self.format, snapshot)?;
                if !replicas.insert(server) {
                    return Err(AdminError::Validation(format!(
                        "server {replica} is listed as a replica twice"
                    )));
                }
            }
            let primary_replica = datum::server_from_datum(
                datum::field(shard, "primary_replica"),
                self.format,
                snapshot,
            )?;
            if !replicas.contains(&primary_replica) {
                return Err(AdminError::Validation(
                    "a shard's `primary_replica` must also be one of its `replicas`".to_string(),
                ));
            }
            shards.push(ShardConfig {
                replicas,
                primary_replica,
            });
        }
        Ok(ReplicationConfig { shards })
    }
}

#[async_trait]
impl ArtificialTableBackend for TableConfigBackend {
    fn primary_key_name(&self) -> &str {
        "id"
    }

    async fn read_all_rows(&self, interruptor: &Interruptor) -> AdminResult<Vec<Value>> {
        check_interrupted(interruptor)?;
        let snapshot = self.view.get();
        Ok(snapshot
            .tables()
            .iter()
            .map(|(id, table)| table_config_to_datum(*id, table, self.format, &snapshot))
            .collect())
    }

    async fn read_row(
        &self,
        primary_key: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<Option<Value>> {
        check_interrupted(interruptor)?;
        let Some(table_id) = parse_id::<TableId>(primary_key) else {
            return Ok(None);
        };
        let snapshot = self.view.get();
        Ok(snapshot
            .tables()
            .get(&table_id)
            .map(|table| table_config_to_datum(table_id, table, self.format, &snapshot)))
    }

    async fn write_row(
        &self,
        primary_key: &Value,
        pkey_was_autogenerated: bool,
        new_value: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        check_interrupted(interruptor)?;
        let snapshot = self.view.get();

        let Some(table_id) = parse_id::<TableId>(primary_key) else {
            return if new_value.is_null() {
                Ok(())
            } else {
                Err(AdminError::Validation(format!(
                    "`id` must be a UUID, got {primary_key}"
                )))
            };
        };
        let entry = snapshot.tables().entry(&table_id).cloned();
        let current = entry.as_ref().and_then(Deletable::get);

        if new_value.is_null() {
            let Some(mut entry) = entry.filter(|e| !e.is_deleted()) else {
                return Ok(());
            };
            check_interrupted(interruptor)?;
            let version = entry.delete();
            info!(%table_id, %version, "dropping table through table_config");
            self.view.join(&ClusterMetadata::table_delta(table_id, entry));
            return Ok(());
        }

        let row = self.parse_row(new_value, &snapshot)?;
        if datum::field(expect_object(new_value, "a `table_config` row")?, "id") != primary_key {
            return Err(AdminError::Validation(
                "it's illegal to change a table's `id`".to_string(),
            ));
        }
        if snapshot
            .table_ids_named(row.database, &row.name)
            .iter()
            .any(|id| *id != table_id)
        {
            return Err(AdminError::Conflict(format!(
                "table `{}` already exists in that database",
                row.name
            )));
        }

        let updated = match current {
            Some(table) => {
                if row
                    .primary_key
                    .as_deref()
                    .is_some_and(|pkey| pkey != table.primary_key())
                {
                    return Err(AdminError::Validation(
                        "it's illegal to change a table's `primary_key`".to_string(),
                    ));
                }
                let mut table = table.clone();
                if *table.name() != row.name {
                    table.rename(row.name);
                }
                if table.database() != row.database {
                    table.move_to(row.database);
                }
                if *table.replication() != row.replication {
                    table.set_replication(row.replication);
                }
                table
            }
            None => TableMetadata::new(
                row.name,
                row.database,
                row.primary_key
                    .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
                row.replication,
            ),
        };

        let entry = match entry {
            Some(mut entry) if entry.is_deleted() => {
                entry.recreate(updated);
                entry
            }
            Some(entry) if entry.get() == Some(&updated) => return Ok(()),
            Some(entry) => Deletable::with_version(Some(updated), entry.version()),
            None => Deletable::present(updated),
        };

        check_interrupted(interruptor)?;
        info!(
            %table_id,
            autogenerated_id = pkey_was_autogenerated,
            "writing table through table_config"
        );
        self.view.join(&ClusterMetadata::table_delta(table_id, entry));
        Ok(())
    }
}
