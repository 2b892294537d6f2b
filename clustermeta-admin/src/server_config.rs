//! The `server_config` table: one row per server, `{id, name, tags}`.
//!
//! Rows are read straight from the local view. Writes are turned into
//! rename and retag commands to the server's owner; the new values show up
//! in the view once the owner's update has been joined here.

use crate::backend::ArtificialTableBackend;
use crate::datum::{
    self, check_interrupted, check_keys, expect_object, name_set_to_datum, parse_id,
};
use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use clustermeta_cluster::{
    ClusterMetadata, Interruptor, SemilatticeView, ServerConfigClient, ServerMetadata,
};
use clustermeta_types::ServerId;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Backend for the `server_config` table.
pub struct ServerConfigBackend {
    view: Arc<dyn SemilatticeView<ClusterMetadata>>,
    client: ServerConfigClient,
}

impl ServerConfigBackend {
    pub fn new(view: Arc<dyn SemilatticeView<ClusterMetadata>>, client: ServerConfigClient) -> Self {
        Self { view, client }
    }

    /// Renders one server as a row.
    pub fn format_row(server_id: ServerId, server: &ServerMetadata) -> Value {
        json!({
            "id": server_id.to_string(),
            "name": server.name().as_str(),
            "tags": name_set_to_datum(server.tags()),
        })
    }
}

#[async_trait]
impl ArtificialTableBackend for ServerConfigBackend {
    fn primary_key_name(&self) -> &str {
        "id"
    }

    async fn read_all_rows(&self, interruptor: &Interruptor) -> AdminResult<Vec<Value>> {
        check_interrupted(interruptor)?;
        let snapshot = self.view.get();
        Ok(snapshot
            .servers()
            .iter()
            .map(|(id, server)| Self::format_row(*id, server))
            .collect())
    }

    async fn read_row(
        &self,
        primary_key: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<Option<Value>> {
        check_interrupted(interruptor)?;
        let Some(server_id) = parse_id::<ServerId>(primary_key) else {
            return Ok(None);
        };
        let snapshot = self.view.get();
        Ok(snapshot
            .servers()
            .get(&server_id)
            .map(|server| Self::format_row(server_id, server)))
    }

    async fn write_row(
        &self,
        primary_key: &Value,
        _pkey_was_autogenerated: bool,
        new_value: &Value,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        check_interrupted(interruptor)?;
        let snapshot = self.view.get();
        let existing = parse_id::<ServerId>(primary_key)
            .and_then(|id| snapshot.servers().get(&id).map(|server| (id, server)));

        let Some((server_id, current)) = existing else {
            return if new_value.is_null() {
                Ok(())
            } else {
                Err(AdminError::Validation(
                    "it's illegal to insert new rows into `server_config`; \
                     servers join the cluster by starting up"
                        .to_string(),
                ))
            };
        };
        if new_value.is_null() {
            return Err(AdminError::Validation(
                "it's illegal to delete rows from `server_config`; \
                 a server leaves the cluster by shutting down"
                    .to_string(),
            ));
        }

        let row = expect_object(new_value, "a `server_config` row")?;
        check_keys(row, "a `server_config` row", &["id", "name", "tags"], &[])?;
        if datum::field(row, "id") != primary_key {
            return Err(AdminError::Validation(
                "it's illegal to change a server's `id`".to_string(),
            ));
        }
        let name = datum::to_name(datum::field(row, "name"), "`name`")?;
        let tags = datum::to_name_set(datum::field(row, "tags"), "`tags`")?;

        if *current.name() != name
            && snapshot
                .server_ids_named(&name)
                .iter()
                .any(|id| *id != server_id)
        {
            return Err(AdminError::Conflict(format!(
                "server `{name}` already exists"
            )));
        }

        if *current.name() != name {
            debug!(%server_id, %name, "renaming server through server_config");
            self.client.rename_server(server_id, name, interruptor).await?;
        }
        if *current.tags() != tags {
            debug!(%server_id, "retagging server through server_config");
            self.client.retag_server(server_id, tags, interruptor).await?;
        }
        Ok(())
    }
}
