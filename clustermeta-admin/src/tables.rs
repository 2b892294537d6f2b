//! The set of system tables a node serves.

use crate::backend::ArtificialTableBackend;
use crate::config::AdminConfig;
use crate::server_config::ServerConfigBackend;
use crate::table_config::TableConfigBackend;
use clustermeta_cluster::ClusterNode;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the server configuration table.
pub const SERVER_CONFIG_TABLE: &str = "server_config";
/// Name of the table configuration table.
pub const TABLE_CONFIG_TABLE: &str = "table_config";

/// System table backends, by table name.
pub struct AdminTables {
    backends: BTreeMap<&'static str, Arc<dyn ArtificialTableBackend>>,
}

impl AdminTables {
    /// Builds every system table over `node`'s view.
    pub fn new(node: &ClusterNode, config: &AdminConfig) -> Self {
        let mut backends: BTreeMap<&'static str, Arc<dyn ArtificialTableBackend>> =
            BTreeMap::new();
        backends.insert(
            SERVER_CONFIG_TABLE,
            Arc::new(ServerConfigBackend::new(
                node.shared_view(),
                node.client().clone(),
            )),
        );
        backends.insert(
            TABLE_CONFIG_TABLE,
            Arc::new(TableConfigBackend::new(
                node.shared_view(),
                config.identifier_format,
            )),
        );
        Self { backends }
    }

    /// Looks up a system table by name.
    pub fn get(&self, table: &str) -> Option<&Arc<dyn ArtificialTableBackend>> {
        self.backends.get(table)
    }

    /// Names of every system table.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.backends.keys().copied()
    }
}
