//! Replicated cluster metadata records.
//!
//! Each record is a bundle of independently versioned fields, so
//! concurrent edits to different fields merge without clobbering each
//! other. The whole cluster state is three keyed maps of deletable records.
//!
//! Server records are owned by the server they describe: their fields can
//! only be changed from inside this crate, by that server's
//! [`ServerConfigServer`](crate::ServerConfigServer). Databases and tables
//! are cluster-global and may be changed by any node.

use crate::business_card::ServerConfigBusinessCard;
use clustermeta_semilattice::{Deletable, MetadataMap, Semilattice, Versioned};
use clustermeta_types::{DatabaseId, Name, ServerId, TableId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the cluster knows about one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    name: Versioned<Name>,
    tags: Versioned<BTreeSet<Name>>,
    config_card: Versioned<ServerConfigBusinessCard>,
}

impl ServerMetadata {
    fn from_parts(
        name: Versioned<Name>,
        tags: Versioned<BTreeSet<Name>>,
        config_card: Versioned<ServerConfigBusinessCard>,
    ) -> Self {
        Self {
            name,
            tags,
            config_card,
        }
    }

    pub(crate) fn seed(name: Name, tags: BTreeSet<Name>, card: ServerConfigBusinessCard) -> Self {
        Self::from_parts(Versioned::new(name), Versioned::new(tags), Versioned::new(card))
    }

    /// The server's name.
    pub fn name(&self) -> &Name {
        self.name.value()
    }

    /// The server's tag set.
    pub fn tags(&self) -> &BTreeSet<Name> {
        self.tags.value()
    }

    /// How to reach the server's configuration owner.
    pub fn config_card(&self) -> &ServerConfigBusinessCard {
        self.config_card.value()
    }

    /// The versioned name field.
    pub fn versioned_name(&self) -> &Versioned<Name> {
        &self.name
    }

    /// The versioned tags field.
    pub fn versioned_tags(&self) -> &Versioned<BTreeSet<Name>> {
        &self.tags
    }

    /// The versioned business card field.
    pub fn versioned_config_card(&self) -> &Versioned<ServerConfigBusinessCard> {
        &self.config_card
    }

    pub(crate) fn set_name(&mut self, name: Name) -> Version {
        self.name.update(name)
    }

    pub(crate) fn set_tags(&mut self, tags: BTreeSet<Name>) -> Version {
        self.tags.update(tags)
    }

    pub(crate) fn set_config_card(&mut self, card: ServerConfigBusinessCard) -> Version {
        self.config_card.update(card)
    }
}

impl Semilattice for ServerMetadata {
    fn join(&mut self, other: &Self) {
        self.name.join(&other.name);
        self.tags.join(&other.tags);
        self.config_card.join(&other.config_card);
    }
}

/// What the cluster knows about one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    name: Versioned<Name>,
}

impl DatabaseMetadata {
    /// Creates a database record at version zero.
    #[must_use]
    pub fn new(name: Name) -> Self {
        Self {
            name: Versioned::new(name),
        }
    }

    pub fn name(&self) -> &Name {
        self.name.value()
    }

    /// Renames the database. Returns the new field version.
    pub fn rename(&mut self, name: Name) -> Version {
        self.name.update(name)
    }
}

impl Semilattice for DatabaseMetadata {
    fn join(&mut self, other: &Self) {
        self.name.join(&other.name);
    }
}

/// Placement of one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Servers holding a copy of the shard.
    pub replicas: BTreeSet<ServerId>,
    /// The replica that accepts writes. Always one of `replicas`.
    pub primary_replica: ServerId,
}

/// Sharding and replication layout of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub shards: Vec<ShardConfig>,
}

impl ReplicationConfig {
    /// Returns every server referenced by any shard.
    pub fn servers(&self) -> BTreeSet<ServerId> {
        self.shards
            .iter()
            .flat_map(|shard| shard.replicas.iter().copied().chain([shard.primary_replica]))
            .collect()
    }
}

/// What the cluster knows about one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    name: Versioned<Name>,
    database: Versioned<DatabaseId>,
    primary_key: Versioned<String>,
    replication: Versioned<ReplicationConfig>,
}

impl TableMetadata {
    /// Creates a table record with every field at version zero.
    #[must_use]
    pub fn new(
        name: Name,
        database: DatabaseId,
        primary_key: impl Into<String>,
        replication: ReplicationConfig,
    ) -> Self {
        Self {
            name: Versioned::new(name),
            database: Versioned::new(database),
            primary_key: Versioned::new(primary_key.into()),
            replication: Versioned::new(replication),
        }
    }

    pub fn name(&self) -> &Name {
        self.name.value()
    }

    pub fn database(&self) -> DatabaseId {
        *self.database.value()
    }

    pub fn primary_key(&self) -> &str {
        self.primary_key.value()
    }

    pub fn replication(&self) -> &ReplicationConfig {
        self.replication.value()
    }

    /// Renames the table. Returns the new field version.
    pub fn rename(&mut self, name: Name) -> Version {
        self.name.update(name)
    }

    /// Moves the table to another database. Returns the new field version.
    pub fn move_to(&mut self, database: DatabaseId) -> Version {
        self.database.update(database)
    }

    /// Replaces the shard layout. Returns the new field version.
    pub fn set_replication(&mut self, replication: ReplicationConfig) -> Version {
        self.replication.update(replication)
    }
}

impl Semilattice for TableMetadata {
    fn join(&mut self, other: &Self) {
        self.name.join(&other.name);
        self.database.join(&other.database);
        self.primary_key.join(&other.primary_key);
        self.replication.join(&other.replication);
    }
}

/// The replicated state of the whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    servers: MetadataMap<ServerId, ServerMetadata>,
    databases: MetadataMap<DatabaseId, DatabaseMetadata>,
    tables: MetadataMap<TableId, TableMetadata>,
}

impl ClusterMetadata {
    pub fn servers(&self) -> &MetadataMap<ServerId, ServerMetadata> {
        &self.servers
    }

    pub fn databases(&self) -> &MetadataMap<DatabaseId, DatabaseMetadata> {
        &self.databases
    }

    pub fn tables(&self) -> &MetadataMap<TableId, TableMetadata> {
        &self.tables
    }

    pub(crate) fn server_delta(id: ServerId, entry: Deletable<ServerMetadata>) -> Self {
        Self {
            servers: MetadataMap::singleton(id, entry),
            ..Self::default()
        }
    }

    /// A state holding only the given database entry, ready to be joined.
    #[must_use]
    pub fn database_delta(id: DatabaseId, entry: Deletable<DatabaseMetadata>) -> Self {
        Self {
            databases: MetadataMap::singleton(id, entry),
            ..Self::default()
        }
    }

    /// A state holding only the given table entry, ready to be joined.
    #[must_use]
    pub fn table_delta(id: TableId, entry: Deletable<TableMetadata>) -> Self {
        Self {
            tables: MetadataMap::singleton(id, entry),
            ..Self::default()
        }
    }

    /// Live servers currently called `name`. More than one means a name
    /// collision that hasn't been resolved yet.
    pub fn server_ids_named(&self, name: &Name) -> Vec<ServerId> {
        self.servers
            .iter()
            .filter(|(_, server)| server.name() == name)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live databases currently called `name`.
    pub fn database_ids_named(&self, name: &Name) -> Vec<DatabaseId> {
        self.databases
            .iter()
            .filter(|(_, db)| db.name() == name)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live tables in `database` currently called `name`.
    pub fn table_ids_named(&self, database: DatabaseId, name: &Name) -> Vec<TableId> {
        self.tables
            .iter()
            .filter(|(_, table)| table.database() == database && table.name() == name)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl Semilattice for ClusterMetadata {
    fn join(&mut self, other: &Self) {
        self.servers.join(&other.servers);
        self.databases.join(&other.databases);
        self.tables.join(&other.tables);
    }
}
