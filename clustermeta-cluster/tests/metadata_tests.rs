mod common;

use clustermeta_cluster::mailbox::memory::InMemoryNetwork;
use clustermeta_cluster::{
    ClusterMetadata, CommandMailbox, DatabaseMetadata, ReplicationConfig, ServerConfigBusinessCard,
    ServerMetadata, ShardConfig, TableMetadata,
};
use clustermeta_semilattice::{Deletable, Semilattice, Versioned};
use clustermeta_types::{DatabaseId, Name, PeerId, ServerId, TableId, Version};
use common::{name, tags};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;

fn card() -> ServerConfigBusinessCard {
    let manager = InMemoryNetwork::new().register(PeerId::new());
    ServerConfigBusinessCard {
        rename_addr: CommandMailbox::<Name>::new(&manager).address(),
        retag_addr: CommandMailbox::<BTreeSet<Name>>::new(&manager).address(),
    }
}

/// Builds a server record the way a replica would decode it off the wire.
fn server_record(
    name: Versioned<Name>,
    tags: Versioned<BTreeSet<Name>>,
    config_card: Versioned<ServerConfigBusinessCard>,
) -> ServerMetadata {
    serde_json::from_value(json!({
        "name": name,
        "tags": tags,
        "config_card": config_card,
    }))
    .unwrap()
}

fn v(n: u64) -> Version {
    Version::new(n)
}

fn single_shard(server: ServerId) -> ReplicationConfig {
    ReplicationConfig {
        shards: vec![ShardConfig {
            replicas: BTreeSet::from([server]),
            primary_replica: server,
        }],
    }
}

// ── Server records ───────────────────────────────────────────────

#[test]
fn newer_tags_win_on_server_record() {
    let card = Versioned::new(card());
    let old = server_record(
        Versioned::with_version(name("alpha"), v(1)),
        Versioned::with_version(tags(&[]), v(1)),
        card.clone(),
    );
    let new = server_record(
        Versioned::with_version(name("alpha"), v(1)),
        Versioned::with_version(tags(&["ssd"]), v(2)),
        card,
    );

    let joined = old.joined(&new);
    assert_eq!(joined.name(), &name("alpha"));
    assert_eq!(joined.tags(), &tags(&["ssd"]));
    assert_eq!(joined.versioned_tags().version(), v(2));
    assert_eq!(joined, new.joined(&old));
}

#[test]
fn server_fields_join_independently() {
    let card = Versioned::new(card());
    let renamed = server_record(
        Versioned::with_version(name("beta"), v(3)),
        Versioned::with_version(tags(&[]), v(0)),
        card.clone(),
    );
    let retagged = server_record(
        Versioned::with_version(name("alpha"), v(0)),
        Versioned::with_version(tags(&["hdd"]), v(1)),
        card,
    );

    let joined = renamed.joined(&retagged);
    assert_eq!(joined.name(), &name("beta"));
    assert_eq!(joined.tags(), &tags(&["hdd"]));
}

#[test]
fn newer_business_card_wins() {
    let stale = card();
    let fresh = card();
    let a = server_record(
        Versioned::new(name("alpha")),
        Versioned::new(tags(&[])),
        Versioned::with_version(stale, v(0)),
    );
    let b = server_record(
        Versioned::new(name("alpha")),
        Versioned::new(tags(&[])),
        Versioned::with_version(fresh.clone(), v(1)),
    );
    assert_eq!(a.joined(&b).config_card(), &fresh);
}

// ── Tables and databases ─────────────────────────────────────────

#[test]
fn table_mutators_bump_versions() {
    let db = DatabaseId::new();
    let mut table = TableMetadata::new(name("users"), db, "id", ReplicationConfig::default());
    let before = table.clone();

    table.rename(name("people"));
    let other_db = DatabaseId::new();
    table.move_to(other_db);

    let joined = before.joined(&table);
    assert_eq!(joined.name(), &name("people"));
    assert_eq!(joined.database(), other_db);
    assert_eq!(joined.primary_key(), "id");
}

#[test]
fn replication_lists_every_server() {
    let (a, b, c) = (ServerId::new(), ServerId::new(), ServerId::new());
    let config = ReplicationConfig {
        shards: vec![
            ShardConfig {
                replicas: BTreeSet::from([a, b]),
                primary_replica: a,
            },
            ShardConfig {
                replicas: BTreeSet::from([c]),
                primary_replica: c,
            },
        ],
    };
    assert_eq!(config.servers(), BTreeSet::from([a, b, c]));
}

#[test]
fn lookups_skip_tombstones() {
    let db = DatabaseId::new();
    let other_db = DatabaseId::new();
    let live = TableId::new();
    let dropped = TableId::new();
    let elsewhere = TableId::new();
    let server = ServerId::new();

    let mut metadata = ClusterMetadata::default();
    metadata.join(&ClusterMetadata::database_delta(
        db,
        Deletable::present(DatabaseMetadata::new(name("test"))),
    ));
    metadata.join(&ClusterMetadata::table_delta(
        live,
        Deletable::present(TableMetadata::new(name("users"), db, "id", single_shard(server))),
    ));
    metadata.join(&ClusterMetadata::table_delta(
        dropped,
        Deletable::tombstone(v(1)),
    ));
    metadata.join(&ClusterMetadata::table_delta(
        elsewhere,
        Deletable::present(TableMetadata::new(name("users"), other_db, "id", single_shard(server))),
    ));

    assert_eq!(metadata.database_ids_named(&name("test")), vec![db]);
    assert!(metadata.database_ids_named(&name("prod")).is_empty());
    assert_eq!(metadata.table_ids_named(db, &name("users")), vec![live]);
    assert_eq!(metadata.tables().len(), 2);
    assert!(metadata.tables().entry(&dropped).unwrap().is_deleted());
}

#[test]
fn dropped_table_stays_dropped_against_stale_copy() {
    let db = DatabaseId::new();
    let id = TableId::new();
    let created = Deletable::present(TableMetadata::new(
        name("users"),
        db,
        "id",
        ReplicationConfig::default(),
    ));
    let mut dropped = created.clone();
    dropped.delete();

    let mut replica = ClusterMetadata::table_delta(id, dropped);
    replica.join(&ClusterMetadata::table_delta(id, created));
    assert!(!replica.tables().contains_key(&id));
}

#[test]
fn cluster_join_is_commutative() {
    let db = DatabaseId::new();
    let table = TableId::new();

    let mut a = ClusterMetadata::database_delta(
        db,
        Deletable::present(DatabaseMetadata::new(name("test"))),
    );
    let mut renamed = DatabaseMetadata::new(name("test"));
    renamed.rename(name("prod"));
    let b = ClusterMetadata::database_delta(db, Deletable::present(renamed));
    a.join(&ClusterMetadata::table_delta(
        table,
        Deletable::present(TableMetadata::new(name("t"), db, "id", ReplicationConfig::default())),
    ));

    assert_eq!(a.joined(&b), b.joined(&a));
    assert_eq!(a.joined(&b).databases().get(&db).unwrap().name(), &name("prod"));
}

// ── Wire format ──────────────────────────────────────────────────

#[test]
fn cluster_metadata_survives_json() {
    let db = DatabaseId::new();
    let table = TableId::new();
    let mut metadata = ClusterMetadata::database_delta(
        db,
        Deletable::present(DatabaseMetadata::new(name("test"))),
    );
    let mut record = TableMetadata::new(name("t"), db, "id", single_shard(ServerId::new()));
    record.set_replication(ReplicationConfig::default());
    metadata.join(&ClusterMetadata::table_delta(table, Deletable::present(record)));
    metadata.join(&ClusterMetadata::table_delta(TableId::new(), Deletable::tombstone(v(4))));

    let json = serde_json::to_string(&metadata).unwrap();
    let decoded: ClusterMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, metadata);
}

#[test]
fn invalid_name_on_the_wire_fails_to_decode() {
    let db = DatabaseId::new();
    let metadata = ClusterMetadata::database_delta(
        db,
        Deletable::present(DatabaseMetadata::new(name("test"))),
    );
    let json = serde_json::to_string(&metadata)
        .unwrap()
        .replace("\"test\"", "\"not a name!\"");
    assert!(serde_json::from_str::<ClusterMetadata>(&json).is_err());
}
