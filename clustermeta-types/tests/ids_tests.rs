use clustermeta_types::{DatabaseId, PeerId, ServerId, TableId};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

// ── ServerId ──────────────────────────────────────────────────────

#[test]
fn server_id_new_is_unique() {
    let a = ServerId::new();
    let b = ServerId::new();
    assert_ne!(a, b);
}

#[test]
fn server_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = ServerId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn server_id_display_and_parse() {
    let id = ServerId::new();
    let parsed = ServerId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn server_id_from_str_invalid() {
    assert!(ServerId::from_str("garbage").is_err());
}

#[test]
fn server_id_hash_and_eq() {
    let id = ServerId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn server_id_serializes_as_plain_string() {
    let id = ServerId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let parsed: ServerId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, parsed);
}

// ── Ordering ──────────────────────────────────────────────────────

#[test]
fn ids_are_time_ordered() {
    let first = TableId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = TableId::new();
    assert!(first < second);
}

#[test]
fn ids_key_ordered_sets() {
    let ids: BTreeSet<DatabaseId> = (0..10).map(|_| DatabaseId::new()).collect();
    assert_eq!(ids.len(), 10);
}

// ── Other id kinds ────────────────────────────────────────────────

#[test]
fn peer_id_parse_invalid() {
    assert!(PeerId::parse("not-a-uuid").is_err());
}

#[test]
fn distinct_kinds_share_uuid_layout() {
    let uuid = uuid::Uuid::now_v7();
    assert_eq!(
        DatabaseId::from_uuid(uuid).to_string(),
        TableId::from_uuid(uuid).to_string()
    );
}
