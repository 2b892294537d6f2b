mod common;

use clustermeta_cluster::{
    ClusterError, ClusterNode, CommandMailbox, Interruptor, NodeConfig, ServerConfigBusinessCard,
    interrupt_after, send_command,
};
use clustermeta_types::{Name, PeerId, ServerId, Version};
use common::{deadline, name, node_config, start_cluster, tags, wait_for};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::time::Duration;

fn name_of(node: &ClusterNode, server: ServerId) -> Option<String> {
    node.metadata()
        .servers()
        .get(&server)
        .map(|s| s.name().to_string())
}

// ── Seeding ──────────────────────────────────────────────────────

#[tokio::test]
async fn start_seeds_record_at_version_zero() {
    common::init_tracing();
    let network = clustermeta_cluster::mailbox::memory::InMemoryNetwork::new();
    let bus = clustermeta_cluster::JoinBus::new();
    let config = NodeConfig {
        server_name: "alpha".to_string(),
        tags: vec!["ssd".to_string(), "east".to_string()],
    };

    let node = ClusterNode::start(&config, &network, &bus).unwrap();
    let metadata = node.metadata();
    let record = metadata.servers().get(&node.server_id()).unwrap();

    assert_eq!(record.name(), &name("alpha"));
    assert_eq!(record.tags(), &tags(&["east", "ssd"]));
    assert_eq!(record.versioned_name().version(), Version::ZERO);
    assert_eq!(record.config_card(), node.server().business_card());
    assert!(node.server().is_running());
}

#[tokio::test]
async fn every_node_sees_every_server() {
    let cluster = start_cluster(3).await;
    for node in &cluster.nodes {
        for other in &cluster.nodes {
            assert!(name_of(node, other.server_id()).is_some());
        }
    }
}

// ── Rename ───────────────────────────────────────────────────────

#[tokio::test]
async fn rename_from_another_node() {
    let cluster = start_cluster(2).await;
    let (owner, caller) = (&cluster.nodes[0], &cluster.nodes[1]);

    caller
        .client()
        .rename_server(owner.server_id(), name("gamma"), &deadline())
        .await
        .unwrap();

    for node in &cluster.nodes {
        let metadata = wait_for(node, |m| {
            m.servers()
                .get(&owner.server_id())
                .is_some_and(|s| s.name().as_str() == "gamma")
        })
        .await;
        let record = metadata.servers().get(&owner.server_id()).unwrap();
        assert_eq!(record.versioned_name().version(), Version::new(1));
    }
    assert_eq!(
        caller.client().server_ids_named(&name("gamma")),
        vec![owner.server_id()]
    );
}

#[tokio::test]
async fn rename_to_taken_name_is_a_conflict() {
    let cluster = start_cluster(2).await;
    let (a, b) = (&cluster.nodes[0], &cluster.nodes[1]);

    let err = b
        .client()
        .rename_server(a.server_id(), name("server_1"), &deadline())
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::Conflict(_)));
    assert_eq!(name_of(a, a.server_id()).as_deref(), Some("server_0"));
}

#[tokio::test]
async fn rename_to_current_name_does_not_bump() {
    let cluster = start_cluster(1).await;
    let node = &cluster.nodes[0];

    node.client()
        .rename_server(node.server_id(), name("server_0"), &deadline())
        .await
        .unwrap();

    let metadata = node.metadata();
    let record = metadata.servers().get(&node.server_id()).unwrap();
    assert_eq!(record.versioned_name().version(), Version::ZERO);
}

#[tokio::test]
async fn unknown_server_is_a_conflict() {
    let cluster = start_cluster(1).await;
    let err = cluster.nodes[0]
        .client()
        .rename_server(ServerId::new(), name("ghost"), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Conflict(_)));
}

// ── Retag ────────────────────────────────────────────────────────

#[tokio::test]
async fn retag_replaces_the_whole_set() {
    let cluster = start_cluster(2).await;
    let (owner, caller) = (&cluster.nodes[0], &cluster.nodes[1]);
    let client = caller.client();

    client
        .retag_server(owner.server_id(), tags(&["a", "b"]), &deadline())
        .await
        .unwrap();
    client
        .retag_server(owner.server_id(), tags(&["c"]), &deadline())
        .await
        .unwrap();

    let metadata = wait_for(caller, |m| {
        m.servers()
            .get(&owner.server_id())
            .is_some_and(|s| s.versioned_tags().version() == Version::new(2))
    })
    .await;
    assert_eq!(
        metadata.servers().get(&owner.server_id()).unwrap().tags(),
        &tags(&["c"])
    );
}

#[tokio::test]
async fn concurrent_retags_settle_on_one_set() {
    let cluster = start_cluster(3).await;
    let owner = cluster.nodes[0].server_id();
    let ssd = tags(&["ssd"]);
    let hdd = tags(&["hdd", "archive"]);

    let interruptor = deadline();
    let (first, second) = tokio::join!(
        cluster.nodes[1]
            .client()
            .retag_server(owner, ssd.clone(), &interruptor),
        cluster.nodes[2]
            .client()
            .retag_server(owner, hdd.clone(), &interruptor),
    );
    first.unwrap();
    second.unwrap();

    let mut seen = Vec::new();
    for node in &cluster.nodes {
        let metadata = wait_for(node, |m| {
            m.servers()
                .get(&owner)
                .is_some_and(|s| s.versioned_tags().version() == Version::new(2))
        })
        .await;
        seen.push(metadata.servers().get(&owner).unwrap().tags().clone());
    }

    assert!(seen[0] == ssd || seen[0] == hdd, "tags were mixed: {:?}", seen[0]);
    assert!(seen.iter().all(|t| *t == seen[0]));
}

// ── Retire, shutdown, restart ────────────────────────────────────

#[tokio::test]
async fn retired_owner_refuses_commands() {
    let cluster = start_cluster(2).await;
    let (owner, caller) = (&cluster.nodes[0], &cluster.nodes[1]);
    let card = owner.server().business_card().clone();

    owner.server().retire();
    wait_for(caller, |m| !m.servers().contains_key(&owner.server_id())).await;

    let err = send_command(caller.mailboxes(), &card.rename_addr, name("zombie"), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Validation(_)));

    let err = caller
        .client()
        .rename_server(owner.server_id(), name("zombie"), &deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Conflict(_)));
}

#[tokio::test]
async fn stopped_owner_never_acks() {
    let cluster = start_cluster(2).await;
    let (owner, caller) = (&cluster.nodes[0], &cluster.nodes[1]);
    owner.shutdown();

    let interruptor = interrupt_after(&Interruptor::new(), Duration::from_millis(200));
    let err = caller
        .client()
        .rename_server(owner.server_id(), name("unreachable"), &interruptor)
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::Interrupted));
    assert_eq!(name_of(caller, owner.server_id()).as_deref(), Some("server_0"));
}

#[tokio::test]
async fn restarted_server_keeps_its_record() {
    let mut cluster = start_cluster(2).await;
    let owner_id = cluster.nodes[0].server_id();
    cluster.nodes[1]
        .client()
        .rename_server(owner_id, name("renamed"), &deadline())
        .await
        .unwrap();
    wait_for(&cluster.nodes[1], |m| {
        m.servers()
            .get(&owner_id)
            .is_some_and(|s| s.name().as_str() == "renamed")
    })
    .await;

    drop(cluster.nodes.remove(0));
    let restarted = ClusterNode::start_with_id(
        owner_id,
        &node_config("ignored_on_resume"),
        &cluster.network,
        &cluster.bus,
    )
    .unwrap();
    assert_eq!(name_of(&restarted, owner_id).as_deref(), Some("renamed"));

    let caller = &cluster.nodes[0];
    wait_for(caller, |m| {
        m.servers()
            .get(&owner_id)
            .is_some_and(|s| s.versioned_config_card().version() == Version::new(1))
    })
    .await;
    caller
        .client()
        .rename_server(owner_id, name("renamed_again"), &deadline())
        .await
        .unwrap();
}

#[tokio::test]
async fn owner_reclaims_card_lost_to_a_tie() {
    let cluster = start_cluster(1).await;
    let node = &cluster.nodes[0];
    let owner_id = node.server_id();

    // A card left behind by an earlier incarnation, at the same version as
    // the live one and with an encoding that wins the tie-break.
    let old_peer = PeerId::parse("ffffffff-ffff-ffff-ffff-ffffffffffff").unwrap();
    let old_mailboxes = cluster.network.register(old_peer);
    let old_card = ServerConfigBusinessCard {
        rename_addr: CommandMailbox::<Name>::new(&old_mailboxes).address(),
        retag_addr: CommandMailbox::<BTreeSet<Name>>::new(&old_mailboxes).address(),
    };
    let mut remembered = serde_json::to_value(node.metadata()).unwrap();
    *remembered
        .pointer_mut(&format!("/servers/entries/{owner_id}/value/config_card/value"))
        .unwrap() = serde_json::to_value(&old_card).unwrap();
    cluster
        .bus
        .inject_raw(node.peer_id(), serde_json::to_vec(&remembered).unwrap());

    let live_card = node.server().business_card().clone();
    wait_for(node, |m| {
        m.servers().get(&owner_id).is_some_and(|s| {
            *s.config_card() == live_card && s.versioned_config_card().version() == Version::new(1)
        })
    })
    .await;
    node.client()
        .rename_server(owner_id, name("reachable"), &deadline())
        .await
        .unwrap();
}

#[tokio::test]
async fn retired_server_can_rejoin() {
    let mut cluster = start_cluster(2).await;
    let owner_id = cluster.nodes[0].server_id();
    cluster.nodes[0].server().retire();
    wait_for(&cluster.nodes[1], |m| !m.servers().contains_key(&owner_id)).await;

    drop(cluster.nodes.remove(0));
    let _reborn = ClusterNode::start_with_id(
        owner_id,
        &node_config("reborn"),
        &cluster.network,
        &cluster.bus,
    )
    .unwrap();

    let metadata = wait_for(&cluster.nodes[0], |m| m.servers().contains_key(&owner_id)).await;
    let entry = metadata.servers().entry(&owner_id).unwrap();
    assert_eq!(entry.version(), Version::new(2));
    assert_eq!(entry.get().unwrap().name(), &name("reborn"));
}
