#![allow(dead_code)]

use clustermeta_cluster::mailbox::memory::InMemoryNetwork;
use clustermeta_cluster::{
    ClusterMetadata, ClusterNode, Deadline, Interruptor, JoinBus, NodeConfig, SemilatticeView,
    interrupt_after, wait_until,
};
use clustermeta_types::Name;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// How long a test waits for replicas to converge before giving up.
pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

pub fn tags(items: &[&str]) -> BTreeSet<Name> {
    items.iter().map(|s| name(s)).collect()
}

pub fn node_config(server_name: &str) -> NodeConfig {
    NodeConfig {
        server_name: server_name.to_string(),
        tags: Vec::new(),
    }
}

pub struct TestCluster {
    pub network: Arc<InMemoryNetwork>,
    pub bus: Arc<JoinBus<ClusterMetadata>>,
    pub nodes: Vec<ClusterNode>,
}

/// Starts `n` nodes named `server_0`, `server_1`, ... and waits until every
/// node sees every server.
pub async fn start_cluster(n: usize) -> TestCluster {
    init_tracing();
    let network = InMemoryNetwork::new();
    let bus = JoinBus::new();
    let nodes: Vec<_> = (0..n)
        .map(|i| ClusterNode::start(&node_config(&format!("server_{i}")), &network, &bus).unwrap())
        .collect();
    for node in &nodes {
        wait_for(node, |m| m.servers().len() == n).await;
    }
    TestCluster {
        network,
        bus,
        nodes,
    }
}

/// A fresh interruptor that fires after [`CONVERGENCE_TIMEOUT`].
pub fn deadline() -> Deadline {
    interrupt_after(&Interruptor::new(), CONVERGENCE_TIMEOUT)
}

/// Waits until `node`'s view satisfies `predicate`, panicking on timeout.
pub async fn wait_for<F>(node: &ClusterNode, predicate: F) -> ClusterMetadata
where
    F: FnMut(&ClusterMetadata) -> bool,
{
    let mut rx = node.view().subscribe();
    wait_until(&mut rx, predicate, &deadline())
        .await
        .expect("view did not converge in time")
}
