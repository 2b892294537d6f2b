#![allow(dead_code)]

use clustermeta_admin::{
    AdminConfig, AdminTables, ArtificialTableBackend, IdentifierFormat, SERVER_CONFIG_TABLE,
    TABLE_CONFIG_TABLE,
};
use clustermeta_cluster::mailbox::memory::InMemoryNetwork;
use clustermeta_cluster::{
    ClusterMetadata, ClusterNode, DatabaseMetadata, Deadline, Interruptor, JoinBus, NodeConfig,
    SemilatticeView, interrupt_after, wait_until,
};
use clustermeta_semilattice::Deletable;
use clustermeta_types::{DatabaseId, Name};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

pub struct TestCluster {
    pub network: Arc<InMemoryNetwork>,
    pub bus: Arc<JoinBus<ClusterMetadata>>,
    pub nodes: Vec<ClusterNode>,
}

impl TestCluster {
    /// Starts `n` nodes named `server_0`, `server_1`, ... and waits until
    /// every node sees every server.
    pub async fn start(n: usize) -> Self {
        init_tracing();
        let network = InMemoryNetwork::new();
        let bus = JoinBus::new();
        let nodes: Vec<_> = (0..n)
            .map(|i| {
                let config = NodeConfig {
                    server_name: format!("server_{i}"),
                    tags: Vec::new(),
                };
                ClusterNode::start(&config, &network, &bus).unwrap()
            })
            .collect();
        for node in &nodes {
            wait_for(node, |m| m.servers().len() == n).await;
        }
        Self {
            network,
            bus,
            nodes,
        }
    }

    pub fn tables(&self, node: usize, format: IdentifierFormat) -> AdminTables {
        let config = AdminConfig {
            identifier_format: format,
        };
        AdminTables::new(&self.nodes[node], &config)
    }

    pub fn server_config(&self, node: usize) -> Arc<dyn ArtificialTableBackend> {
        Arc::clone(
            self.tables(node, IdentifierFormat::Name)
                .get(SERVER_CONFIG_TABLE)
                .unwrap(),
        )
    }

    pub fn table_config(&self, node: usize, format: IdentifierFormat) -> Arc<dyn ArtificialTableBackend> {
        Arc::clone(self.tables(node, format).get(TABLE_CONFIG_TABLE).unwrap())
    }

    /// Creates a database from node 0 and waits until every node has it.
    pub async fn create_database(&self, db_name: &str) -> DatabaseId {
        let id = DatabaseId::new();
        self.nodes[0].view().join(&ClusterMetadata::database_delta(
            id,
            Deletable::present(DatabaseMetadata::new(name(db_name))),
        ));
        for node in &self.nodes {
            wait_for(node, |m| m.databases().contains_key(&id)).await;
        }
        id
    }
}

pub fn deadline() -> Deadline {
    interrupt_after(&Interruptor::new(), Duration::from_secs(5))
}

pub fn fired() -> Interruptor {
    let interruptor = Interruptor::new();
    interruptor.cancel();
    interruptor
}

pub async fn wait_for<F>(node: &ClusterNode, predicate: F) -> ClusterMetadata
where
    F: FnMut(&ClusterMetadata) -> bool,
{
    let mut rx = node.view().subscribe();
    wait_until(&mut rx, predicate, &deadline())
        .await
        .expect("view did not converge in time")
}
