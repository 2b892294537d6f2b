//! An in-memory clustermeta cluster driven end to end.
//!
//! [`run`] starts a handful of nodes on one in-memory network and join bus,
//! reconfigures a server and creates a table through the system tables of
//! the last node, waits until every node agrees, and reports both tables.

use anyhow::{Context, Result, anyhow, bail};
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
use clustermeta_types::{DatabaseId, Name, TableId};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Name the first server is renamed to.
pub const RENAMED_SERVER: &str = "primary";
/// Database the simulation creates.
pub const SIM_DATABASE: &str = "sim";
/// Table the simulation creates.
pub const SIM_TABLE: &str = "events";

/// What to simulate.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Number of nodes to start. At least one.
    pub servers: usize,
    /// How `table_config` rows refer to databases and servers.
    pub format: IdentifierFormat,
    /// How long to wait for any one step to settle.
    pub timeout: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            servers: 3,
            format: IdentifierFormat::Name,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Both system tables as every node ended up seeing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimReport {
    pub server_config: Vec<Value>,
    pub table_config: Vec<Value>,
}

/// Runs the simulation. Must be called from within a tokio runtime.
pub async fn run(options: &SimOptions) -> Result<SimReport> {
    if options.servers == 0 {
        bail!("need at least one server");
    }

    let network = InMemoryNetwork::new();
    let bus = JoinBus::<ClusterMetadata>::new();
    let mut nodes = Vec::with_capacity(options.servers);
    for i in 0..options.servers {
        let config = NodeConfig {
            server_name: format!("server_{i}"),
            tags: vec!["default".to_string()],
        };
        nodes.push(
            ClusterNode::start(&config, &network, &bus)
                .with_context(|| format!("failed to start server_{i}"))?,
        );
    }
    let count = nodes.len();
    settle(&nodes, options.timeout, "servers to discover each other", |m| {
        m.servers().len() == count
    })
    .await?;
    info!(servers = count, "cluster is up");

    let admin_node = &nodes[count - 1];
    let tables = AdminTables::new(
        admin_node,
        &AdminConfig {
            identifier_format: options.format,
        },
    );
    let server_config = backend(&tables, SERVER_CONFIG_TABLE)?;
    let table_config = backend(&tables, TABLE_CONFIG_TABLE)?;

    let target = nodes[0].server_id();
    let pkey = json!(target.to_string());
    let mut row = server_config
        .read_row(&pkey, &deadline(options))
        .await?
        .ok_or_else(|| anyhow!("server {target} has no server_config row"))?;
    row["name"] = json!(RENAMED_SERVER);
    row["tags"] = json!(["default", "ssd"]);
    server_config
        .write_row(&pkey, false, &row, &deadline(options))
        .await
        .context("failed to reconfigure server_0")?;
    settle(&nodes, options.timeout, "the rename to spread", |m| {
        m.servers()
            .get(&target)
            .is_some_and(|s| s.name().as_str() == RENAMED_SERVER && s.tags().len() == 2)
    })
    .await?;
    info!(%target, "server renamed and retagged");

    let database = DatabaseId::new();
    admin_node.view().join(&ClusterMetadata::database_delta(
        database,
        Deletable::present(DatabaseMetadata::new(Name::new(SIM_DATABASE)?)),
    ));
    settle(&nodes, options.timeout, "the database to spread", |m| {
        m.databases().contains_key(&database)
    })
    .await?;

    let table = TableId::new();
    let refer = |name: &str, id: String| match options.format {
        IdentifierFormat::Name => json!(name),
        IdentifierFormat::Uuid => json!(id),
    };
    let replicas: Vec<Value> = nodes
        .iter()
        .map(|node| {
            let name = node
                .client()
                .server_name(node.server_id())
                .map(|n| n.to_string())
                .unwrap_or_default();
            refer(&name, node.server_id().to_string())
        })
        .collect();
    let table_row = json!({
        "id": table.to_string(),
        "name": SIM_TABLE,
        "db": refer(SIM_DATABASE, database.to_string()),
        "shards": [{
            "replicas": replicas,
            "primary_replica": refer(RENAMED_SERVER, target.to_string()),
        }],
    });
    table_config
        .write_row(&table_row["id"], true, &table_row, &deadline(options))
        .await
        .context("failed to create table")?;
    settle(&nodes, options.timeout, "the table to spread", |m| {
        m.tables().contains_key(&table)
    })
    .await?;
    info!(%table, "table created");

    let report = SimReport {
        server_config: server_config.read_all_rows(&deadline(options)).await?,
        table_config: table_config.read_all_rows(&deadline(options)).await?,
    };
    for node in &nodes {
        node.shutdown();
    }
    Ok(report)
}

fn backend(tables: &AdminTables, name: &str) -> Result<Arc<dyn ArtificialTableBackend>> {
    tables
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("no system table named {name}"))
}

fn deadline(options: &SimOptions) -> Deadline {
    interrupt_after(&Interruptor::new(), options.timeout)
}

/// Waits until every node's view satisfies `predicate`.
async fn settle<F>(nodes: &[ClusterNode], timeout: Duration, what: &str, mut predicate: F) -> Result<()>
where
    F: FnMut(&ClusterMetadata) -> bool,
{
    let interruptor = interrupt_after(&Interruptor::new(), timeout);
    for node in nodes {
        let mut rx = node.view().subscribe();
        wait_until(&mut rx, &mut predicate, &interruptor)
            .await
            .with_context(|| format!("timed out waiting for {what}"))?;
    }
    Ok(())
}
