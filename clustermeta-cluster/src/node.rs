//! Node assembly.

use crate::error::ClusterResult;
use crate::mailbox::MailboxManager;
use crate::mailbox::memory::InMemoryNetwork;
use crate::metadata::ClusterMetadata;
use crate::server_config::{ServerConfigClient, ServerConfigServer};
use crate::view::{JoinBus, ReplicatedView, SemilatticeView};
use clustermeta_types::{Name, PeerId, ServerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Configuration for one cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name the server seeds its record with on first start.
    pub server_name: String,
    /// Tags the server seeds its record with on first start.
    pub tags: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_name: "clustermeta_server".to_string(),
            tags: vec!["default".to_string()],
        }
    }
}

impl NodeConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ClusterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validates the name and tags.
    pub fn validated(&self) -> ClusterResult<(Name, BTreeSet<Name>)> {
        let name = Name::new(self.server_name.as_str())?;
        let tags = self
            .tags
            .iter()
            .map(|tag| Name::new(tag.as_str()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok((name, tags))
    }
}

/// A running node: mailboxes, replicated view, the server config owner and
/// a client for configuring any server.
pub struct ClusterNode {
    server_id: ServerId,
    mailboxes: Arc<MailboxManager>,
    view: Arc<ReplicatedView<ClusterMetadata>>,
    server: ServerConfigServer,
    client: ServerConfigClient,
}

impl ClusterNode {
    /// Starts a node with a fresh server id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &NodeConfig,
        network: &Arc<InMemoryNetwork>,
        bus: &Arc<JoinBus<ClusterMetadata>>,
    ) -> ClusterResult<Self> {
        Self::start_with_id(ServerId::new(), config, network, bus)
    }

    /// Starts a node for an existing server id. If the cluster still has
    /// a record for it, that record is resumed.
    pub fn start_with_id(
        server_id: ServerId,
        config: &NodeConfig,
        network: &Arc<InMemoryNetwork>,
        bus: &Arc<JoinBus<ClusterMetadata>>,
    ) -> ClusterResult<Self> {
        let (name, tags) = config.validated()?;
        let peer = PeerId::new();
        let mailboxes = network.register(peer);
        let view = bus.attach(peer, ClusterMetadata::default());
        let shared: Arc<dyn SemilatticeView<ClusterMetadata>> = view.clone();

        let server = ServerConfigServer::spawn(
            server_id,
            name.clone(),
            tags,
            Arc::clone(&mailboxes),
            Arc::clone(&shared),
        );
        let client = ServerConfigClient::new(Arc::clone(&mailboxes), shared);
        info!(%server_id, %peer, %name, "node started");

        Ok(Self {
            server_id,
            mailboxes,
            view,
            server,
            client,
        })
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub fn peer_id(&self) -> PeerId {
        self.mailboxes.peer_id()
    }

    pub fn mailboxes(&self) -> &Arc<MailboxManager> {
        &self.mailboxes
    }

    /// This node's replicated view of the cluster.
    pub fn view(&self) -> &Arc<ReplicatedView<ClusterMetadata>> {
        &self.view
    }

    /// This node's view behind the trait object the backends take.
    pub fn shared_view(&self) -> Arc<dyn SemilatticeView<ClusterMetadata>> {
        self.view.clone()
    }

    pub fn server(&self) -> &ServerConfigServer {
        &self.server
    }

    pub fn client(&self) -> &ServerConfigClient {
        &self.client
    }

    /// A snapshot of this node's view.
    pub fn metadata(&self) -> ClusterMetadata {
        self.view.get()
    }

    /// Stops the server config owner. The view stays attached until the
    /// node is dropped.
    pub fn shutdown(&self) {
        info!(server_id = %self.server_id, "node shutting down");
        self.server.shutdown();
    }
}
