//! Replicated cluster metadata and the control plane around it.
//!
//! Every node holds its own copy of [`ClusterMetadata`] and merges copies
//! from other nodes with a semilattice join, so replicas converge no matter
//! how updates are ordered or duplicated. Remote changes to a server's
//! record are never written into the map directly: they are sent as
//! commands to the server's owner through the business card it publishes,
//! and the owner's update spreads like any other.
//!
//! ## Components
//!
//! - **Metadata**: server, database and table records and the cluster map
//! - **View**: a node's copy of the map plus the join broadcast substrate
//! - **Mailbox**: addressable, typed endpoints and message delivery
//! - **RPC**: commands to a business card, acked to a transient reply box
//! - **Server config**: the per-server owner and the client that drives it
//! - **Node**: wires the above together for one server
//!
//! # Example
//!
//! ```
//! use clustermeta_cluster::{ClusterMetadata, ClusterNode, JoinBus, NodeConfig};
//! use clustermeta_cluster::mailbox::memory::InMemoryNetwork;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> clustermeta_cluster::ClusterResult<()> {
//! let network = InMemoryNetwork::new();
//! let bus = JoinBus::<ClusterMetadata>::new();
//! let config = NodeConfig {
//!     server_name: "alpha".to_string(),
//!     ..Default::default()
//! };
//!
//! let node = ClusterNode::start(&config, &network, &bus)?;
//! assert_eq!(node.metadata().servers().len(), 1);
//! # Ok(())
//! # }
//! ```

mod business_card;
mod error;
mod interrupt;
pub mod mailbox;
mod metadata;
mod node;
pub mod rpc;
mod server_config;
pub mod view;

pub use business_card::ServerConfigBusinessCard;
pub use error::{ClusterError, ClusterResult};
pub use interrupt::{Deadline, Interruptor, interrupt_after, interruptible};
pub use mailbox::{Mailbox, MailboxAddress, MailboxId, MailboxManager, MailboxTransport};
pub use metadata::{
    ClusterMetadata, DatabaseMetadata, ReplicationConfig, ServerMetadata, ShardConfig,
    TableMetadata,
};
pub use node::{ClusterNode, NodeConfig};
pub use rpc::{Command, CommandAck, CommandAddress, CommandMailbox, send_command};
pub use server_config::{ServerConfigClient, ServerConfigServer};
pub use view::{JoinBus, LocalView, ReplicatedView, SemilatticeView, wait_until};
