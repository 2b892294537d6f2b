//! Mailbox delivery substrate.
//!
//! A mailbox is a typed receiving endpoint with a serializable, cluster-wide
//! address. Senders only need the address; payloads travel as JSON bytes
//! and are decoded by the receiving mailbox. Delivery is fire-and-forget:
//! a message for an address that no longer exists is dropped and the
//! sender never hears about it.

use crate::error::ClusterResult;
use async_trait::async_trait;
use clustermeta_types::PeerId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifies a mailbox within one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailboxId(u64);

/// Routable address of a mailbox anywhere in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MailboxAddress {
    peer: PeerId,
    mailbox: MailboxId,
}

impl MailboxAddress {
    /// The peer hosting the mailbox.
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// The mailbox within that peer.
    pub fn mailbox(&self) -> MailboxId {
        self.mailbox
    }
}

impl fmt::Display for MailboxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.peer, self.mailbox.0)
    }
}

/// Moves encoded messages between peers.
#[async_trait]
pub trait MailboxTransport: Send + Sync {
    /// Returns the local peer ID.
    fn local_peer(&self) -> PeerId;

    /// Delivers an encoded message to a remote mailbox. Unreachable
    /// destinations are not an error; the message is simply lost.
    async fn deliver(&self, to: &MailboxAddress, payload: Vec<u8>) -> ClusterResult<()>;
}

type Registry = Arc<Mutex<HashMap<MailboxId, mpsc::UnboundedSender<Vec<u8>>>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<MailboxId, mpsc::UnboundedSender<Vec<u8>>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the mailboxes of one peer and routes outgoing messages.
pub struct MailboxManager {
    peer_id: PeerId,
    next_id: AtomicU64,
    registry: Registry,
    transport: Arc<dyn MailboxTransport>,
}

impl MailboxManager {
    /// Creates a manager sending through `transport`.
    pub fn new(transport: Arc<dyn MailboxTransport>) -> Self {
        Self {
            peer_id: transport.local_peer(),
            next_id: AtomicU64::new(1),
            registry: Arc::new(Mutex::new(HashMap::new())),
            transport,
        }
    }

    /// Returns the local peer ID.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Returns the number of live mailboxes on this peer.
    pub fn mailbox_count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Registers a new mailbox receiving messages of type `T`.
    pub fn create<T: DeserializeOwned>(&self) -> Mailbox<T> {
        let id = MailboxId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.registry).insert(id, tx);
        Mailbox {
            address: MailboxAddress {
                peer: self.peer_id,
                mailbox: id,
            },
            rx,
            registry: Arc::clone(&self.registry),
            _message: PhantomData,
        }
    }

    /// Encodes `message` and sends it to `to`.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        to: &MailboxAddress,
        message: &T,
    ) -> ClusterResult<()> {
        let payload = serde_json::to_vec(message)?;
        if to.peer == self.peer_id {
            self.dispatch(to.mailbox, payload);
            Ok(())
        } else {
            self.transport.deliver(to, payload).await
        }
    }

    /// Hands an encoded message to a local mailbox. Called by transports.
    pub fn dispatch(&self, mailbox: MailboxId, payload: Vec<u8>) {
        let registry = lock(&self.registry);
        match registry.get(&mailbox) {
            Some(tx) => {
                if tx.send(payload).is_err() {
                    debug!(peer = %self.peer_id, mailbox = mailbox.0, "mailbox receiver gone; dropping message");
                }
            }
            None => {
                debug!(peer = %self.peer_id, mailbox = mailbox.0, "no such mailbox; dropping message");
            }
        }
    }
}

/// A typed receiving endpoint. Dropping it deregisters the address.
pub struct Mailbox<T> {
    address: MailboxAddress,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    registry: Registry,
    _message: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Mailbox<T> {
    /// Returns the address senders should use.
    pub fn address(&self) -> MailboxAddress {
        self.address
    }

    /// Waits for the next decodable message.
    ///
    /// Payloads that fail to decode are logged and skipped; they never
    /// reach the caller.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let payload = self.rx.recv().await?;
            match serde_json::from_slice(&payload) {
                Ok(message) => return Some(message),
                Err(e) => warn!(mailbox = %self.address, "dropping undecodable message: {e}"),
            }
        }
    }
}

impl<T> Drop for Mailbox<T> {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.address.mailbox);
    }
}

/// In-process network for tests and simulations.
pub mod memory {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Weak;

    /// Routes messages between mailbox managers in one process.
    #[derive(Default)]
    pub struct InMemoryNetwork {
        peers: Mutex<HashMap<PeerId, Weak<MailboxManager>>>,
        disconnected: Mutex<HashSet<PeerId>>,
    }

    impl InMemoryNetwork {
        /// Creates an empty network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Adds a peer and returns its mailbox manager.
        pub fn register(self: &Arc<Self>, peer: PeerId) -> Arc<MailboxManager> {
            let transport = Arc::new(InMemoryTransport {
                network: Arc::clone(self),
                peer,
            });
            let manager = Arc::new(MailboxManager::new(transport));
            self.peers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(peer, Arc::downgrade(&manager));
            manager
        }

        /// Cuts a peer off (or reconnects it). Messages to or from a
        /// disconnected peer are lost.
        pub fn set_connected(&self, peer: PeerId, connected: bool) {
            let mut disconnected = self
                .disconnected
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if connected {
                disconnected.remove(&peer);
            } else {
                disconnected.insert(peer);
            }
        }

        fn route(&self, from: PeerId, to: &MailboxAddress, payload: Vec<u8>) {
            {
                let disconnected = self
                    .disconnected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if disconnected.contains(&from) || disconnected.contains(&to.peer) {
                    debug!(%from, %to, "peer disconnected; message lost");
                    return;
                }
            }
            let target = self
                .peers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&to.peer)
                .and_then(Weak::upgrade);
            match target {
                Some(manager) => manager.dispatch(to.mailbox, payload),
                None => debug!(%from, %to, "unknown peer; message lost"),
            }
        }
    }

    struct InMemoryTransport {
        network: Arc<InMemoryNetwork>,
        peer: PeerId,
    }

    #[async_trait]
    impl MailboxTransport for InMemoryTransport {
        fn local_peer(&self) -> PeerId {
            self.peer
        }

        async fn deliver(&self, to: &MailboxAddress, payload: Vec<u8>) -> ClusterResult<()> {
            self.network.route(self.peer, to, payload);
            Ok(())
        }
    }
}
