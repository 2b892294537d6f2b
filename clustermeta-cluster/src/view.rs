//! Join substrate: where replicated metadata lives on each node.
//!
//! A view holds one node's copy of a semilattice. Local changes are joined
//! in and broadcast; remote states are joined on arrival. Because join is
//! order-independent and idempotent, the substrate gives no ordering or
//! exactly-once guarantees and needs none.

use crate::error::{ClusterError, ClusterResult};
use crate::interrupt::{Interruptor, interruptible};
use clustermeta_semilattice::Semilattice;
use clustermeta_types::PeerId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Read/write access to a node's copy of replicated state.
pub trait SemilatticeView<M>: Send + Sync {
    /// Returns a snapshot of the current state.
    fn get(&self) -> M;

    /// Joins `delta` into the local state and propagates it.
    fn join(&self, delta: &M);

    /// Subscribes to state changes.
    fn subscribe(&self) -> watch::Receiver<M>;
}

/// A single-node view with no replication.
pub struct LocalView<M> {
    state: watch::Sender<M>,
}

impl<M: Semilattice> LocalView<M> {
    /// Creates a view holding `initial`.
    pub fn new(initial: M) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Joins `delta` in. Returns true if the state changed.
    fn join_local(&self, delta: &M) -> bool {
        self.state.send_if_modified(|state| {
            let joined = state.joined(delta);
            if joined == *state {
                false
            } else {
                *state = joined;
                true
            }
        })
    }
}

impl<M: Semilattice + Send + Sync> SemilatticeView<M> for LocalView<M> {
    fn get(&self) -> M {
        self.state.borrow().clone()
    }

    fn join(&self, delta: &M) {
        self.join_local(delta);
    }

    fn subscribe(&self) -> watch::Receiver<M> {
        self.state.subscribe()
    }
}

struct BusMember<M> {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    connected: bool,
    view: Weak<ReplicatedView<M>>,
}

/// In-process broadcast hub connecting the views of every node.
///
/// States travel JSON-encoded, so a replica exercises the same decode path
/// a networked deployment would.
pub struct JoinBus<M> {
    members: Mutex<HashMap<PeerId, BusMember<M>>>,
}

impl<M> JoinBus<M>
where
    M: Semilattice + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(HashMap::new()),
        })
    }

    /// Attaches a node. The new view starts from `initial` joined with the
    /// state of every connected member.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(self: &Arc<Self>, peer: PeerId, initial: M) -> Arc<ReplicatedView<M>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let view = Arc::new(ReplicatedView {
            peer,
            local: LocalView::new(initial),
            bus: Arc::clone(self),
        });

        // Register before snapshotting so nothing broadcast in between is
        // missed; it waits in the channel until the receiver starts.
        let existing: Vec<Arc<ReplicatedView<M>>> = {
            let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
            members.insert(
                peer,
                BusMember {
                    tx,
                    connected: true,
                    view: Arc::downgrade(&view),
                },
            );
            let existing = members
                .iter()
                .filter(|(id, m)| **id != peer && m.connected)
                .filter_map(|(_, m)| m.view.upgrade())
                .collect();
            existing
        };
        for other in &existing {
            view.local.join_local(&other.get());
        }
        drop(existing);

        let weak = Arc::downgrade(&view);
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let Some(view) = weak.upgrade() else { break };
                view.on_receive(&payload);
            }
            debug!(%peer, "join receiver stopped");
        });

        debug!(%peer, "attached to join bus");
        view
    }

    /// Cuts a node off (or reconnects it). Broadcasts to or from a
    /// disconnected node are lost; after reconnecting, call
    /// [`ReplicatedView::announce`] to catch up.
    pub fn set_connected(&self, peer: PeerId, connected: bool) {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(member) = members.get_mut(&peer) {
            member.connected = connected;
        }
    }

    /// Delivers raw wire bytes to a node as if a peer had sent them.
    pub fn inject_raw(&self, peer: PeerId, payload: Vec<u8>) {
        let members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(member) = members.get(&peer) {
            let _ = member.tx.send(payload);
        }
    }

    fn broadcast(&self, from: PeerId, payload: &[u8]) {
        let members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        if !members.get(&from).is_some_and(|m| m.connected) {
            debug!(%from, "sender disconnected; broadcast lost");
            return;
        }
        for (peer, member) in members.iter() {
            if *peer != from && member.connected {
                let _ = member.tx.send(payload.to_vec());
            }
        }
    }
}

impl<M> JoinBus<M> {
    fn detach(&self, peer: PeerId) {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&peer);
    }
}

/// One node's replicated copy of `M`.
pub struct ReplicatedView<M> {
    peer: PeerId,
    local: LocalView<M>,
    bus: Arc<JoinBus<M>>,
}

impl<M> ReplicatedView<M>
where
    M: Semilattice + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Returns the peer this view belongs to.
    pub fn peer_id(&self) -> PeerId {
        self.peer
    }

    /// Rebroadcasts the full local state.
    pub fn announce(&self) {
        let state = self.local.state.borrow().clone();
        self.publish(&state);
    }

    fn publish(&self, state: &M) {
        match serde_json::to_vec(state) {
            Ok(payload) => self.bus.broadcast(self.peer, &payload),
            Err(e) => warn!(peer = %self.peer, "failed to encode state for broadcast: {e}"),
        }
    }

    fn on_receive(&self, payload: &[u8]) {
        match serde_json::from_slice::<M>(payload) {
            Ok(remote) => {
                if self.local.join_local(&remote) {
                    debug!(peer = %self.peer, "joined remote state");
                }
            }
            Err(e) => warn!(peer = %self.peer, "dropping undecodable state: {e}"),
        }
    }
}

impl<M> SemilatticeView<M> for ReplicatedView<M>
where
    M: Semilattice + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn get(&self) -> M {
        self.local.get()
    }

    fn join(&self, delta: &M) {
        if self.local.join_local(delta) {
            self.publish(delta);
        }
    }

    fn subscribe(&self) -> watch::Receiver<M> {
        self.local.subscribe()
    }
}

impl<M> Drop for ReplicatedView<M> {
    fn drop(&mut self) {
        self.bus.detach(self.peer);
    }
}

/// Suspends until the watched state satisfies `predicate`, returning that
/// state, or fails with [`ClusterError::Interrupted`].
pub async fn wait_until<M, F>(
    rx: &mut watch::Receiver<M>,
    mut predicate: F,
    interruptor: &Interruptor,
) -> ClusterResult<M>
where
    M: Clone,
    F: FnMut(&M) -> bool,
{
    let waited = interruptible(rx.wait_for(|state| predicate(state)), interruptor).await?;
    let state = waited.map_err(|_| ClusterError::ChannelClosed)?;
    Ok((*state).clone())
}
