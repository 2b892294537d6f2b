//! Server configuration: the owner of a server record and its clients.
//!
//! Each server runs exactly one [`ServerConfigServer`]. It is the only code
//! that writes that server's record: rename and retag requests from anywhere
//! in the cluster arrive through the business card it publishes, are
//! validated against the local view and applied one at a time, and the
//! result spreads through the join substrate like any other update.

use crate::business_card::ServerConfigBusinessCard;
use crate::error::{ClusterError, ClusterResult};
use crate::interrupt::{Interruptor, interruptible};
use crate::mailbox::{MailboxAddress, MailboxManager};
use crate::metadata::{ClusterMetadata, ServerMetadata};
use crate::rpc::{CommandAck, CommandMailbox, acknowledge, send_command};
use crate::view::SemilatticeView;
use clustermeta_semilattice::Deletable;
use clustermeta_types::{Name, ServerId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type MetadataView = Arc<dyn SemilatticeView<ClusterMetadata>>;

/// Owner of one server's record.
pub struct ServerConfigServer {
    server_id: ServerId,
    card: ServerConfigBusinessCard,
    view: MetadataView,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerConfigServer {
    /// Publishes the server's record and starts applying commands.
    ///
    /// A server with no record seeds one at version zero from `name` and
    /// `tags`. A server that already has a live record keeps its name and
    /// tags and only publishes its new business card. A server whose record
    /// was retired re-creates it at a higher lifecycle version.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        server_id: ServerId,
        name: Name,
        tags: BTreeSet<Name>,
        mailboxes: Arc<MailboxManager>,
        view: MetadataView,
    ) -> Self {
        let rename_box = CommandMailbox::<Name>::new(&mailboxes);
        let retag_box = CommandMailbox::<BTreeSet<Name>>::new(&mailboxes);
        let card = ServerConfigBusinessCard {
            rename_addr: rename_box.address(),
            retag_addr: retag_box.address(),
        };

        let entry = match view.get().servers().entry(&server_id).cloned() {
            None => {
                info!(%server_id, %name, "seeding server record");
                Deletable::present(ServerMetadata::seed(name, tags, card.clone()))
            }
            Some(mut entry) => {
                match entry.get_mut() {
                    Some(record) => {
                        debug!(%server_id, name = %record.name(), "resuming server record");
                        record.set_config_card(card.clone());
                    }
                    None => {
                        info!(%server_id, %name, "re-creating retired server record");
                        entry.recreate(ServerMetadata::seed(name, tags, card.clone()));
                    }
                }
                entry
            }
        };
        view.join(&ClusterMetadata::server_delta(server_id, entry));

        let stop = CancellationToken::new();
        let applier = Applier {
            server_id,
            card: card.clone(),
            mailboxes,
            view: Arc::clone(&view),
        };
        let task = tokio::spawn(applier.run(rename_box, retag_box, stop.clone()));

        Self {
            server_id,
            card,
            view,
            stop,
            task,
        }
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// The card this owner published.
    pub fn business_card(&self) -> &ServerConfigBusinessCard {
        &self.card
    }

    /// Returns true while commands are still being applied.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops applying commands. Commands already queued are dropped
    /// without an ack.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }

    /// Tombstones this server's record. The owner keeps answering, but
    /// every further command is refused as invalid.
    pub fn retire(&self) {
        let Some(mut entry) = self.view.get().servers().entry(&self.server_id).cloned() else {
            return;
        };
        if entry.is_deleted() {
            return;
        }
        let version = entry.delete();
        info!(server_id = %self.server_id, %version, "retiring server record");
        self.view
            .join(&ClusterMetadata::server_delta(self.server_id, entry));
    }
}

impl Drop for ServerConfigServer {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

struct Applier {
    server_id: ServerId,
    card: ServerConfigBusinessCard,
    mailboxes: Arc<MailboxManager>,
    view: MetadataView,
}

impl Applier {
    async fn run(
        self,
        mut rename_box: CommandMailbox<Name>,
        mut retag_box: CommandMailbox<BTreeSet<Name>>,
        stop: CancellationToken,
    ) {
        let mut changes = self.view.subscribe();
        self.reclaim_card();
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                Ok(()) = changes.changed() => self.reclaim_card(),
                Some(command) = rename_box.recv() => {
                    let ack = self.apply_rename(command.payload);
                    self.reply(&command.reply_to, &ack, &stop).await;
                }
                Some(command) = retag_box.recv() => {
                    let ack = self.apply_retag(command.payload);
                    self.reply(&command.reply_to, &ack, &stop).await;
                }
                else => break,
            }
        }
        debug!(server_id = %self.server_id, "server config owner stopped");
    }

    async fn reply(
        &self,
        reply_to: &MailboxAddress,
        ack: &CommandAck,
        stop: &CancellationToken,
    ) {
        let sent = interruptible(acknowledge(&self.mailboxes, reply_to, ack), stop).await;
        if let Err(e) = sent.and_then(|result| result) {
            warn!(server_id = %self.server_id, "failed to send ack: {e}");
        }
    }

    /// Re-publishes this owner's card if a joined state replaced it.
    ///
    /// A server restarted out of reach of its peers seeds a fresh card at
    /// the same version as the one they remember; whichever wins that tie,
    /// the owner bumps its own card past it.
    fn reclaim_card(&self) {
        let Some(mut entry) = self.view.get().servers().entry(&self.server_id).cloned() else {
            return;
        };
        let Some(record) = entry.get_mut() else {
            return;
        };
        if *record.config_card() == self.card {
            return;
        }
        let version = record.set_config_card(self.card.clone());
        info!(server_id = %self.server_id, %version, "reclaiming business card");
        self.view
            .join(&ClusterMetadata::server_delta(self.server_id, entry));
    }

    /// Runs `edit` against this server's live record and joins the result.
    fn apply(
        &self,
        edit: impl FnOnce(&ClusterMetadata, &mut ServerMetadata) -> Result<bool, CommandAck>,
    ) -> CommandAck {
        let state = self.view.get();
        let Some(mut entry) = state.servers().entry(&self.server_id).cloned() else {
            return CommandAck::Invalid {
                reason: format!("server {} has no record", self.server_id),
            };
        };
        let Some(record) = entry.get_mut() else {
            return CommandAck::Invalid {
                reason: format!("server {} has been retired", self.server_id),
            };
        };
        match edit(&state, record) {
            Ok(true) => {
                self.view
                    .join(&ClusterMetadata::server_delta(self.server_id, entry));
                CommandAck::Applied
            }
            Ok(false) => CommandAck::Applied,
            Err(ack) => ack,
        }
    }

    fn apply_rename(&self, new_name: Name) -> CommandAck {
        let server_id = self.server_id;
        self.apply(|state, record| {
            if *record.name() == new_name {
                return Ok(false);
            }
            if state.server_ids_named(&new_name).iter().any(|id| *id != server_id) {
                return Err(CommandAck::Conflict {
                    reason: format!("server name `{new_name}` is already in use"),
                });
            }
            let old = record.name().clone();
            let version = record.set_name(new_name.clone());
            info!(%server_id, %old, new = %new_name, %version, "renamed server");
            Ok(true)
        })
    }

    fn apply_retag(&self, tags: BTreeSet<Name>) -> CommandAck {
        let server_id = self.server_id;
        self.apply(|_, record| {
            if *record.tags() == tags {
                return Ok(false);
            }
            let version = record.set_tags(tags);
            info!(%server_id, %version, "retagged server");
            Ok(true)
        })
    }
}

/// Issues server configuration commands from any node.
#[derive(Clone)]
pub struct ServerConfigClient {
    mailboxes: Arc<MailboxManager>,
    view: MetadataView,
}

impl ServerConfigClient {
    pub fn new(mailboxes: Arc<MailboxManager>, view: MetadataView) -> Self {
        Self { mailboxes, view }
    }

    /// Asks the owner of `server_id` to rename it and waits for the ack.
    ///
    /// The new name shows up in this node's view only once the owner's
    /// update has been joined here, which may be after this returns.
    pub async fn rename_server(
        &self,
        server_id: ServerId,
        name: Name,
        interruptor: &Interruptor,
    ) -> ClusterResult<()> {
        let card = self.card_for(server_id)?;
        send_command(&self.mailboxes, &card.rename_addr, name, interruptor).await
    }

    /// Asks the owner of `server_id` to replace its tag set.
    pub async fn retag_server(
        &self,
        server_id: ServerId,
        tags: BTreeSet<Name>,
        interruptor: &Interruptor,
    ) -> ClusterResult<()> {
        let card = self.card_for(server_id)?;
        send_command(&self.mailboxes, &card.retag_addr, tags, interruptor).await
    }

    /// The name of a live server, as currently known here.
    pub fn server_name(&self, server_id: ServerId) -> Option<Name> {
        self.view
            .get()
            .servers()
            .get(&server_id)
            .map(|server| server.name().clone())
    }

    /// Live servers currently called `name`, as known here.
    pub fn server_ids_named(&self, name: &Name) -> Vec<ServerId> {
        self.view.get().server_ids_named(name)
    }

    fn card_for(&self, server_id: ServerId) -> ClusterResult<ServerConfigBusinessCard> {
        self.view
            .get()
            .servers()
            .get(&server_id)
            .map(|server| server.config_card().clone())
            .ok_or_else(|| ClusterError::Conflict(format!("server {server_id} does not exist")))
    }
}
