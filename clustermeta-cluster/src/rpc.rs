//! Business-card RPC.
//!
//! A command address is a typed mailbox address that can be stored in
//! replicated metadata and used by any node to reach the owner of a
//! resource. The caller attaches a transient reply address to each command
//! and suspends until the owner acknowledges or the caller is interrupted.
//!
//! The ack carries no state. The effect of a command reaches every node,
//! the caller included, through the join substrate, possibly before and
//! possibly after the ack.

use crate::error::{ClusterError, ClusterResult};
use crate::interrupt::{Interruptor, interruptible};
use crate::mailbox::{Mailbox, MailboxAddress, MailboxManager};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Address of a mailbox accepting commands with payload `P`.
#[derive(Serialize, Deserialize)]
pub struct CommandAddress<P> {
    address: MailboxAddress,
    #[serde(skip)]
    _payload: PhantomData<fn(P)>,
}

impl<P> CommandAddress<P> {
    /// Returns the untyped mailbox address.
    pub fn address(&self) -> MailboxAddress {
        self.address
    }
}

impl<P> Clone for CommandAddress<P> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            _payload: PhantomData,
        }
    }
}

impl<P> PartialEq for CommandAddress<P> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl<P> Eq for CommandAddress<P> {}

impl<P> fmt::Debug for CommandAddress<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandAddress").field(&self.address).finish()
    }
}

/// A command as it travels on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command<P> {
    /// What the owner should do.
    pub payload: P,
    /// Where the owner sends its [`CommandAck`].
    pub reply_to: MailboxAddress,
}

/// The owner's answer to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandAck {
    /// The command was applied (or was already in effect).
    Applied,
    /// The command is invalid for this resource.
    Invalid { reason: String },
    /// The command collides with other resources' state.
    Conflict { reason: String },
}

/// Receiving end of a command address.
pub struct CommandMailbox<P> {
    inner: Mailbox<Command<P>>,
}

impl<P: DeserializeOwned> CommandMailbox<P> {
    /// Registers a new command mailbox.
    pub fn new(mailboxes: &MailboxManager) -> Self {
        Self {
            inner: mailboxes.create(),
        }
    }

    /// Returns the address to publish in a business card.
    pub fn address(&self) -> CommandAddress<P> {
        CommandAddress {
            address: self.inner.address(),
            _payload: PhantomData,
        }
    }

    /// Waits for the next command.
    pub async fn recv(&mut self) -> Option<Command<P>> {
        self.inner.recv().await
    }
}

/// Sends a command to `target` and waits for the owner's ack.
///
/// On [`ClusterError::Interrupted`] the outcome is unknown: the owner may
/// already have applied the command. Nothing is rolled back. An owner that
/// no longer exists never acks, so callers need an interruptor that
/// eventually fires (see [`crate::interrupt_after`]).
pub async fn send_command<P: Serialize>(
    mailboxes: &MailboxManager,
    target: &CommandAddress<P>,
    payload: P,
    interruptor: &Interruptor,
) -> ClusterResult<()> {
    if interruptor.is_cancelled() {
        return Err(ClusterError::Interrupted);
    }

    let mut reply_box = mailboxes.create::<CommandAck>();
    let command = Command {
        payload,
        reply_to: reply_box.address(),
    };
    interruptible(mailboxes.send(&target.address, &command), interruptor).await??;
    debug!(to = %target.address, "command sent; awaiting ack");

    let ack = interruptible(reply_box.recv(), interruptor)
        .await?
        .ok_or(ClusterError::ChannelClosed)?;
    match ack {
        CommandAck::Applied => Ok(()),
        CommandAck::Invalid { reason } => Err(ClusterError::Validation(reason)),
        CommandAck::Conflict { reason } => Err(ClusterError::Conflict(reason)),
    }
}

/// Sends `ack` back to the caller of `reply_to`.
///
/// Owners that need to stop while a send is stalled wrap this in
/// [`interruptible`].
pub async fn acknowledge(
    mailboxes: &MailboxManager,
    reply_to: &MailboxAddress,
    ack: &CommandAck,
) -> ClusterResult<()> {
    mailboxes.send(reply_to, ack).await
}
