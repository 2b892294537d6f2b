//! Business cards published by server owners.

use crate::rpc::CommandAddress;
use clustermeta_types::Name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How to reach a server's configuration owner.
///
/// Carried inside the server's replicated record. A restarted server
/// publishes a new card at a higher version, so stale cards lose on join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigBusinessCard {
    /// Where to send name-change orders.
    pub rename_addr: CommandAddress<Name>,
    /// Where to send tag-change orders.
    pub retag_addr: CommandAddress<BTreeSet<Name>>,
}
