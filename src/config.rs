//! Peer configuration: identity, membership, and timing knobs.
//!
//! Mirrors the role `aerolithdb-core::config::NodeConfig` plays for the
//! database — a small, serializable, `Default`-backed settings struct handed
//! to the engine at construction time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A peer's position in the (fixed, 8-bit) peer group.
///
/// Proposal-number minting embeds this in the low 8 bits of every number it
/// mints, so peer ids must fit in a single byte and be distinct across the
/// group.
pub type PeerId = u8;

/// Static configuration for one peer's consensus engine.
///
/// The peer list is immutable for the lifetime of the engine; dynamic
/// membership changes are out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// This peer's own id. Must appear in `peers`.
    pub id: PeerId,

    /// The full, ordered list of peer ids in the group, including `id`.
    pub peers: Vec<PeerId>,

    /// Period between proposer-driver ticks. Roughly 200ms is a reasonable
    /// default for an in-process cluster.
    pub tick_interval: Duration,

    /// Number of ticks a round may go without a phase transition before the
    /// proposer starts a fresh round at a higher proposal number.
    pub stall_ticks: u32,

    /// Per-request transport timeout, enforced by the `RpcTransport`
    /// implementation.
    pub request_timeout: Duration,
}

impl PeerConfig {
    /// Majority size for this peer's configured group: strictly more than
    /// half the peer count.
    pub fn majority(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    /// Number of peers in the group, including self.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Validate that `id` is a member of `peers` and that `peers` has no
    /// duplicates.
    pub fn validate(&self) -> crate::error::Result<()> {
        use std::collections::HashSet;

        if !self.peers.contains(&self.id) {
            return Err(crate::error::PaxosError::NotAMember(self.id));
        }

        let mut seen = HashSet::with_capacity(self.peers.len());
        for peer in &self.peers {
            if !seen.insert(*peer) {
                return Err(crate::error::PaxosError::DuplicatePeer(*peer));
            }
        }
        Ok(())
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            id: 0,
            peers: vec![0],
            tick_interval: Duration::from_millis(200),
            stall_ticks: 5,
            request_timeout: Duration::from_millis(500),
        }
    }
}
