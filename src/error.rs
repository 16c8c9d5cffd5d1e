//! Error types for the Paxos engine.

use thiserror::Error;

/// Errors that can surface from engine construction or the host API.
///
/// Per-round failures (rejections, stale replies, dropped messages) are not
/// represented here: the protocol treats those as ordinary outcomes to be
/// retried on the next tick, not as errors.
#[derive(Error, Debug)]
pub enum PaxosError {
    /// The local peer id does not appear in its own peer list.
    #[error("local peer {0} is not a member of the configured peer list")]
    NotAMember(crate::config::PeerId),

    /// The peer list contains a duplicate id.
    #[error("duplicate peer id {0} in peer list")]
    DuplicatePeer(crate::config::PeerId),

    /// A host command was submitted after the engine's event loop exited.
    ///
    /// Represents an internal queue closing unexpectedly: fatal to the
    /// caller's request but not to the rest of the process.
    #[error("consensus event loop has stopped")]
    EngineStopped,

    /// Encoding or decoding an application value failed.
    #[error("value codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, PaxosError>;

/// Transport-level failure: sending a request and awaiting its reply may
/// silently fail. Distinct from [`PaxosError`] because the event loop never
/// propagates it to the host — it only ever feeds the proposer's
/// retry-on-next-tick logic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No reply arrived before the transport's own timeout.
    #[error("request timed out")]
    Timeout,
    /// The destination peer is not reachable (e.g. simulated partition).
    #[error("peer unreachable")]
    Unreachable,
}
