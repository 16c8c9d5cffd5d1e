//! Wire protocol: the four request/reply pairs peers exchange.
//!
//! These types are transport-agnostic payloads; an [`crate::transport::RpcTransport`]
//! implementation is responsible for actually getting them to a peer and
//! back. Sentinel values: `N_a = -1` in [`PrepareReply`] and `N = -1` in
//! [`AcceptReply`]/[`DecideReply`] mean rejection; `N_a = 1` with a
//! populated `v_a` means "already decided".

use serde::{Deserialize, Serialize};

use crate::instance::Seq;
use crate::value::Value;

/// A proposal number: globally unique across peers, strictly increasing
/// per proposer.
pub type ProposalNumber = i64;

/// Rejection sentinel used in [`PrepareReply::n_a`] and in
/// [`AcceptReply::n`] / [`DecideReply::n`].
pub const REJECT: ProposalNumber = -1;

/// Sentinel marking a [`PrepareReply`] as a synthetic "already decided"
/// piggyback rather than an ordinary prepare-ok.
pub const ALREADY_DECIDED: ProposalNumber = 1;

/// The `(Seq, Value)` pair the acceptor keys its decisions on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstancePayload {
    pub seq: Seq,
    pub value: Value,
}

/// Rallies support for a new ballot/proposal number over `[starting_seq]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub n: ProposalNumber,
    pub instance: InstancePayload,
}

/// Reply to [`PrepareRequest`]. `n_a == REJECT` rejects; `n_a ==
/// ALREADY_DECIDED` piggybacks a learned value; otherwise `n_a`/`v_a` carry
/// the highest previously accepted proposal (possibly none, i.e. `n_a` left
/// at the acceptor's default).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareReply {
    pub n: ProposalNumber,
    pub n_a: ProposalNumber,
    pub v_a: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub n: ProposalNumber,
    pub instance: InstancePayload,
}

/// Reply to [`AcceptRequest`]. `n == REJECT` rejects; otherwise `n` echoes
/// the accepted proposal number (accept-ok).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptReply {
    pub n: ProposalNumber,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecideRequest {
    pub n: ProposalNumber,
    pub instance: InstancePayload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecideReply {
    pub n: ProposalNumber,
}

/// The single host-driven command peers exchange over the wire: `Min`
/// contacts every peer to compute the global reclamation watermark.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandName {
    Min,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: CommandName,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandReply {
    pub seq: i64,
}

/// Every request the engine can receive from, or send to, a peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request {
    Prepare(PrepareRequest),
    Accept(AcceptRequest),
    Decide(DecideRequest),
    Command(CommandRequest),
}

/// Every reply the engine can produce, or receive from a peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Reply {
    Prepare(PrepareReply),
    Accept(AcceptReply),
    Decide(DecideReply),
    Command(CommandReply),
}
