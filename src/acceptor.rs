//! Acceptor role: per-peer promise/accepted state and the Prepare/Accept/
//! Decide handlers.
//!
//! A peer keeps exactly one `(n_p, n_a, v_a)` triple across *all*
//! sequences and resets it on Decide, rather than one triple per instance.
//! That only stays safe if each peer drives at most one in-flight instance
//! at a time — the same discipline the proposer driver in
//! [`crate::proposer`] enforces by only ever having one round in progress.

use tracing::{debug, warn};

use crate::instance::InstanceStore;
use crate::value::Value;
use crate::wire::{
    AcceptReply, AcceptRequest, DecideReply, DecideRequest, PrepareReply, PrepareRequest,
    ProposalNumber, ALREADY_DECIDED, REJECT,
};

/// The acceptor's promise/accepted state, global across instances.
#[derive(Debug)]
pub struct AcceptorState {
    /// Highest proposal number for which a prepare-promise was issued.
    n_p: ProposalNumber,
    /// Proposal number of the most recently accepted value.
    n_a: ProposalNumber,
    /// The value accepted under `n_a`.
    v_a: Value,
    /// Whether a round is currently in progress at this acceptor. This
    /// guard is not part of classical Paxos and can cause livelock under
    /// certain message orderings (an Accept arriving before any local
    /// Prepare is rejected outright); kept as-is rather than relaxed.
    rounding: bool,
}

/// Sentinel for "this acceptor has never accepted anything", distinct from
/// `REJECT`: a prepare-ok with `n_a == NEVER_ACCEPTED` must still be
/// counted as an ok by the proposer, not discarded as a rejection. Real
/// minted proposal numbers (`unix_secs << 8 | peer_id`) are always far
/// larger than this.
const NEVER_ACCEPTED: ProposalNumber = 0;

impl Default for AcceptorState {
    fn default() -> Self {
        Self {
            n_p: REJECT,
            n_a: NEVER_ACCEPTED,
            v_a: Value::empty(),
            rounding: false,
        }
    }
}

impl AcceptorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an incoming `Prepare(N, V)`.
    pub fn handle_prepare(
        &mut self,
        store: &InstanceStore,
        request: &PrepareRequest,
    ) -> PrepareReply {
        let seq = request.instance.seq;

        if let Some(decided_value) = store.decided_value(seq) {
            debug!(seq, n = request.n, "prepare: already decided, piggybacking value");
            return PrepareReply {
                n: request.n,
                n_a: ALREADY_DECIDED,
                v_a: decided_value,
            };
        }

        if request.n > self.n_p {
            self.n_p = request.n;
            self.rounding = true;
            debug!(seq, n = request.n, "prepare: promised");
            PrepareReply {
                n: request.n,
                n_a: self.n_a,
                v_a: self.v_a.clone(),
            }
        } else {
            warn!(seq, n = request.n, n_p = self.n_p, "prepare: rejected, stale proposal number");
            PrepareReply {
                n: request.n,
                n_a: REJECT,
                v_a: Value::empty(),
            }
        }
    }

    /// Handle an incoming `Accept(N, V)`.
    pub fn handle_accept(&mut self, request: &AcceptRequest) -> AcceptReply {
        if !self.rounding {
            warn!(
                seq = request.instance.seq,
                n = request.n,
                "accept: rejected, no round in progress locally"
            );
            return AcceptReply { n: REJECT };
        }

        if request.n >= self.n_p {
            self.n_p = request.n;
            self.n_a = request.n;
            self.v_a = request.instance.value.clone();
            debug!(seq = request.instance.seq, n = request.n, "accept: accepted");
            AcceptReply { n: request.n }
        } else {
            warn!(
                seq = request.instance.seq,
                n = request.n,
                n_p = self.n_p,
                "accept: rejected, stale proposal number"
            );
            AcceptReply { n: REJECT }
        }
    }

    /// Handle an incoming `Decide(N, V)`. Returns the value to fold into
    /// the learner's store; resets this acceptor's state.
    pub fn handle_decide(&mut self, request: &DecideRequest) -> (DecideReply, Value) {
        debug!(seq = request.instance.seq, n = request.n, "decide: learned, resetting acceptor state");
        let value = request.instance.value.clone();
        *self = Self::default();
        (DecideReply { n: request.n }, value)
    }
}
