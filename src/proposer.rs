//! Proposer role: drives one in-flight agreement attempt per peer. Pure
//! state machine — no I/O, no timing source beyond the unix timestamp the
//! event loop feeds it for proposal-number minting.

use tracing::{debug, info};

use crate::config::PeerId;
use crate::instance::{PendingSlot, Seq};
use crate::value::Value;
use crate::wire::{
    AcceptReply, DecideReply, InstancePayload, PrepareReply, ProposalNumber, ALREADY_DECIDED,
    REJECT,
};

/// What the event loop should do after feeding the proposer a tick or a
/// reply. The proposer never sends anything itself — it only says what to
/// fan out, keeping all I/O in the event loop.
#[derive(Debug, Clone)]
pub enum RoundAction {
    /// Nothing to do this turn (reply discarded, or no threshold crossed
    /// yet).
    None,
    /// Fan out a fresh `Prepare(n, instance)` to every peer.
    SendPrepare {
        n: ProposalNumber,
        instance: InstancePayload,
    },
    /// A majority of prepare-oks arrived; fan out `Accept(n, instance)`.
    SendAccept {
        n: ProposalNumber,
        instance: InstancePayload,
    },
    /// A majority of accept-oks arrived; fan out `Decide(n, instance)`.
    SendDecide {
        n: ProposalNumber,
        instance: InstancePayload,
    },
    /// A majority of decide-acks (or a piggybacked already-decided value)
    /// arrived; the instance store should learn `(seq, value)`.
    Decided { seq: Seq, value: Value },
}

/// One peer's proposer state. At most one round is ever in flight,
/// matching the single, non-instance-keyed [`crate::acceptor::AcceptorState`].
#[derive(Debug)]
pub struct ProposerState {
    propose_n: ProposalNumber,
    propose_v: Value,
    /// Highest `(n_a, v_a)` seen among prepare-ok replies so far this
    /// round, used to adopt a previously accepted value.
    best_seen: Option<(ProposalNumber, Value)>,
    prepare_votes: usize,
    accept_votes: usize,
    prepared: bool,
    accepted: bool,
    decided: bool,
    current_seq: Option<Seq>,
    stall_ticks: u32,
    stall_threshold: u32,
    /// The highest proposal number this peer has ever minted, enforced
    /// strictly increasing regardless of wall-clock jitter.
    last_minted: ProposalNumber,
}

impl ProposerState {
    pub fn new(stall_threshold: u32) -> Self {
        Self {
            propose_n: REJECT,
            propose_v: Value::empty(),
            best_seen: None,
            prepare_votes: 0,
            accept_votes: 0,
            prepared: false,
            accepted: false,
            decided: false,
            current_seq: None,
            stall_ticks: 0,
            stall_threshold,
            last_minted: REJECT,
        }
    }

    /// Mint a proposal number for `peer_id` at wall-clock second
    /// `now_unix_secs`, bumping past any number this peer has minted
    /// before. Strict per-peer monotonicity must hold even if the clock
    /// has not advanced since the last mint.
    fn mint(&mut self, peer_id: PeerId, now_unix_secs: i64) -> ProposalNumber {
        let candidate = (now_unix_secs << 8) | (peer_id as i64 & 0xFF);
        let n = if candidate > self.last_minted {
            candidate
        } else {
            self.last_minted + 1
        };
        self.last_minted = n;
        n
    }

    /// Drive one tick of the proposer for the given candidate instance
    /// (the first undecided pending slot). Starts a fresh round if this is
    /// a new instance, or if the current round has stalled for
    /// `stall_threshold` ticks without a phase transition.
    pub fn on_tick(
        &mut self,
        candidate: &PendingSlot,
        peer_id: PeerId,
        now_unix_secs: i64,
    ) -> RoundAction {
        let same_instance = self.current_seq == Some(candidate.seq);
        if !same_instance {
            return self.start_round(candidate.seq, candidate.value.clone(), peer_id, now_unix_secs);
        }

        self.stall_ticks += 1;
        if self.stall_ticks >= self.stall_threshold {
            info!(
                seq = candidate.seq,
                stall_ticks = self.stall_ticks,
                "round stalled, starting a fresh round at a higher proposal number"
            );
            return self.start_round(candidate.seq, candidate.value.clone(), peer_id, now_unix_secs);
        }
        RoundAction::None
    }

    fn start_round(
        &mut self,
        seq: Seq,
        value: Value,
        peer_id: PeerId,
        now_unix_secs: i64,
    ) -> RoundAction {
        self.current_seq = Some(seq);
        self.propose_v = value;
        self.best_seen = None;
        self.prepare_votes = 0;
        self.accept_votes = 0;
        self.prepared = false;
        self.accepted = false;
        self.decided = false;
        self.stall_ticks = 0;
        self.propose_n = self.mint(peer_id, now_unix_secs);

        debug!(seq, n = self.propose_n, "starting round");
        RoundAction::SendPrepare {
            n: self.propose_n,
            instance: InstancePayload {
                seq,
                value: self.propose_v.clone(),
            },
        }
    }

    /// Fold in one `PrepareReply`. Replies for a phase already transitioned
    /// past, or for a stale `n`, are silently discarded.
    pub fn handle_prepare_reply(&mut self, reply: &PrepareReply, majority: usize) -> RoundAction {
        if self.prepared || reply.n != self.propose_n || reply.n_a == REJECT {
            return RoundAction::None;
        }

        self.prepare_votes += 1;

        if reply.n_a > 0 || reply.n_a == ALREADY_DECIDED {
            let better = match &self.best_seen {
                Some((best_n, _)) => reply.n_a > *best_n,
                None => true,
            };
            if better {
                self.best_seen = Some((reply.n_a, reply.v_a.clone()));
            }
        }

        if self.prepare_votes >= majority {
            self.prepared = true;
            if let Some((_, v)) = self.best_seen.take() {
                self.propose_v = v;
            }
            let seq = self.current_seq.expect("round in progress");
            return RoundAction::SendAccept {
                n: self.propose_n,
                instance: InstancePayload {
                    seq,
                    value: self.propose_v.clone(),
                },
            };
        }
        RoundAction::None
    }

    /// Fold in one `AcceptReply`.
    pub fn handle_accept_reply(&mut self, reply: &AcceptReply, majority: usize) -> RoundAction {
        if self.accepted || reply.n != self.propose_n {
            return RoundAction::None;
        }

        self.accept_votes += 1;
        if self.accept_votes >= majority {
            self.accepted = true;
            let seq = self.current_seq.expect("round in progress");
            return RoundAction::SendDecide {
                n: self.propose_n,
                instance: InstancePayload {
                    seq,
                    value: self.propose_v.clone(),
                },
            };
        }
        RoundAction::None
    }

    /// Fold in one `DecideReply`.
    pub fn handle_decide_reply(&mut self, reply: &DecideReply) -> RoundAction {
        if self.decided || reply.n != self.propose_n {
            return RoundAction::None;
        }
        self.decided = true;
        let seq = self.current_seq.expect("round in progress");
        RoundAction::Decided {
            seq,
            value: self.propose_v.clone(),
        }
    }
}
