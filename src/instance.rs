//! The instance store: pending queue, decided set, and Done/Min bookkeeping.
//!
//! Two ordered collections drive this module — the pending queue of
//! locally started instances and the decided set of learned outcomes —
//! plus the Done watermark exchange that drives reclamation. This module
//! owns all three; it has no network or timing dependencies of its own,
//! matching how `aerolithdb-consensus` keeps its `committed_log` a plain
//! data structure behind a lock rather than an actor of its own.

use std::collections::{BTreeMap, VecDeque};

use crate::config::PeerId;
use crate::value::Value;

/// A non-negative log position.
pub type Seq = u64;

/// The lifecycle state of one instance: fate only ever advances forward
/// through `Pending -> Decided -> Forgotten`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Pending,
    Decided,
    Forgotten,
}

/// One entry in the decided set: a learned value, or a former value that
/// has since been reclaimed.
#[derive(Debug, Clone)]
enum DecidedEntry {
    Decided(Value),
    Forgotten,
}

/// A locally started instance awaiting (or having reached) agreement.
#[derive(Debug, Clone)]
pub struct PendingSlot {
    pub seq: Seq,
    pub value: Value,
}

/// Pending queue + decided set + Done/Min bookkeeping for one peer.
///
/// This struct is owned exclusively by the event loop: nothing here is
/// `Send`-guarded internally, because it is never touched from more than
/// one task at a time.
#[derive(Debug)]
pub struct InstanceStore {
    /// Locally started instances, in start order.
    pending: VecDeque<PendingSlot>,
    /// Index into `pending` of the next slot the proposer driver should
    /// consider: the pending queue is scanned from the current index
    /// forward, not from the start, each time.
    next_index: usize,
    /// Learned outcomes, keyed by sequence.
    decided: BTreeMap<Seq, DecidedEntry>,
    /// This peer's own Done watermark: the highest sequence the host has
    /// declared it no longer needs. `None` means Done has never been
    /// called.
    local_done: Option<Seq>,
    /// The last Done watermark observed from every peer, used to compute
    /// Min. Peers that fail to respond keep their previous entry, so Min
    /// never regresses.
    peer_done: BTreeMap<PeerId, Option<Seq>>,
    /// Cached result of the most recent `Min()` computation, used to
    /// answer `Status` for sequences below the watermark even if this peer
    /// never separately learned they were decided.
    known_min: i64,
}

impl InstanceStore {
    pub fn new(peers: &[PeerId]) -> Self {
        let mut peer_done = BTreeMap::new();
        for peer in peers {
            peer_done.insert(*peer, None);
        }
        Self {
            pending: VecDeque::new(),
            next_index: 0,
            decided: BTreeMap::new(),
            local_done: None,
            peer_done,
            known_min: -1,
        }
    }

    /// Record a new locally started instance.
    pub fn start(&mut self, seq: Seq, value: Value) {
        self.pending.push_back(PendingSlot { seq, value });
    }

    /// The fate of `seq` as currently known to this peer.
    pub fn fate(&self, seq: Seq) -> Fate {
        match self.decided.get(&seq) {
            Some(DecidedEntry::Decided(_)) => Fate::Decided,
            Some(DecidedEntry::Forgotten) => Fate::Forgotten,
            None => {
                if self.known_min >= 0 && seq < self.known_min as u64 {
                    Fate::Forgotten
                } else {
                    Fate::Pending
                }
            }
        }
    }

    /// `Status(seq)`: fate plus value. Forgotten and unknown sequences
    /// carry an empty value.
    pub fn status(&self, seq: Seq) -> (Fate, Value) {
        match self.decided.get(&seq) {
            Some(DecidedEntry::Decided(v)) => (Fate::Decided, v.clone()),
            Some(DecidedEntry::Forgotten) => (Fate::Forgotten, Value::empty()),
            None => {
                if self.known_min >= 0 && seq < self.known_min as u64 {
                    (Fate::Forgotten, Value::empty())
                } else {
                    (Fate::Pending, Value::empty())
                }
            }
        }
    }

    /// Record `value` as the chosen value for `seq`. Idempotent: a second
    /// Decide for the same sequence (even with a different proposer's
    /// metadata) does not change an already-decided value.
    ///
    /// Does not overwrite an existing Forgotten entry: fate only advances
    /// forward.
    pub fn mark_decided(&mut self, seq: Seq, value: Value) {
        self.decided
            .entry(seq)
            .or_insert(DecidedEntry::Decided(value));
    }

    /// True if `seq` is already known Decided; used by the acceptor to
    /// answer Prepare with the "already decided" synthetic reply.
    pub fn decided_value(&self, seq: Seq) -> Option<Value> {
        match self.decided.get(&seq) {
            Some(DecidedEntry::Decided(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// The first pending slot the proposer driver should work on, skipping
    /// any whose sequence has already been decided. Advances `next_index`
    /// past decided entries as a side effect.
    pub fn next_undecided(&mut self) -> Option<&PendingSlot> {
        while let Some(slot) = self.pending.get(self.next_index) {
            if self.fate(slot.seq) == Fate::Decided || self.fate(slot.seq) == Fate::Forgotten {
                self.next_index += 1;
                continue;
            }
            return self.pending.get(self.next_index);
        }
        None
    }

    /// `Done(seq)`: record this peer's new watermark. This only ever
    /// advances `local_done` — the Decided -> Forgotten transition (for
    /// this peer's own entries as much as any other peer's) only happens
    /// once the cross-peer Min has actually risen past a sequence, via
    /// [`InstanceStore::observe_peer_watermarks`]. Forgetting locally on
    /// Done alone, before Min has risen, would let this peer discard its
    /// "already decided" piggyback data before the rest of the cluster is
    /// known to have caught up.
    pub fn done(&mut self, seq: Seq) {
        self.local_done = Some(self.local_done.map_or(seq, |prev| prev.max(seq)));
    }

    /// This peer's own Done watermark, answered over the wire for another
    /// peer's `Min()` Command RPC.
    pub fn local_done_watermark(&self) -> Option<Seq> {
        self.local_done
    }

    /// Record a watermark observed from `peer` (or `None` if it failed to
    /// respond to this round's `Min()` query) and recompute the global
    /// Min, reclaiming anything that now falls below it.
    ///
    /// Returns the newly computed Min.
    pub fn observe_peer_watermarks(
        &mut self,
        observed: impl IntoIterator<Item = (PeerId, Option<Seq>)>,
    ) -> i64 {
        for (peer, watermark) in observed {
            if let Some(w) = watermark {
                let entry = self.peer_done.entry(peer).or_insert(None);
                *entry = Some(entry.map_or(w, |prev| prev.max(w)));
            }
            // A non-responding peer keeps its previous (possibly `None`)
            // entry, so Min cannot advance past it.
        }

        let min = self
            .peer_done
            .values()
            .map(|w| w.map(|s| s as i64).unwrap_or(-1))
            .min()
            .unwrap_or(-1);
        let new_min = min + 1;

        if new_min > self.known_min {
            self.known_min = new_min;
            if new_min > 0 {
                self.forget_below(new_min as u64);
            }
        }
        self.known_min
    }

    /// Move every Decided entry with sequence `< ceiling` to Forgotten,
    /// clearing its value.
    fn forget_below(&mut self, ceiling: Seq) {
        for (seq, entry) in self.decided.iter_mut() {
            if *seq < ceiling {
                if matches!(entry, DecidedEntry::Decided(_)) {
                    *entry = DecidedEntry::Forgotten;
                }
            }
        }
    }

    /// The largest sequence known in the decided set, including Forgotten
    /// entries. `None` if the decided set is empty; the command handler
    /// maps that to 0 (see DESIGN.md for why 0 rather than -1).
    pub fn max_known(&self) -> Option<Seq> {
        self.decided.keys().next_back().copied()
    }
}
