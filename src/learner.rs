//! Learner role: records decided values and folds them into the instance
//! store.
//!
//! The learner has no state of its own — it is a thin, logged entry point
//! in front of [`InstanceStore::mark_decided`], invoked whenever the event
//! loop observes a Decide message, a synthetic "already decided" prepare
//! reply, or its own proposer round reaching `Decided`.

use tracing::info;

use crate::instance::{InstanceStore, Seq};
use crate::value::Value;

/// Learn that `seq` has been decided as `value`. Idempotent: a seq that is
/// already Decided or Forgotten is left untouched: repeated Decide
/// messages for the same (seq, value) are idempotent.
pub fn learn(store: &mut InstanceStore, seq: Seq, value: Value) {
    let was_known = store.decided_value(seq).is_some();
    store.mark_decided(seq, value);
    if !was_known {
        info!(seq, "learned decided value");
    }
}
