//! The external collaborators the core consumes but never implements for
//! production use: a send-and-await-reply transport, and a monotonic wall
//! clock. Both are traits so the engine can be driven by a real network
//! stack or, in tests, by an in-process simulation.
//!
//! A third collaborator — a register-handler hook exposing inbound
//! messages to the core — has no trait here: the engine's own inbound
//! request channel (see [`crate::engine`]) *is* that hook. A transport
//! delivers an inbound [`crate::wire::Request`] by pushing it onto that
//! channel together with a reply sink.

use async_trait::async_trait;

use crate::config::PeerId;
use crate::error::TransportError;
use crate::wire::{Reply, Request};

/// Send `request` to `peer` and await its reply, or fail if no reply
/// arrives before the transport's own timeout. Implementations may drop,
/// reorder, or duplicate messages in either direction; the protocol
/// tolerates all three.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, peer: PeerId, request: Request) -> Result<Reply, TransportError>;
}

/// A monotonic wall clock. Only whole seconds matter to the engine:
/// proposal-number minting embeds `now_unix_secs` in the high bits.
pub trait Clock: Send + Sync {
    /// Current time as unix seconds.
    fn now_unix_secs(&self) -> i64;
}

/// The real wall clock, backed by [`std::time::SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}
