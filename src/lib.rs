//! An embeddable single-decree Paxos replicated log.
//!
//! A fixed, statically-configured group of peers agrees on a value per log
//! position ("instance"). Each peer runs one [`engine::PeerHandle`] in
//! process: the host starts agreement with [`engine::PeerHandle::start`],
//! polls outcomes with [`engine::PeerHandle::status`], and reclaims memory
//! with [`engine::PeerHandle::done`]. Networking, RPC serving, and value
//! encoding are external collaborators this crate depends on only through
//! the [`transport::RpcTransport`] and [`transport::Clock`] traits — it
//! never opens a socket itself.
//!
//! No persistence across restarts, no dynamic membership, no leader
//! election, and no cross-instance ordering: each instance is agreed on
//! independently.

pub mod acceptor;
pub mod config;
pub mod engine;
pub mod error;
pub mod instance;
pub mod learner;
pub mod proposer;
pub mod transport;
pub mod value;
pub mod wire;

pub use config::{PeerConfig, PeerId};
pub use engine::{spawn, PeerHandle};
pub use error::{PaxosError, Result, TransportError};
pub use instance::{Fate, Seq};
pub use transport::{Clock, RpcTransport, SystemClock};
pub use value::Value;
