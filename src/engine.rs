//! The event loop: owns all mutable state and is the only place state
//! transitions happen. Everything else in this crate is a pure function or
//! a pure state machine this module drives.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

use crate::acceptor::AcceptorState;
use crate::config::PeerConfig;
use crate::error::{PaxosError, Result};
use crate::instance::{Fate, InstanceStore, Seq};
use crate::proposer::{ProposerState, RoundAction};
use crate::transport::{Clock, RpcTransport};
use crate::value::Value;
use crate::wire::{
    AcceptReply, CommandName, CommandRequest, DecideReply, InstancePayload, PrepareReply,
    ProposalNumber, Reply, Request,
};

/// One reply arriving from our own fan-out (Prepare, Accept, or Decide),
/// re-entering the loop.
#[derive(Debug)]
enum RoundReplyEvent {
    Prepare(PrepareReply),
    Accept(AcceptReply),
    Decide(DecideReply),
}

/// A verb from the host API, minus `Kill`, which is wired straight to the
/// dedicated shutdown channel instead since it returns nothing and only
/// ever needs to signal the loop to stop.
enum HostCommand {
    Start {
        seq: Seq,
        value: Value,
    },
    Done {
        seq: Seq,
    },
    Max {
        reply: oneshot::Sender<Seq>,
    },
    Min {
        reply: oneshot::Sender<Seq>,
    },
    Status {
        seq: Seq,
        reply: oneshot::Sender<(Fate, Value)>,
    },
}

/// All state owned by the event loop.
struct LoopState {
    config: PeerConfig,
    transport: Arc<dyn RpcTransport>,
    clock: Arc<dyn Clock>,
    store: InstanceStore,
    acceptor: AcceptorState,
    proposer: ProposerState,
    round_reply_tx: mpsc::UnboundedSender<RoundReplyEvent>,
    min_result_tx: mpsc::UnboundedSender<(Vec<(crate::config::PeerId, Option<Seq>)>, oneshot::Sender<Seq>)>,
}

impl LoopState {
    fn on_tick(&mut self) {
        let now = self.clock.now_unix_secs();
        let peer_id = self.config.id;
        let candidate = self.store.next_undecided().cloned();
        if let Some(slot) = candidate {
            let action = self.proposer.on_tick(&slot, peer_id, now);
            self.apply_action(action);
        }
    }

    fn handle_inbound(&mut self, request: Request) -> Reply {
        match request {
            Request::Prepare(req) => {
                debug!(seq = req.instance.seq, n = req.n, "inbound prepare");
                Reply::Prepare(self.acceptor.handle_prepare(&self.store, &req))
            }
            Request::Accept(req) => {
                debug!(seq = req.instance.seq, n = req.n, "inbound accept");
                Reply::Accept(self.acceptor.handle_accept(&req))
            }
            Request::Decide(req) => {
                debug!(seq = req.instance.seq, n = req.n, "inbound decide");
                let (reply, value) = self.acceptor.handle_decide(&req);
                crate::learner::learn(&mut self.store, req.instance.seq, value);
                Reply::Decide(reply)
            }
            Request::Command(req) => match req.name {
                CommandName::Min => {
                    let seq = self
                        .store
                        .local_done_watermark()
                        .map(|s| s as i64)
                        .unwrap_or(-1);
                    Reply::Command(crate::wire::CommandReply { seq })
                }
            },
        }
    }

    fn handle_round_reply(&mut self, event: RoundReplyEvent) {
        let majority = self.config.majority();
        let action = match event {
            RoundReplyEvent::Prepare(reply) => self.proposer.handle_prepare_reply(&reply, majority),
            RoundReplyEvent::Accept(reply) => self.proposer.handle_accept_reply(&reply, majority),
            RoundReplyEvent::Decide(reply) => self.proposer.handle_decide_reply(&reply),
        };
        self.apply_action(action);
    }

    fn apply_action(&mut self, action: RoundAction) {
        match action {
            RoundAction::None => {}
            RoundAction::SendPrepare { n, instance } => self.fan_out_prepare(n, instance),
            RoundAction::SendAccept { n, instance } => self.fan_out_accept(n, instance),
            RoundAction::SendDecide { n, instance } => self.fan_out_decide(n, instance),
            RoundAction::Decided { seq, value } => {
                info!(seq, "own round reached decision");
                crate::learner::learn(&mut self.store, seq, value);
            }
        }
    }

    fn fan_out_prepare(&self, n: ProposalNumber, instance: InstancePayload) {
        for peer in self.config.peers.clone() {
            let transport = Arc::clone(&self.transport);
            let reply_tx = self.round_reply_tx.clone();
            let request = Request::Prepare(crate::wire::PrepareRequest {
                n,
                instance: instance.clone(),
            });
            tokio::spawn(async move {
                if let Ok(Reply::Prepare(reply)) = transport.call(peer, request).await {
                    let _ = reply_tx.send(RoundReplyEvent::Prepare(reply));
                }
            });
        }
    }

    fn fan_out_accept(&self, n: ProposalNumber, instance: InstancePayload) {
        for peer in self.config.peers.clone() {
            let transport = Arc::clone(&self.transport);
            let reply_tx = self.round_reply_tx.clone();
            let request = Request::Accept(crate::wire::AcceptRequest {
                n,
                instance: instance.clone(),
            });
            tokio::spawn(async move {
                if let Ok(Reply::Accept(reply)) = transport.call(peer, request).await {
                    let _ = reply_tx.send(RoundReplyEvent::Accept(reply));
                }
            });
        }
    }

    fn fan_out_decide(&self, n: ProposalNumber, instance: InstancePayload) {
        for peer in self.config.peers.clone() {
            let transport = Arc::clone(&self.transport);
            let reply_tx = self.round_reply_tx.clone();
            let request = Request::Decide(crate::wire::DecideRequest {
                n,
                instance: instance.clone(),
            });
            tokio::spawn(async move {
                if let Ok(Reply::Decide(reply)) = transport.call(peer, request).await {
                    let _ = reply_tx.send(RoundReplyEvent::Decide(reply));
                }
            });
        }
    }

    fn fan_out_min(&self, reply: oneshot::Sender<Seq>) {
        let peers = self.config.peers.clone();
        let transport = Arc::clone(&self.transport);
        let min_result_tx = self.min_result_tx.clone();
        tokio::spawn(async move {
            let futures = peers.into_iter().map(|peer| {
                let transport = Arc::clone(&transport);
                async move {
                    let request = Request::Command(CommandRequest {
                        name: CommandName::Min,
                    });
                    let watermark = match transport.call(peer, request).await {
                        Ok(Reply::Command(crate::wire::CommandReply { seq })) if seq >= 0 => {
                            Some(seq as Seq)
                        }
                        _ => None,
                    };
                    (peer, watermark)
                }
            });
            let results = join_all(futures).await;
            let _ = min_result_tx.send((results, reply));
        });
    }

    fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Start { seq, value } => {
                info!(seq, "start");
                self.store.start(seq, value);
            }
            HostCommand::Done { seq } => {
                debug!(seq, "done");
                self.store.done(seq);
            }
            HostCommand::Max { reply } => {
                let _ = reply.send(self.store.max_known().unwrap_or(0));
            }
            HostCommand::Status { seq, reply } => {
                let _ = reply.send(self.store.status(seq));
            }
            HostCommand::Min { reply } => self.fan_out_min(reply),
        }
    }
}

async fn run(
    mut state: LoopState,
    mut request_rx: mpsc::UnboundedReceiver<(Request, oneshot::Sender<Reply>)>,
    mut command_rx: mpsc::UnboundedReceiver<HostCommand>,
    mut round_reply_rx: mpsc::UnboundedReceiver<RoundReplyEvent>,
    mut min_result_rx: mpsc::UnboundedReceiver<(
        Vec<(crate::config::PeerId, Option<Seq>)>,
        oneshot::Sender<Seq>,
    )>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(peer = state.config.id, "consensus event loop starting");
    let mut ticker = tokio::time::interval(state.config.tick_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.on_tick();
            }
            Some((request, reply_tx)) = request_rx.recv() => {
                let reply = state.handle_inbound(request);
                let _ = reply_tx.send(reply);
            }
            Some(event) = round_reply_rx.recv() => {
                state.handle_round_reply(event);
            }
            Some((results, reply)) = min_result_rx.recv() => {
                let min = state.store.observe_peer_watermarks(results);
                let _ = reply.send(min.max(0) as Seq);
            }
            Some(command) = command_rx.recv() => {
                state.handle_command(command);
            }
            _ = &mut shutdown_rx => {
                info!(peer = state.config.id, "shutdown signal received");
                break;
            }
        }
    }

    info!(peer = state.config.id, "consensus event loop stopped");
}

/// A handle to a running consensus engine: the host API a caller drives
/// agreement through.
///
/// Cheaply cloneable; every clone talks to the same event loop task.
#[derive(Clone)]
pub struct PeerHandle {
    command_tx: mpsc::UnboundedSender<HostCommand>,
    request_tx: mpsc::UnboundedSender<(Request, oneshot::Sender<Reply>)>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl PeerHandle {
    /// `Start(seq, value)`: enqueue-only, never blocks on agreement.
    pub fn start(&self, seq: Seq, value: Value) -> Result<()> {
        self.command_tx
            .send(HostCommand::Start { seq, value })
            .map_err(|_| PaxosError::EngineStopped)
    }

    /// `Done(seq)`: mark everything `<= seq` as no longer needed locally.
    pub fn done(&self, seq: Seq) -> Result<()> {
        self.command_tx
            .send(HostCommand::Done { seq })
            .map_err(|_| PaxosError::EngineStopped)
    }

    /// `Max()`: highest known sequence, 0 if none.
    pub async fn max(&self) -> Result<Seq> {
        let (reply, recv) = oneshot::channel();
        self.command_tx
            .send(HostCommand::Max { reply })
            .map_err(|_| PaxosError::EngineStopped)?;
        recv.await.map_err(|_| PaxosError::EngineStopped)
    }

    /// `Min()`: one more than the minimum Done watermark across all
    /// peers; contacts every peer.
    pub async fn min(&self) -> Result<Seq> {
        let (reply, recv) = oneshot::channel();
        self.command_tx
            .send(HostCommand::Min { reply })
            .map_err(|_| PaxosError::EngineStopped)?;
        recv.await.map_err(|_| PaxosError::EngineStopped)
    }

    /// `Status(seq)`: `(Fate, value)` for this sequence, without
    /// contacting other peers.
    pub async fn status(&self, seq: Seq) -> Result<(Fate, Value)> {
        let (reply, recv) = oneshot::channel();
        self.command_tx
            .send(HostCommand::Status { seq, reply })
            .map_err(|_| PaxosError::EngineStopped)?;
        recv.await.map_err(|_| PaxosError::EngineStopped)
    }

    /// `Kill()`: signal the event loop to stop on its next iteration. A
    /// second call is a no-op.
    pub fn kill(&self) -> Result<()> {
        if let Ok(mut guard) = self.shutdown_tx.try_lock() {
            if let Some(sender) = guard.take() {
                let _ = sender.send(());
            }
        }
        Ok(())
    }

    /// The inbound RPC hook: a host's transport server delivers a wire
    /// [`Request`] here and awaits the computed [`Reply`], staying
    /// suspended until the event loop replies rather than polling a
    /// separate queue.
    pub async fn dispatch(&self, request: Request) -> Result<Reply> {
        let (reply, recv) = oneshot::channel();
        self.request_tx
            .send((request, reply))
            .map_err(|_| PaxosError::EngineStopped)?;
        recv.await.map_err(|_| PaxosError::EngineStopped)
    }
}

/// Spawn a new consensus engine for one peer and return a handle to it.
///
/// `transport` and `clock` are the external collaborators this crate
/// depends on but never constructs a production implementation of.
pub fn spawn(
    config: PeerConfig,
    transport: Arc<dyn RpcTransport>,
    clock: Arc<dyn Clock>,
) -> Result<PeerHandle> {
    config.validate()?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (round_reply_tx, round_reply_rx) = mpsc::unbounded_channel();
    let (min_result_tx, min_result_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let stall_ticks = config.stall_ticks;
    let peers = config.peers.clone();
    let state = LoopState {
        config,
        transport,
        clock,
        store: InstanceStore::new(&peers),
        acceptor: AcceptorState::new(),
        proposer: ProposerState::new(stall_ticks),
        round_reply_tx,
        min_result_tx,
    };

    tokio::spawn(run(
        state,
        request_rx,
        command_rx,
        round_reply_rx,
        min_result_rx,
        shutdown_rx,
    ));

    Ok(PeerHandle {
        command_tx,
        request_tx,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    })
}
