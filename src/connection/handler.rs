// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::{SessionPhase, SessionState};
use crate::core::metrics;
use crate::core::protocol::{Envelope, FrameCodec};
use crate::core::router::Router;
use crate::core::state::{ClientHandle, ServerState};
use crate::core::RelayError;
use futures::StreamExt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{OwnedSemaphorePermit, broadcast};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

type ClientReader = Pin<Box<dyn AsyncRead + Send>>;

/// The next step for the connection's main loop to take.
#[derive(Debug, PartialEq, Eq)]
enum NextAction {
    Continue,
    ExitLoop,
}

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    reader: FramedRead<ClientReader, FrameCodec>,
    handle: Arc<ClientHandle>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    router: Router,
    session_id: u64,
    kill_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
    permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler` over any bidirectional stream.
    pub fn new<S>(
        socket: S,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(socket);
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let handle = Arc::new(ClientHandle::new(
            session_id,
            addr,
            Box::pin(write_half),
            kill_tx,
        ));
        let codec = FrameCodec::new(state.config.max_frame_size);
        Self {
            reader: FramedRead::new(Box::pin(read_half), codec),
            handle,
            addr,
            router: Router::new(state.clone()),
            state,
            session_id,
            kill_rx,
            global_shutdown_rx,
            session: SessionState::new(),
            permit: None,
        }
    }

    /// Attaches the connection-limit permit, released when the session ends.
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    /// The main event loop for the connection, handling incoming frames and signals.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        let mut guard = ConnectionGuard::new(
            self.state.clone(),
            self.session_id,
            self.addr,
            self.permit.take(),
        );

        loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    info!("Connection handler for {} received shutdown signal.", self.addr);
                    break;
                }
                _ = self.kill_rx.recv() => {
                    info!("Connection handler for {} was evicted after a failed delivery.", self.addr);
                    break;
                }
                result = self.reader.next() => {
                    match result {
                        Some(Ok(payload)) => {
                            self.session.frames_received += 1;
                            self.state.stats.increment_envelopes_received();
                            match Envelope::from_payload(&payload) {
                                Ok(envelope) => {
                                    debug!("Session {}: Received envelope: {:?}", self.session_id, envelope);
                                    if self.process_envelope(envelope, &mut guard).await == NextAction::ExitLoop {
                                        break;
                                    }
                                }
                                Err(e) => self.drop_frame(&e),
                            }
                        }
                        Some(Err(e)) => {
                            if e.is_disconnect() {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("Connection error for {}: {}", self.addr, e);
                            }
                            break;
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
            }
        }

        self.cleanup(&mut guard).await;
        Ok(())
    }

    /// Applies one decoded envelope to the session state machine.
    async fn process_envelope(
        &mut self,
        envelope: Envelope,
        guard: &mut ConnectionGuard,
    ) -> NextAction {
        let name = self.session.screen_name().map(str::to_string);

        match (name, envelope) {
            (None, Envelope::Start { name }) => {
                self.handle_start(name, guard).await;
                NextAction::Continue
            }
            (Some(current), Envelope::Start { name }) => {
                debug!("Session {}: ignoring START({}) while joined as {}", self.session_id, name, current);
                self.reply_error(format!("Already joined as {current}")).await;
                NextAction::Continue
            }
            (None, Envelope::Broadcast { .. } | Envelope::Private { .. }) => {
                self.reply_error("Send START before chatting".to_string()).await;
                NextAction::Continue
            }
            (None, Envelope::Exit { .. }) => {
                debug!("Session {}: EXIT before START", self.session_id);
                NextAction::ExitLoop
            }
            (Some(name), Envelope::Broadcast { sender, text }) => {
                if sender != name {
                    debug!("Session {}: sender field '{}' replaced by '{}'", self.session_id, sender, name);
                }
                info!("{}: {}", name, text);
                let outgoing = Envelope::Broadcast {
                    sender: name.clone(),
                    text,
                };
                self.router.broadcast(&outgoing, Some(&name)).await;
                NextAction::Continue
            }
            (
                Some(name),
                Envelope::Private {
                    text,
                    recipient: Some(recipient),
                    ..
                },
            ) => {
                info!("Private message from {} to {}: {}", name, recipient, text);
                let outgoing = Envelope::Private {
                    sender: name,
                    text,
                    recipient: None,
                };
                self.router
                    .send_private(&outgoing, &recipient, &self.handle)
                    .await;
                NextAction::Continue
            }
            (Some(_), Envelope::Private { recipient: None, .. }) => {
                self.drop_frame(&RelayError::Protocol(
                    "PRIVATE from a client must name a recipient".to_string(),
                ));
                NextAction::Continue
            }
            (Some(name), Envelope::Exit { .. }) => {
                info!("Client {} disconnected", name);
                NextAction::ExitLoop
            }
            (_, other) => {
                self.drop_frame(&RelayError::Protocol(format!(
                    "{} is not accepted from clients",
                    other.kind()
                )));
                NextAction::Continue
            }
        }
    }

    /// ANONYMOUS + START(name): register, send the user list, announce the join.
    async fn handle_start(&mut self, name: String, guard: &mut ConnectionGuard) {
        if name.trim().is_empty() {
            self.reply_error("Screen name cannot be empty".to_string()).await;
            return;
        }

        let state = self.state.clone();
        if state.config.reject_duplicate_names {
            if let Err(e) = state.registry.try_register(&name, self.handle.clone()) {
                info!("Rejected START from {}: {}", self.addr, e);
                self.reply_error(e.to_string()).await;
                return;
            }
        } else if let Some(displaced) = state.registry.register(&name, self.handle.clone()) {
            warn!(
                "Screen name '{}' re-registered by {}; session from {} is no longer reachable by name.",
                name, self.addr, displaced.addr
            );
        }

        guard.bind(&name);
        self.session.phase = SessionPhase::Active { name: name.clone() };
        info!("Client {} connected from {}", name, self.addr);

        let user_list = Envelope::UserList {
            names: state.registry.snapshot(),
        };
        self.router.reply(&self.handle, &user_list).await;
        self.router
            .broadcast(&Envelope::Join { name: name.clone() }, Some(&name))
            .await;
    }

    async fn reply_error(&mut self, message: String) {
        self.router
            .reply(&self.handle, &Envelope::Error { message })
            .await;
    }

    fn drop_frame(&mut self, e: &RelayError) {
        self.session.frames_dropped += 1;
        metrics::DROPPED_FRAMES_TOTAL.inc();
        warn!("Session {}: dropping frame from {}: {}", self.session_id, self.addr, e);
    }

    /// Moves the session to CLOSED. An active session that still owns its
    /// registry entry removes it and announces the departure.
    async fn cleanup(&mut self, guard: &mut ConnectionGuard) {
        let phase = std::mem::replace(&mut self.session.phase, SessionPhase::Closed);
        if let SessionPhase::Active { name } = phase {
            if self
                .state
                .registry
                .remove_if_owner(&name, self.session_id)
                .is_some()
            {
                info!("Client {} left ({})", name, self.addr);
                self.router
                    .broadcast(&Envelope::Leave { name: name.clone() }, Some(&name))
                    .await;
            } else {
                debug!("Session {}: '{}' was already removed from the registry", self.session_id, name);
            }
        }
        guard.release();
        self.handle.close().await;
        debug!(
            "Session {} closed after {:?}, {} frames ({} dropped).",
            self.session_id,
            self.handle.connected_at.elapsed(),
            self.session.frames_received,
            self.session.frames_dropped
        );
    }
}
