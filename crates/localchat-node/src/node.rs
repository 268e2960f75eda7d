//! The node actor: the single task that owns all session state and is
//! driven by a `select!` loop over the UDP socket, the sweep timer, and
//! boundary requests. All state mutation happens here; every other task
//! only sends on a channel and awaits a reply.

use crate::error::SessionError;
use crate::history::{self, HISTORY_REQUEST_DELAY};
use crate::peers::SWEEP_INTERVAL;
use crate::router;
use crate::session::Session;
use crate::transport::UdpTransport;
use localchat_core::boundary::ClientRequest;
use localchat_core::envelope::{Content, Envelope, EnvelopeType};
use localchat_core::types::{ChatMessage, DisplayName, FileMeta, MessageId, Part, PeerInfo, RoomName, Timestamp};
use localchat_core::boundary::ServerMessage;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// How long `leave` waits for the outgoing `leave` envelope to drain
/// before the socket is closed.
const LEAVE_DRAIN: Duration = Duration::from_millis(100);

/// Capacity of the boundary event broadcast channel. Generous: events are
/// small and consumers are expected to keep up within a session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

enum NodeCommand {
    Boundary(ClientRequest, oneshot::Sender<ServerMessage>),
    ScheduledHistoryRequest,
}

/// A cheaply-cloneable handle to a running node actor.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::Sender<NodeCommand>,
    events: broadcast::Sender<ServerMessage>,
}

impl NodeHandle {
    /// Sends a boundary request and awaits the actor's response.
    pub async fn request(&self, request: ClientRequest) -> ServerMessage {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(NodeCommand::Boundary(request, reply_tx))
            .await
            .is_err()
        {
            return ServerMessage::Error {
                code: "NodeShutDown".into(),
                message: "node actor is no longer running".into(),
            };
        }
        reply_rx.await.unwrap_or(ServerMessage::Error {
            code: "NodeShutDown".into(),
            message: "node actor dropped the reply channel".into(),
        })
    }

    /// Subscribes to the asynchronous event stream (`new-message`,
    /// `file-chunk-received`, peer online/offline bookkeeping, `error`).
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }
}

/// Spawns the node actor on the current Tokio runtime and returns a handle
/// to it. The actor runs until the handle (and every clone, and every
/// event subscriber) is dropped, or the process exits.
pub fn spawn() -> NodeHandle {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (event_tx, _event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let actor = NodeActor {
        transport: None,
        session: None,
        events: event_tx.clone(),
        commands: command_tx.clone(),
    };
    tokio::spawn(actor.run(command_rx));

    NodeHandle {
        commands: command_tx,
        events: event_tx,
    }
}

struct NodeActor {
    transport: Option<UdpTransport>,
    session: Option<Session>,
    events: broadcast::Sender<ServerMessage>,
    /// Clone kept so the actor can schedule its own delayed follow-up
    /// commands (the post-join history request) without sharing state
    /// across tasks — the sleeping task only ever sends a message back
    /// into this same actor's queue.
    commands: mpsc::Sender<NodeCommand>,
}

impl NodeActor {
    async fn run(mut self, mut command_rx: mpsc::Receiver<NodeCommand>) {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.tick().await; // first tick fires immediately; discard it

        loop {
            let recv_next = async {
                match &self.transport {
                    Some(transport) => transport.recv().await.ok(),
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                Some(command) = command_rx.recv() => {
                    match command {
                        NodeCommand::Boundary(request, reply) => {
                            let response = self.handle_request(request).await;
                            let _ = reply.send(response);
                        }
                        NodeCommand::ScheduledHistoryRequest => {
                            self.broadcast_history_request().await;
                        }
                    }
                }
                Some((bytes, from)) = recv_next, if self.session.is_some() => {
                    self.handle_datagram(bytes, from).await;
                }
                _ = sweep.tick(), if self.session.is_some() => {
                    self.handle_sweep().await;
                }
                else => break,
            }
        }
    }

    async fn handle_request(&mut self, request: ClientRequest) -> ServerMessage {
        match request {
            ClientRequest::JoinRoom { room, user_name } => match self.join(&room, &user_name).await {
                Ok(port) => ServerMessage::JoinResult {
                    success: true,
                    port: Some(port),
                },
                Err(e) => ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            },
            ClientRequest::SendMessage { structure, files } => {
                match self.send_message(structure, files).await {
                    Ok(message) => ServerMessage::SendResult {
                        success: true,
                        message: Some(message),
                    },
                    Err(e) => ServerMessage::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                }
            }
            ClientRequest::SendFileChunk {
                file_id,
                chunk_index,
                chunk_data,
            } => match self.send_file_chunk(file_id, chunk_index, chunk_data).await {
                Ok(()) => ServerMessage::Ok,
                Err(e) => ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            },
            ClientRequest::LeaveRoom => {
                self.leave().await;
                ServerMessage::LeaveResult { success: true }
            }
            ClientRequest::GetPeers => ServerMessage::Peers {
                peers: self
                    .session
                    .as_ref()
                    .map(Session::peers_snapshot)
                    .unwrap_or_default(),
            },
            ClientRequest::SaveFileDialog { .. } => ServerMessage::Error {
                code: "NotSupported".into(),
                message: "file-save dialogs are the UI's responsibility".into(),
            },
            ClientRequest::Subscribe => ServerMessage::Ok,
        }
    }

    async fn join(&mut self, room: &str, user_name: &str) -> Result<u16, SessionError> {
        let room_name = RoomName::normalize(room)?;
        // Idempotent join: if already in this exact room, reuse the bound
        // port rather than rebinding. Joining a different room while
        // already joined tears down the old session first.
        if let Some(session) = &self.session {
            if session.room == room_name {
                return Ok(session.port);
            }
        }
        self.teardown_session().await;

        let transport = UdpTransport::bind(room_name.as_str()).await?;
        let port = transport.bound_port();
        let session = Session::new(room_name, DisplayName::new(user_name), port);

        let join_envelope = Envelope::new(
            EnvelopeType::Join,
            session.peer_id,
            session.display_name.clone(),
            None,
        );
        if let Ok(wire) = join_envelope.encode(&session.key) {
            transport.send_to(&wire, transport.broadcast_addr()).await;
        }

        self.transport = Some(transport);
        self.session = Some(session);

        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(HISTORY_REQUEST_DELAY).await;
            let _ = commands.send(NodeCommand::ScheduledHistoryRequest).await;
        });

        info!(room = %room, port, "joined room");
        Ok(port)
    }

    async fn broadcast_history_request(&self) {
        let (Some(session), Some(transport)) = (&self.session, &self.transport) else {
            return;
        };
        let envelope = Envelope::new(
            EnvelopeType::HistoryRequest,
            session.peer_id,
            session.display_name.clone(),
            None,
        );
        if let Ok(wire) = envelope.encode(&session.key) {
            fan_out(transport, session, &wire).await;
        }
    }

    async fn send_message(
        &mut self,
        structure: Vec<Part>,
        files: Vec<FileMeta>,
    ) -> Result<ChatMessage, SessionError> {
        let (Some(session), Some(transport)) = (&mut self.session, &self.transport) else {
            return Err(SessionError::NotInRoom);
        };

        let message = ChatMessage {
            message_id: MessageId::generate(),
            sender: session.display_name.clone(),
            timestamp: Timestamp::now(),
            structure: structure.clone(),
            files: files.clone(),
        };
        session.log.push(message.clone());
        for file in &files {
            session
                .sent_file_chunks
                .entry(file.id.clone())
                .or_insert_with(|| vec![None; file.total_chunks as usize]);
        }

        let envelope = Envelope::new(
            EnvelopeType::Message,
            session.peer_id,
            session.display_name.clone(),
            Some(Content::Message { structure, files }),
        );
        if let Ok(wire) = envelope.encode(&session.key) {
            fan_out(transport, session, &wire).await;
        }

        Ok(message)
    }

    async fn send_file_chunk(
        &mut self,
        file_id: String,
        chunk_index: u32,
        chunk_data: String,
    ) -> Result<(), SessionError> {
        let (Some(session), Some(transport)) = (&mut self.session, &self.transport) else {
            return Err(SessionError::NotInRoom);
        };

        if let Some(slots) = session.sent_file_chunks.get_mut(&file_id) {
            if let Some(slot) = slots.get_mut(chunk_index as usize) {
                *slot = Some(chunk_data.clone());
            }
        }

        let envelope = Envelope::new(
            EnvelopeType::FileChunk,
            session.peer_id,
            session.display_name.clone(),
            Some(Content::FileChunk {
                file_id,
                chunk_index,
                chunk_data,
            }),
        );
        if let Ok(wire) = envelope.encode(&session.key) {
            fan_out(transport, session, &wire).await;
        }
        tokio::time::sleep(history::CHUNK_PACING_DELAY).await;
        Ok(())
    }

    async fn leave(&mut self) {
        if let (Some(session), Some(transport)) = (&self.session, &self.transport) {
            let envelope = Envelope::new(
                EnvelopeType::Leave,
                session.peer_id,
                session.display_name.clone(),
                None,
            );
            if let Ok(wire) = envelope.encode(&session.key) {
                fan_out(transport, session, &wire).await;
            }
            tokio::time::sleep(LEAVE_DRAIN).await;
        }
        self.teardown_session().await;
        info!("left room");
    }

    async fn teardown_session(&mut self) {
        self.transport = None;
        self.session = None;
    }

    async fn handle_datagram(&mut self, bytes: Vec<u8>, from: SocketAddr) {
        let Some(session) = &mut self.session else { return };

        let envelope = match Envelope::parse(&bytes) {
            Ok(e) => e,
            Err(e) => {
                debug!(%from, error = %e, "discarding malformed datagram");
                return;
            }
        };

        if envelope.peer_id == session.peer_id {
            return;
        }
        if session.dedup.check_and_insert(envelope.message_id) {
            return;
        }

        let is_new_peer =
            session
                .peers
                .refresh(envelope.peer_id, from, envelope.display_name.clone());
        if is_new_peer {
            let peer = PeerInfo {
                peer_id: envelope.peer_id,
                display_name: envelope.display_name.clone(),
                last_seen: Timestamp::now(),
            };
            let _ = self.events.send(ServerMessage::PeerOnline { peer });
        }

        let mut envelope = envelope;
        if let Err(e) = envelope.open_content(&session.key) {
            debug!(%from, error = %e, "dropping datagram that failed to open");
            return;
        }

        let Some(transport) = &self.transport else { return };
        router::dispatch(envelope, from, session, transport, &self.events).await;
    }

    async fn handle_sweep(&mut self) {
        let Some(session) = &mut self.session else { return };
        let result = session.peers.sweep();
        for peer_id in result.newly_marked {
            warn!(%peer_id, "peer timed out");
            let _ = self.events.send(ServerMessage::PeerOffline { peer_id });
        }
        let _ = result.evicted;
    }
}

impl Session {
    fn peers_snapshot(&self) -> Vec<PeerInfo> {
        self.peers.snapshot()
    }
}

/// Fans a wire datagram out to every known peer's last observed address,
/// plus the room's broadcast address. A free function (not a method) so it
/// can be called while the caller already holds a mutable borrow of
/// `session` through `self`.
async fn fan_out(transport: &UdpTransport, session: &Session, wire: &[u8]) {
    for addr in session.peers.known_addrs() {
        transport.send_to(wire, addr).await;
    }
    transport.send_to(wire, transport.broadcast_addr()).await;
}
