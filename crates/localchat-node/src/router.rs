//! Dispatches decoded envelopes by type. Self-origin and duplicate
//! filtering happen before a call ever reaches here — see [`crate::node`].

use crate::history;
use crate::session::Session;
use crate::transport::UdpTransport;
use localchat_core::boundary::ServerMessage;
use localchat_core::envelope::{Content, Envelope, EnvelopeType};
use localchat_core::types::ChatMessage;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Routes one already-decoded envelope. `from` is the datagram's source
/// address, needed by `history_request` to know where to replay to.
pub async fn dispatch(
    envelope: Envelope,
    from: SocketAddr,
    session: &mut Session,
    transport: &UdpTransport,
    events: &broadcast::Sender<ServerMessage>,
) {
    match envelope.envelope_type {
        EnvelopeType::Join => {
            debug!(peer = %envelope.peer_id, "peer joined");
        }
        EnvelopeType::HistoryRequest => {
            history::replay_to(session, transport, from).await;
        }
        EnvelopeType::Message => {
            let Some(Content::Message { structure, files }) = envelope.content else {
                warn!("message envelope missing content, dropping");
                return;
            };
            for meta in &files {
                session.files.announce(meta);
            }
            let message = ChatMessage {
                message_id: envelope.message_id,
                sender: envelope.display_name,
                timestamp: envelope.timestamp,
                structure,
                files,
            };
            session.log.push(message.clone());
            let _ = events.send(ServerMessage::NewMessage { message });
        }
        EnvelopeType::FileChunk => {
            let Some(Content::FileChunk {
                file_id,
                chunk_index,
                chunk_data,
            }) = envelope.content
            else {
                warn!("file_chunk envelope missing content, dropping");
                return;
            };
            let total_chunks = session.files.total_chunks(&file_id);
            let completed = session.files.place_chunk(&file_id, chunk_index, chunk_data);
            if let Some(total_chunks) = total_chunks {
                let _ = events.send(ServerMessage::FileChunkReceived {
                    file_id: file_id.clone(),
                    chunk_index,
                    total_chunks,
                });
            }
            if let Some(data) = completed {
                let _ = events.send(ServerMessage::FileComplete { file_id, data });
            }
        }
        EnvelopeType::Leave => {
            session.peers.remove(envelope.peer_id);
        }
        EnvelopeType::Ack | EnvelopeType::StatusRequest => {
            debug!(peer = %envelope.peer_id, kind = ?envelope.envelope_type, "reserved envelope type accepted, no-op");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localchat_core::types::{DisplayName, FileMeta, Part, PeerId, RoomName};
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn session() -> Session {
        Session::new(
            RoomName::normalize("router-test").unwrap(),
            DisplayName::new("Receiver"),
            0,
        )
    }

    fn from_addr() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000))
    }

    #[tokio::test]
    async fn message_envelope_is_appended_to_the_log_and_broadcast_as_an_event() {
        let mut session = session();
        let transport = UdpTransport::bind("router-test-a").await.unwrap();
        let (events, mut rx) = broadcast::channel(8);

        let envelope = Envelope::new(
            EnvelopeType::Message,
            PeerId::generate(),
            DisplayName::new("Ada"),
            Some(Content::Message {
                structure: vec![Part::Text {
                    content: "hello".into(),
                }],
                files: vec![],
            }),
        );
        dispatch(envelope, from_addr(), &mut session, &transport, &events).await;

        assert_eq!(session.log.len(), 1);
        let ServerMessage::NewMessage { message } = rx.try_recv().unwrap() else {
            panic!("expected a new_message event");
        };
        assert_eq!(message.sender, DisplayName::new("Ada"));
    }

    #[tokio::test]
    async fn file_chunk_envelope_completes_reassembly_and_emits_progress() {
        let mut session = session();
        let transport = UdpTransport::bind("router-test-b").await.unwrap();
        let (events, mut rx) = broadcast::channel(8);

        let meta = FileMeta::new("f1", "note.txt", 4);
        session.files.announce(&meta);

        let envelope = Envelope::new(
            EnvelopeType::FileChunk,
            PeerId::generate(),
            DisplayName::new("Ada"),
            Some(Content::FileChunk {
                file_id: "f1".into(),
                chunk_index: 0,
                chunk_data: "data".into(),
            }),
        );
        dispatch(envelope, from_addr(), &mut session, &transport, &events).await;

        let ServerMessage::FileChunkReceived { total_chunks, .. } = rx.try_recv().unwrap() else {
            panic!("expected a file_chunk_received event");
        };
        assert_eq!(total_chunks, 1);
        assert!(!session.files.is_pending("f1"));

        let ServerMessage::FileComplete { file_id, data } = rx.try_recv().unwrap() else {
            panic!("expected a file_complete event");
        };
        assert_eq!(file_id, "f1");
        assert_eq!(data, "data");
    }

    #[tokio::test]
    async fn leave_envelope_removes_the_peer() {
        let mut session = session();
        let transport = UdpTransport::bind("router-test-c").await.unwrap();
        let (events, _rx) = broadcast::channel(8);
        let peer_id = PeerId::generate();
        session.peers.refresh(peer_id, from_addr(), DisplayName::new("Ada"));

        let envelope = Envelope::new(EnvelopeType::Leave, peer_id, DisplayName::new("Ada"), None);
        dispatch(envelope, from_addr(), &mut session, &transport, &events).await;

        assert!(!session.peers.contains(peer_id));
    }
}
