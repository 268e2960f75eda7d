//! History protocol: requesting the log from peers on join, and replaying
//! it to a requester.

use crate::session::Session;
use crate::transport::UdpTransport;
use localchat_core::envelope::{Content, Envelope, EnvelopeType};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

/// Join schedules a `history_request` broadcast this long after the `join`
/// envelope, giving peers time to register the new node before replying.
pub const HISTORY_REQUEST_DELAY: Duration = Duration::from_millis(500);

/// The per-chunk pacing delay used when streaming (or replaying) file
/// chunks, to avoid flooding the LAN.
pub const CHUNK_PACING_DELAY: Duration = Duration::from_millis(5);

/// Replays every logged message to `requester` — one `message` envelope
/// per entry, immediately followed by its file chunks (if any) as
/// `file_chunk` envelopes. History is not rate-limited beyond the chunk
/// pacing delay; a busy log can arrive in a burst.
///
/// Only files this node originated can be replayed chunk-for-chunk: a
/// file received from another peer is reassembled into a single buffer
/// for the UI and the per-chunk pieces are not retained afterward.
pub async fn replay_to(session: &Session, transport: &UdpTransport, requester: SocketAddr) {
    debug!(count = session.log.len(), %requester, "replaying history");
    for message in &session.log {
        let envelope = Envelope::new(
            EnvelopeType::Message,
            session.peer_id,
            message.sender.clone(),
            Some(Content::Message {
                structure: message.structure.clone(),
                files: message.files.clone(),
            }),
        );
        if let Ok(wire) = envelope.encode(&session.key) {
            transport.send_to(&wire, requester).await;
        }

        for file in &message.files {
            let Some(chunks) = session.sent_file_chunks.get(&file.id) else {
                continue;
            };
            for (index, chunk) in chunks.iter().enumerate() {
                let Some(chunk_data) = chunk else { continue };
                let chunk_envelope = Envelope::new(
                    EnvelopeType::FileChunk,
                    session.peer_id,
                    message.sender.clone(),
                    Some(Content::FileChunk {
                        file_id: file.id.clone(),
                        chunk_index: index as u32,
                        chunk_data: chunk_data.clone(),
                    }),
                );
                if let Ok(wire) = chunk_envelope.encode(&session.key) {
                    transport.send_to(&wire, requester).await;
                }
                tokio::time::sleep(CHUNK_PACING_DELAY).await;
            }
        }
    }
}
