//! The boundary API protocol: the request/response and event vocabulary
//! exchanged between the node runtime and a UI process.
//!
//! This module only defines the wire types and their newline-delimited JSON
//! encoding; the daemon-side server and the reference client each wrap a
//! transport (a Unix socket) around it.

use crate::types::{ChatMessage, DisplayName, PeerInfo, RoomName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed boundary message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Disconnected,
}

/// A request sent from the UI to the node runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ClientRequest {
    JoinRoom {
        room: String,
        #[serde(rename = "userName")]
        user_name: String,
    },
    SendMessage {
        structure: Vec<crate::types::Part>,
        files: Vec<crate::types::FileMeta>,
    },
    SendFileChunk {
        #[serde(rename = "fileId")]
        file_id: String,
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
        #[serde(rename = "chunkData")]
        chunk_data: String,
    },
    LeaveRoom,
    GetPeers,
    /// Not a core operation — the UI's file-save dialog is an OS concern.
    /// Named here only so the boundary vocabulary is complete for client
    /// authors; the daemon replies with `Error` if it ever receives one.
    SaveFileDialog {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "fileData")]
        file_data: String,
    },
    /// Opts this connection into the asynchronous event stream. After a
    /// successful `Subscribe`, `recv` on this connection also yields
    /// `ServerMessage` events interleaved with request responses.
    Subscribe,
}

/// A message sent from the node runtime to the UI: either a direct response
/// to the request just issued, or — once subscribed — a pushed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Bare acknowledgement, used for `Subscribe`.
    Ok,
    /// A request failed; `code` is the error taxonomy variant name (e.g.
    /// `InvalidRoom`, `NotInRoom`, `BindExhausted`).
    Error { code: String, message: String },

    JoinResult { success: bool, port: Option<u16> },
    SendResult { success: bool, message: Option<ChatMessage> },
    LeaveResult { success: bool },
    Peers { peers: Vec<PeerInfo> },

    NewMessage { message: ChatMessage },
    FileChunkReceived {
        #[serde(rename = "fileId")]
        file_id: String,
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
        #[serde(rename = "totalChunks")]
        total_chunks: u32,
    },
    /// Every chunk for `file_id` has arrived; `data` is the concatenated
    /// payload text, in the same pre-encoded form the sender split it from.
    FileComplete {
        #[serde(rename = "fileId")]
        file_id: String,
        data: String,
    },
    /// Reserved: the current revision transmits history as individual
    /// `new_message` events. A client may synthesize its own
    /// history-received signal by observing the tail of the initial burst.
    HistoryReceived { messages: Vec<ChatMessage> },
    PeerOnline { peer: PeerInfo },
    PeerOffline { peer_id: crate::types::PeerId },
    NetworkError { message: String },
}

/// Encodes a single boundary message as one newline-terminated JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, BoundaryError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line (without its trailing newline) into a boundary message.
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, BoundaryError> {
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_round_trips() {
        let request = ClientRequest::JoinRoom {
            room: "demo".into(),
            user_name: "Ada".into(),
        };
        let line = encode_line(&request).unwrap();
        let decoded: ClientRequest = decode_line(&line).unwrap();
        matches!(decoded, ClientRequest::JoinRoom { .. });
    }

    #[test]
    fn server_error_round_trips() {
        let message = ServerMessage::Error {
            code: "NotInRoom".into(),
            message: "send attempted before join".into(),
        };
        let line = encode_line(&message).unwrap();
        let decoded: ServerMessage = decode_line(&line).unwrap();
        assert!(matches!(decoded, ServerMessage::Error { code, .. } if code == "NotInRoom"));
    }
}
