//! The on-wire JSON envelope: required identity fields plus a per-type
//! payload that is either plaintext `content` or, once sealed, `encrypted`.

use crate::crypto::{CryptoError, RoomKey, Sealed};
use crate::types::{DisplayName, FileMeta, MessageId, Part, PeerId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed datagram: {0}")]
    DecodeFailure(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The per-type payload carried inside an envelope before sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Message {
        structure: Vec<Part>,
        files: Vec<FileMeta>,
    },
    FileChunk {
        #[serde(rename = "fileId")]
        file_id: String,
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
        #[serde(rename = "chunkData")]
        chunk_data: String,
    },
}

/// The envelope type tag. Determines which handler in the router processes
/// the datagram and which `Content` shape (if any) is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    Join,
    Message,
    FileChunk,
    Ack,
    HistoryRequest,
    StatusRequest,
    Leave,
}

/// The wire envelope. `content` and `encrypted` are mutually exclusive: a
/// plaintext envelope carries `content`; once sealed for transmission, the
/// frame codec replaces it with `encrypted` and clears `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub envelope_type: EnvelopeType,
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    #[serde(rename = "peerId")]
    pub peer_id: PeerId,
    #[serde(rename = "displayName")]
    pub display_name: DisplayName,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encrypted: Option<Sealed>,
}

impl Envelope {
    pub fn new(
        envelope_type: EnvelopeType,
        peer_id: PeerId,
        display_name: DisplayName,
        content: Option<Content>,
    ) -> Self {
        Self {
            envelope_type,
            message_id: MessageId::generate(),
            peer_id,
            display_name,
            timestamp: Timestamp::now(),
            content,
            encrypted: None,
        }
    }

    /// Serializes to the wire form, sealing `content` under `key` if
    /// present. An envelope with no content (join/leave/history_request/...)
    /// passes through unsealed.
    pub fn encode(mut self, key: &RoomKey) -> Result<Vec<u8>, EnvelopeError> {
        if let Some(content) = self.content.take() {
            let plaintext = serde_json::to_vec(&content)
                .map_err(|e| EnvelopeError::DecodeFailure(e.to_string()))?;
            self.encrypted = Some(key.seal(&plaintext));
        }
        serde_json::to_vec(&self).map_err(|e| EnvelopeError::DecodeFailure(e.to_string()))
    }

    /// Parses a datagram's identity fields without touching any sealed
    /// payload. The dedup check and the self-origin check only need these
    /// plaintext fields, so callers can filter before paying for an AEAD
    /// open.
    pub fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::DecodeFailure(e.to_string()))
    }

    /// Opens a sealed payload under `key` and reinstalls `content`. A no-op
    /// if the envelope carries no `encrypted` field.
    pub fn open_content(&mut self, key: &RoomKey) -> Result<(), EnvelopeError> {
        if let Some(sealed) = self.encrypted.take() {
            let plaintext = key.open(&sealed)?;
            let content: Content = serde_json::from_slice(&plaintext)
                .map_err(|e| EnvelopeError::DecodeFailure(e.to_string()))?;
            self.content = Some(content);
        }
        Ok(())
    }

    /// Parses a datagram and, if it carries a sealed payload, opens it under
    /// `key` and reinstalls `content`. Any parse or AEAD failure is the
    /// caller's cue to drop the datagram silently.
    pub fn decode(bytes: &[u8], key: &RoomKey) -> Result<Self, EnvelopeError> {
        let mut envelope = Self::parse(bytes)?;
        envelope.open_content(key)?;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RoomKey {
        RoomKey::derive("demo")
    }

    #[test]
    fn encode_decode_round_trips_message_content() {
        let content = Content::Message {
            structure: vec![Part::Text {
                content: "hello".into(),
            }],
            files: vec![],
        };
        let envelope = Envelope::new(
            EnvelopeType::Message,
            PeerId::generate(),
            DisplayName::new("Ada"),
            Some(content.clone()),
        );
        let wire = envelope.encode(&key()).unwrap();
        let decoded = Envelope::decode(&wire, &key()).unwrap();
        assert_eq!(decoded.content, Some(content));
        assert!(decoded.encrypted.is_none());
    }

    #[test]
    fn envelopes_without_content_pass_through_unsealed() {
        let envelope = Envelope::new(
            EnvelopeType::Join,
            PeerId::generate(),
            DisplayName::new("Ada"),
            None,
        );
        let wire = envelope.encode(&key()).unwrap();
        let decoded = Envelope::decode(&wire, &key()).unwrap();
        assert!(decoded.content.is_none());
    }

    #[test]
    fn malformed_json_is_a_decode_failure() {
        let result = Envelope::decode(b"not json", &key());
        assert!(matches!(result, Err(EnvelopeError::DecodeFailure(_))));
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let envelope = Envelope::new(
            EnvelopeType::Message,
            PeerId::generate(),
            DisplayName::new("Ada"),
            Some(Content::Message {
                structure: vec![],
                files: vec![],
            }),
        );
        let wire = envelope.encode(&key()).unwrap();
        let wrong_key = RoomKey::derive("other-room");
        let result = Envelope::decode(&wire, &wrong_key);
        assert!(matches!(result, Err(EnvelopeError::Crypto(CryptoError::AeadFailure))));
    }
}
