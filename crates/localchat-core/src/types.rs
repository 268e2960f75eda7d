//! Domain types shared by the node runtime, the daemon, and the reference client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised while constructing or normalizing a domain value.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("room name is empty after normalization")]
    EmptyRoomName,

    #[error("room name '{0}' does not match ^[A-Za-z0-9_-]+$ after normalization")]
    InvalidRoomName(String),
}

/// A room name, normalized per the join rules: trimmed, spaces replaced with
/// `-`, lowercased, then the first letter upper-cased.
///
/// Normalization happens once, at construction, so every other component
/// only ever sees a name already known to satisfy the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomName(String);

impl RoomName {
    /// Normalizes and validates a raw room name typed by a user.
    pub fn normalize(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim().replace(' ', "-").to_lowercase();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRoomName);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ValidationError::InvalidRoomName(trimmed));
        }
        let mut chars = trimmed.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => return Err(ValidationError::EmptyRoomName),
        };
        Ok(Self(capitalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session-scoped peer identity: 64 bits of randomness, hex-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(#[serde(with = "hex_u64")] u64);

impl PeerId {
    /// Generates a fresh random peer id. Called once per join.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:016x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}

/// A globally-unique (with overwhelming probability) message identifier:
/// 128 bits of randomness, hex-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(#[serde(with = "hex_u128")] u128);

impl MessageId {
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

mod hex_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:032x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        u128::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}

/// A self-asserted display name. Empty input normalizes to "Anonymous".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self("Anonymous".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }
}

/// One ordered piece of a chat message: freeform text, or a reference to a
/// file announced in the same message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { content: String },
    File { id: String },
}

/// Metadata for a file attachment announced alongside a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "totalChunks")]
    pub total_chunks: u32,
}

impl FileMeta {
    /// Size of an on-wire chunk, in bytes of pre-encoded payload.
    pub const CHUNK_SIZE: u64 = 60_000;

    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        let total_chunks = size.div_ceil(Self::CHUNK_SIZE).max(1) as u32;
        Self {
            id: id.into(),
            name: name.into(),
            size,
            total_chunks,
        }
    }
}

/// A chat message as it lives in the in-memory log: never mutated after
/// insertion, never persisted across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub sender: DisplayName,
    pub timestamp: Timestamp,
    pub structure: Vec<Part>,
    pub files: Vec<FileMeta>,
}

/// A snapshot of a peer as reported through `get-peers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub display_name: DisplayName,
    pub last_seen: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_room_name() {
        let room = RoomName::normalize("  team meeting  ").unwrap();
        assert_eq!(room.as_str(), "Team-meeting");
    }

    #[test]
    fn rejects_invalid_room_name() {
        assert!(RoomName::normalize("   ").is_err());
        assert!(RoomName::normalize("room!").is_err());
    }

    #[test]
    fn empty_display_name_becomes_anonymous() {
        assert_eq!(DisplayName::new("  ").as_str(), "Anonymous");
        assert_eq!(DisplayName::new("Ada").as_str(), "Ada");
    }

    #[test]
    fn peer_id_round_trips_through_json() {
        let id = PeerId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn file_meta_computes_total_chunks() {
        let meta = FileMeta::new("f1", "photo.png", 150_000);
        assert_eq!(meta.total_chunks, 3);
        let empty = FileMeta::new("f2", "empty.bin", 0);
        assert_eq!(empty.total_chunks, 1);
    }
}
