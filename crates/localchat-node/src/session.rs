//! The `Session` value: everything that exists only between a successful
//! `join` and the matching `leave`. Replaces the ambient, process-wide
//! mutable state of the original implementation — join constructs a fresh
//! `Session`, leave drops it.

use crate::dedup::DedupCache;
use crate::files::FileReassembly;
use crate::peers::PeerTable;
use localchat_core::crypto::RoomKey;
use localchat_core::types::{ChatMessage, DisplayName, PeerId, RoomName};
use std::collections::HashMap;

pub struct Session {
    pub peer_id: PeerId,
    pub display_name: DisplayName,
    pub room: RoomName,
    pub key: RoomKey,
    pub port: u16,
    pub log: Vec<ChatMessage>,
    pub peers: PeerTable,
    pub dedup: DedupCache,
    pub files: FileReassembly,
    /// Chunks this node has itself broadcast for a file it originated,
    /// kept only so history replay can re-serve them verbatim to a late
    /// joiner. Indexed the same way the wire chunk-index is. Files that
    /// arrived from another peer are not retained here: re-serving them
    /// would need that peer's payload, which this node never holds in
    /// full (only the final reassembled buffer handed to the UI).
    pub sent_file_chunks: HashMap<String, Vec<Option<String>>>,
}

impl Session {
    pub fn new(room: RoomName, display_name: DisplayName, port: u16) -> Self {
        let key = RoomKey::derive(room.as_str());
        Self {
            peer_id: PeerId::generate(),
            display_name,
            room,
            key,
            port,
            log: Vec::new(),
            peers: PeerTable::new(),
            dedup: DedupCache::new(),
            files: FileReassembly::new(),
            sent_file_chunks: HashMap::new(),
        }
    }
}
