//! File chunking (sender side) and reassembly (receiver side).
//!
//! Chunk payloads are treated as opaque text end to end: the sender already
//! holds the file as base64 (a UI-side encoding convention out of this
//! crate's scope), and the receiver only concatenates chunk text back
//! together. Neither side decodes it.

use localchat_core::types::FileMeta;
use std::collections::HashMap;

/// Splits pre-encoded payload text into fixed-size chunks, per the frozen
/// wire contract (60 000 bytes of encoded text per chunk).
pub fn split_into_chunks(encoded_payload: &str) -> Vec<String> {
    let chunk_size = FileMeta::CHUNK_SIZE as usize;
    if encoded_payload.is_empty() {
        return vec![String::new()];
    }
    encoded_payload
        .as_bytes()
        .chunks(chunk_size)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

struct ReassemblyRecord {
    total_chunks: u32,
    chunks: Vec<Option<String>>,
}

impl ReassemblyRecord {
    fn new(total_chunks: u32) -> Self {
        Self {
            total_chunks,
            chunks: vec![None; total_chunks as usize],
        }
    }

    fn is_complete(&self) -> bool {
        self.chunks.iter().all(Option::is_some)
    }

    fn concatenate(&self) -> String {
        self.chunks.iter().flatten().cloned().collect()
    }
}

/// Per-session buffer of in-progress file reassemblies, keyed by file id.
/// Chunks for an unknown file id are discarded by the caller before ever
/// reaching this buffer.
#[derive(Default)]
pub struct FileReassembly {
    records: HashMap<String, ReassemblyRecord>,
}

impl FileReassembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocates a reassembly slot when a `message` envelope announces
    /// file metadata.
    pub fn announce(&mut self, meta: &FileMeta) {
        self.records
            .entry(meta.id.clone())
            .or_insert_with(|| ReassemblyRecord::new(meta.total_chunks));
    }

    /// The declared chunk count for a pending file id, if known.
    pub fn total_chunks(&self, file_id: &str) -> Option<u32> {
        self.records.get(file_id).map(|r| r.total_chunks)
    }

    /// Places one chunk. Returns `Some(full_payload)` once every slot for
    /// that file id is filled; returns `None` for an unknown file id or
    /// while the file is still incomplete.
    pub fn place_chunk(
        &mut self,
        file_id: &str,
        chunk_index: u32,
        chunk_data: String,
    ) -> Option<String> {
        let record = self.records.get_mut(file_id)?;
        if let Some(slot) = record.chunks.get_mut(chunk_index as usize) {
            *slot = Some(chunk_data);
        }
        if record.is_complete() {
            let payload = record.concatenate();
            self.records.remove(file_id);
            Some(payload)
        } else {
            None
        }
    }

    pub fn is_pending(&self, file_id: &str) -> bool {
        self.records.contains_key(file_id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_reassemble_round_trips() {
        let payload = "x".repeat(150_000);
        let chunks = split_into_chunks(&payload);
        assert_eq!(chunks.len(), 3);

        let meta = FileMeta::new("f1", "big.bin", payload.len() as u64);
        let mut buffer = FileReassembly::new();
        buffer.announce(&meta);

        let mut result = None;
        for (idx, chunk) in chunks.into_iter().enumerate() {
            result = buffer.place_chunk("f1", idx as u32, chunk);
        }
        assert_eq!(result.unwrap(), payload);
        assert!(!buffer.is_pending("f1"));
    }

    #[test]
    fn missing_chunk_leaves_file_pending_forever() {
        let meta = FileMeta::new("f1", "big.bin", 150_000);
        let mut buffer = FileReassembly::new();
        buffer.announce(&meta);
        assert!(buffer.place_chunk("f1", 0, "a".into()).is_none());
        assert!(buffer.place_chunk("f1", 1, "b".into()).is_none());
        // chunk 2 never arrives
        assert!(buffer.is_pending("f1"));
    }

    #[test]
    fn chunk_for_unknown_file_id_is_discarded() {
        let mut buffer = FileReassembly::new();
        assert!(buffer.place_chunk("missing", 0, "data".into()).is_none());
        assert!(!buffer.is_pending("missing"));
    }

    #[test]
    fn out_of_order_chunks_still_reassemble_correctly() {
        let payload = "y".repeat(120_000);
        let chunks = split_into_chunks(&payload);
        let meta = FileMeta::new("f2", "out-of-order.bin", payload.len() as u64);
        let mut buffer = FileReassembly::new();
        buffer.announce(&meta);

        buffer.place_chunk("f2", 1, chunks[1].clone());
        let result = buffer.place_chunk("f2", 0, chunks[0].clone());
        assert_eq!(result.unwrap(), payload);
    }
}
