//! Bounded, insertion-ordered set of seen message ids.

use localchat_core::types::MessageId;
use std::collections::{HashSet, VecDeque};

const CAPACITY: usize = 1000;
const PRUNE_COUNT: usize = 500;

/// Suppresses reprocessing of a message id already seen this session.
/// Checked against the plaintext envelope id, before decryption.
pub struct DedupCache {
    order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self {
            order: VecDeque::with_capacity(CAPACITY),
            seen: HashSet::with_capacity(CAPACITY),
        }
    }

    /// Returns `true` if `id` had already been recorded (so the caller
    /// should drop the datagram). Otherwise records it and returns `false`.
    pub fn check_and_insert(&mut self, id: MessageId) -> bool {
        if self.seen.contains(&id) {
            return true;
        }
        self.seen.insert(id);
        self.order.push_back(id);
        if self.order.len() > CAPACITY {
            self.prune();
        }
        false
    }

    fn prune(&mut self) {
        for _ in 0..PRUNE_COUNT {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}
