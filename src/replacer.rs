//! Victim selection over unpinned buffer frames.
//!
//! Grounded on `examples/original_source/src/buffer/lru_replacer.cpp`: an
//! intrusive doubly-linked list ordered most-recently-unpinned-first, with
//! an index map from frame id to its link, giving O(1) `pin`/`unpin`
//! removal instead of a linear scan. All four operations are serialized by
//! a single mutex, as spec.md §4.3/§5 require.

use std::collections::HashMap;
use std::sync::Mutex;

pub type FrameId = u32;

/// A node's neighbors in the unpin list; `None` marks the respective end.
struct Link {
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

struct Inner {
    capacity: usize,
    /// Most-recently-unpinned frame; `None` when the list is empty.
    head: Option<FrameId>,
    /// Least-recently-unpinned frame — the next victim.
    tail: Option<FrameId>,
    links: HashMap<FrameId, Link>,
}

impl Inner {
    fn push_front(&mut self, frame_id: FrameId) {
        let old_head = self.head;
        self.links.insert(
            frame_id,
            Link {
                prev: None,
                next: old_head,
            },
        );
        if let Some(h) = old_head {
            self.links.get_mut(&h).unwrap().prev = Some(frame_id);
        }
        self.head = Some(frame_id);
        if self.tail.is_none() {
            self.tail = Some(frame_id);
        }
    }

    /// Unlink `frame_id` in O(1). Returns `true` if it was a candidate.
    fn remove(&mut self, frame_id: FrameId) -> bool {
        let link = match self.links.remove(&frame_id) {
            Some(link) => link,
            None => return false,
        };
        match link.prev {
            Some(p) => self.links.get_mut(&p).unwrap().next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => self.links.get_mut(&n).unwrap().prev = link.prev,
            None => self.tail = link.prev,
        }
        true
    }
}

/// LRU victim-selection policy over a fixed number of buffer frames.
pub struct LruReplacer {
    inner: Mutex<Inner>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                head: None,
                tail: None,
                links: HashMap::with_capacity(capacity),
            }),
        }
    }

    /// Mark `frame_id` as a victim candidate. No-op if already a
    /// candidate. If adding it would exceed capacity, evicts from the
    /// tail first.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.links.contains_key(&frame_id) {
            return;
        }
        while inner.links.len() >= inner.capacity {
            match inner.tail {
                Some(evicted) => {
                    inner.remove(evicted);
                }
                None => break,
            }
        }
        inner.push_front(frame_id);
    }

    /// Remove `frame_id` from victim candidacy. No-op if absent.
    pub fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock().unwrap();
        inner.remove(frame_id);
    }

    /// Evict the least-recently-unpinned candidate frame. Returns `None`
    /// when there are no candidates.
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = inner.tail?;
        inner.remove(frame_id);
        Some(frame_id)
    }

    /// Number of current victim candidates.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 scenario 5: capacity 3, Unpin(1,2,3,4) evicts frame 1.
    #[test]
    fn eviction_on_overflow() {
        let replacer = LruReplacer::new(3);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        replacer.unpin(4);

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), Some(4));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn victim_then_unpin_restores_size() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(2);
        let before = replacer.size();

        let victim = replacer.victim().unwrap();
        assert_eq!(replacer.size(), before - 1);

        replacer.unpin(victim);
        assert_eq!(replacer.size(), before);
    }

    #[test]
    fn pin_is_idempotent_on_absent_frames() {
        let replacer = LruReplacer::new(4);
        replacer.pin(42);
        replacer.pin(42);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn pin_removes_candidate() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn unpin_is_noop_when_already_candidate() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1);
        assert_eq!(replacer.size(), 2);
        // order unaffected: 1 was not re-pushed to front
        assert_eq!(replacer.victim(), Some(1));
    }
}
