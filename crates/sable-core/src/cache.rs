//! Bounded LRU cache with per-entry age.
//!
//! Entries live in a slab of nodes addressed by index. The nodes form a
//! doubly-linked recency list (head = most recently used) and a `HashMap`
//! maps each key to its slot, so lookups, promotions and evictions are O(1).
//! Freed slots are recycled through a free list, the slab never grows past
//! `capacity`.
//!
//! ```text
//!   index: "a" -> 2, "b" -> 0, "c" -> 1
//!
//!   head ──► [2:a] ◄──► [0:b] ◄──► [1:c] ◄── tail
//!            MRU                   LRU (next eviction)
//! ```
//!
//! The cache is not synchronized; share it through
//! [`SharedCache`](crate::shared::SharedCache).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity used when a non-positive capacity is requested.
pub const DEFAULT_CAPACITY: usize = 10;

/// Age at which `get_or_delete_expired` treats an entry as stale.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Cached payload. Cloning is a reference-count bump.
pub type Payload = Arc<[u8]>;

struct Node {
    key: String,
    payload: Payload,
    created_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct LruTtlCache {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    ttl: Duration,
}

impl LruTtlCache {
    /// Create a cache holding at most `capacity` entries (0 becomes
    /// [`DEFAULT_CAPACITY`]) that considers entries stale after `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
            ttl,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_TTL)
    }

    /// Insert or overwrite `key`, stamping it with the current time.
    pub fn put(&mut self, key: &str, payload: impl Into<Payload>) {
        self.put_at(key, payload, Instant::now());
    }

    /// Insert or overwrite `key` as if it were written at `now`.
    ///
    /// Overwriting refreshes the payload, the timestamp and the recency.
    /// Inserting into a full cache evicts the least recently used entry first.
    pub fn put_at(&mut self, key: &str, payload: impl Into<Payload>, now: Instant) {
        let payload = payload.into();

        if let Some(&idx) = self.index.get(key) {
            if let Some(node) = self.slots[idx].as_mut() {
                node.payload = payload;
                node.created_at = now;
            }
            self.promote(idx);
            return;
        }

        if self.index.len() >= self.capacity {
            self.evict_lru();
        }

        let node = Node {
            key: key.to_string(),
            payload,
            created_at: now,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key.to_string(), idx);
        self.attach_front(idx);
    }

    /// Look up `key` and mark it most recently used. Age is ignored.
    pub fn get(&mut self, key: &str) -> Option<Payload> {
        let idx = *self.index.get(key)?;
        self.promote(idx);
        self.slots[idx].as_ref().map(|node| node.payload.clone())
    }

    /// Like [`get`](Self::get), but an entry whose age reached the TTL is
    /// removed and reported as absent.
    pub fn get_or_delete_expired(&mut self, key: &str) -> Option<Payload> {
        self.get_or_delete_expired_at(key, Instant::now())
    }

    pub fn get_or_delete_expired_at(&mut self, key: &str, now: Instant) -> Option<Payload> {
        let idx = *self.index.get(key)?;
        let created_at = self.slots[idx].as_ref()?.created_at;

        if now.saturating_duration_since(created_at) >= self.ttl {
            self.remove_slot(idx);
            return None;
        }

        self.promote(idx);
        self.slots[idx].as_ref().map(|node| node.payload.clone())
    }

    /// Remove `key`, returning its payload if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Payload> {
        let idx = *self.index.get(key)?;
        self.remove_slot(idx).map(|node| node.payload)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used.
    pub fn keys_mru(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].as_ref() {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    fn evict_lru(&mut self) {
        if let Some(idx) = self.tail {
            self.remove_slot(idx);
        }
    }

    /// Unlink a slot from the list and the index and recycle it.
    fn remove_slot(&mut self, idx: usize) -> Option<Node> {
        self.detach(idx);
        let node = self.slots[idx].take()?;
        self.index.remove(&node.key);
        self.free.push(idx);
        Some(node)
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.slots[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

impl fmt::Debug for LruTtlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruTtlCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("keys", &self.keys_mru())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Payload {
        Payload::from(s.as_bytes())
    }

    #[test]
    fn test_recency_order_after_access() {
        let mut cache = LruTtlCache::with_capacity(3);
        cache.put("a", bytes("A"));
        cache.put("b", bytes("B"));
        cache.put("c", bytes("C"));
        assert_eq!(cache.keys_mru(), vec!["c", "b", "a"]);

        cache.get("a");
        assert_eq!(cache.keys_mru(), vec!["a", "c", "b"]);

        cache.get("b");
        assert_eq!(cache.keys_mru(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut cache = LruTtlCache::with_capacity(2);
        for i in 0..50 {
            cache.put(&format!("k{}", i), bytes("v"));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.slots.len() <= 2);
        assert_eq!(cache.keys_mru(), vec!["k49", "k48"]);
    }

    #[test]
    fn test_zero_capacity_defaults() {
        let cache = LruTtlCache::with_capacity(0);
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_single_slot_cache() {
        let mut cache = LruTtlCache::with_capacity(1);
        cache.put("a", bytes("A"));
        cache.put("b", bytes("B"));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").as_deref(), Some(&b"B"[..]));
        assert_eq!(cache.keys_mru(), vec!["b"]);
    }

    #[test]
    fn test_remove_middle_keeps_links() {
        let mut cache = LruTtlCache::with_capacity(3);
        cache.put("a", bytes("A"));
        cache.put("b", bytes("B"));
        cache.put("c", bytes("C"));
        assert_eq!(cache.remove("b").as_deref(), Some(&b"B"[..]));
        assert_eq!(cache.keys_mru(), vec!["c", "a"]);
        cache.put("d", bytes("D"));
        cache.put("e", bytes("E"));
        assert_eq!(cache.keys_mru(), vec!["e", "d", "c"]);
    }

    #[test]
    fn test_empty_payload_is_distinct_from_absent() {
        let mut cache = LruTtlCache::with_capacity(2);
        cache.put("empty", Payload::from(Vec::new()));
        assert_eq!(cache.get("empty").map(|p| p.len()), Some(0));
        assert!(cache.get("missing").is_none());
    }
}
