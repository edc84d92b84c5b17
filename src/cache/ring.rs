//! Sweep Cursor Module
//!
//! Tracks live keys in a flat ring so the background sweep can inspect a
//! bounded slice of the map per tick and still reach every key over time.

use std::collections::HashMap;

// == Key Ring ==
/// Keys kept in a vector with O(1) insert and remove.
///
/// A rotating cursor marks where the next sweep batch begins. Removal swaps
/// the last key into the freed slot, so iteration order is arbitrary.
#[derive(Debug, Default)]
pub(crate) struct KeyRing {
    /// Keys in slot order
    keys: Vec<String>,
    /// Slot index of each key
    slots: HashMap<String, usize>,
    /// Slot where the next batch starts
    cursor: usize,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Adds a key if it is not already tracked.
    pub fn insert(&mut self, key: &str) {
        if self.slots.contains_key(key) {
            return;
        }
        self.slots.insert(key.to_string(), self.keys.len());
        self.keys.push(key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key. No-op if the key is unknown.
    pub fn remove(&mut self, key: &str) {
        let Some(slot) = self.slots.remove(key) else {
            return;
        };
        self.keys.swap_remove(slot);
        if let Some(moved) = self.keys.get(slot) {
            self.slots.insert(moved.clone(), slot);
        }
        if self.cursor >= self.keys.len() {
            self.cursor = 0;
        }
    }

    // == Next Batch ==
    /// Returns up to `max` keys starting at the cursor and advances it.
    ///
    /// Never returns the same key twice within one batch.
    pub fn next_batch(&mut self, max: usize) -> Vec<String> {
        let len = self.keys.len();
        if len == 0 || max == 0 {
            return Vec::new();
        }
        let take = max.min(len);
        let start = self.cursor % len;
        let batch = (0..take)
            .map(|offset| self.keys[(start + offset) % len].clone())
            .collect();
        self.cursor = (start + take) % len;
        batch
    }

    // == Length ==
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    // == Contains ==
    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ring_new() {
        let mut ring = KeyRing::new();
        assert_eq!(ring.len(), 0);
        assert!(ring.next_batch(10).is_empty());
    }

    #[test]
    fn test_ring_insert_is_idempotent() {
        let mut ring = KeyRing::new();

        ring.insert("key1");
        ring.insert("key1");
        ring.insert("key2");

        assert_eq!(ring.len(), 2);
        assert!(ring.contains("key1"));
        assert!(ring.contains("key2"));
    }

    #[test]
    fn test_ring_remove_keeps_slots_consistent() {
        let mut ring = KeyRing::new();
        for key in ["a", "b", "c", "d"] {
            ring.insert(key);
        }

        ring.remove("a");
        ring.remove("nonexistent");
        ring.remove("c");

        assert_eq!(ring.len(), 2);
        assert!(!ring.contains("a"));
        assert!(!ring.contains("c"));

        // Both survivors must still be removable through their slot index
        ring.remove("d");
        ring.remove("b");
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_batch_is_bounded() {
        let mut ring = KeyRing::new();
        for i in 0..10 {
            ring.insert(&format!("key{}", i));
        }

        assert_eq!(ring.next_batch(3).len(), 3);
        assert_eq!(ring.next_batch(100).len(), 10);
        assert!(ring.next_batch(0).is_empty());
    }

    #[test]
    fn test_batches_rotate_over_every_key() {
        let mut ring = KeyRing::new();
        for i in 0..7 {
            ring.insert(&format!("key{}", i));
        }

        let mut seen = HashSet::new();
        for _ in 0..3 {
            let batch = ring.next_batch(3);
            let unique: HashSet<_> = batch.iter().cloned().collect();
            assert_eq!(unique.len(), batch.len(), "batch must not repeat keys");
            seen.extend(batch);
        }

        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_cursor_resets_when_ring_shrinks() {
        let mut ring = KeyRing::new();
        for key in ["a", "b", "c"] {
            ring.insert(key);
        }
        ring.next_batch(2);

        ring.remove("a");
        ring.remove("b");

        assert_eq!(ring.next_batch(5), vec!["c".to_string()]);
    }
}
