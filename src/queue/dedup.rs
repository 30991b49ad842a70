//! Bounded processed-event dedup set
//!
//! Records ids that completed processing so duplicates are rejected at
//! enqueue. The bound is enforced by evicting the oldest ~20% of entries in
//! insertion order — an approximation of LRU, kept deliberately: the set is
//! only inserted into and membership-tested, so access-order tracking would
//! buy nothing. After eviction a stale duplicate can theoretically re-enter;
//! callers must not rely on this set for exactly-once semantics.

use std::collections::{HashSet, VecDeque};

#[derive(Debug)]
pub struct ProcessedEvents {
    ids: HashSet<String>,
    insertion_order: VecDeque<String>,
    capacity: usize,
}

impl ProcessedEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id; returns `false` if it was already present.
    pub fn insert(&mut self, id: String) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.insertion_order.push_back(id.clone());
        self.ids.insert(id);
        if self.ids.len() > self.capacity {
            self.evict_oldest();
        }
        true
    }

    fn evict_oldest(&mut self) {
        let evict = (self.capacity / 5).max(1);
        for _ in 0..evict {
            match self.insertion_order.pop_front() {
                Some(id) => {
                    self.ids.remove(&id);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.insertion_order.clear();
    }
}
