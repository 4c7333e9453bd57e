//! Coalescing queue: the last delta per object wins, FIFO by first arrival.

use std::collections::VecDeque;

use kubedeck_core::{Delta, ResourceKind, Uid};
use rustc_hash::FxHashMap;

type Key = (String, Uid);

/// Bounded coalescing queue keyed by `(gvk, uid)`.
pub struct Coalescer {
    map: FxHashMap<Key, (ResourceKind, Delta)>,
    order: VecDeque<Key>,
    cap: usize,
    dropped: u64,
}

impl Coalescer {
    pub fn with_capacity(cap: usize) -> Self {
        Self { map: FxHashMap::default(), order: VecDeque::new(), cap: cap.max(1), dropped: 0 }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    pub fn dropped(&self) -> u64 { self.dropped }

    pub fn push(&mut self, kind: ResourceKind, d: Delta) {
        let key = (kind.gvk_key(), d.uid);
        if !self.map.contains_key(&key) {
            if self.order.len() >= self.cap {
                if let Some(old) = self.order.pop_front() {
                    self.map.remove(&old);
                    self.dropped += 1;
                }
            }
            self.order.push_back(key.clone());
        }
        self.map.insert(key, (kind, d));
    }

    /// Drain everything queued, oldest first.
    pub fn drain_ready(&mut self) -> Vec<(ResourceKind, Delta)> {
        let mut out = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop_front() {
            if let Some(entry) = self.map.remove(&key) {
                out.push(entry);
            }
        }
        out
    }
}
