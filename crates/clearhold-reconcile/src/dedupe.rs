//! Provider-event dedupe guard.
//!
//! Webhook deliveries are at-least-once; the guard remembers recently
//! seen provider event ids in a bounded FIFO window so a redelivery is
//! recognized before any handler runs. The window must be large enough
//! to cover the provider's redelivery horizon; ids that age out are
//! still harmless because all handlers are idempotent against terminal
//! state.

use std::collections::{HashSet, VecDeque};

/// Bounded first-seen set of provider event ids.
#[derive(Debug)]
pub struct EventSeenGuard {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl EventSeenGuard {
    /// `capacity` must be > 0; a zero capacity would mark everything new.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "dedupe capacity must be > 0");
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an event id. Returns `true` the first time an id is seen,
    /// `false` for a redelivery. Evicts the oldest id at capacity.
    pub fn first_seen(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(event_id.to_string());
        self.order.push_back(event_id.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
