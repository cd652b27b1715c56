//! Bounded event history
//!
//! Rolling FIFO history with a size cap and time-based eviction. The history
//! is owned exclusively by the engine; collaborators only ever see copies.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::types::SecurityEvent;

/// Bounded rolling history of processed events.
pub struct EventHistory {
    events: VecDeque<SecurityEvent>,
    max_events: usize,
    retention: Duration,
}

impl EventHistory {
    pub fn new(max_events: usize, retention: Duration) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(4096)),
            max_events,
            retention,
        }
    }

    /// Append an event, evicting the oldest entry when the size cap is hit.
    /// Returns the evicted event, if any.
    pub fn push(&mut self, event: SecurityEvent) -> Option<SecurityEvent> {
        let evicted = if self.events.len() >= self.max_events {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Drop entries older than the retention window. Idempotent.
    /// Returns the number of evicted events.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.events.len();
        // History is in arrival order, but caller-supplied timestamps may be
        // out of order, so scan the whole deque rather than popping the front.
        self.events.retain(|e| e.timestamp >= cutoff);
        let removed = before - self.events.len();
        if removed > 0 {
            debug!(removed, "Evicted events past retention window");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Iterate in arrival order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.events.iter()
    }

    /// Events with timestamps at or after `since`, arrival order.
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &SecurityEvent> {
        self.events.iter().filter(move |e| e.timestamp >= since)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut SecurityEvent> {
        self.events.iter_mut().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;

    fn make_event(ts: DateTime<Utc>) -> SecurityEvent {
        SecurityEvent::new(EventType::ThreatDetected, 5, "10.0.0.1", "matcher", ts)
    }

    #[test]
    fn test_fifo_eviction_at_cap() {
        let mut history = EventHistory::new(3, Duration::hours(24));
        let now = Utc::now();

        let first = make_event(now);
        let first_id = first.id;
        history.push(first);
        history.push(make_event(now));
        history.push(make_event(now));
        assert_eq!(history.len(), 3);

        let evicted = history.push(make_event(now));
        assert_eq!(history.len(), 3);
        assert_eq!(evicted.unwrap().id, first_id);
    }

    #[test]
    fn test_len_never_exceeds_cap() {
        let mut history = EventHistory::new(10, Duration::hours(24));
        let now = Utc::now();
        for _ in 0..100 {
            history.push(make_event(now));
            assert!(history.len() <= 10);
        }
    }

    #[test]
    fn test_sweep_drops_aged_entries() {
        let mut history = EventHistory::new(100, Duration::hours(24));
        let now = Utc::now();

        history.push(make_event(now - Duration::hours(25)));
        history.push(make_event(now - Duration::hours(1)));
        history.push(make_event(now));

        let removed = history.sweep(now);
        assert_eq!(removed, 1);
        assert_eq!(history.len(), 2);

        // Idempotent
        assert_eq!(history.sweep(now), 0);
    }

    #[test]
    fn test_since_filters_by_timestamp() {
        let mut history = EventHistory::new(100, Duration::hours(24));
        let now = Utc::now();

        history.push(make_event(now - Duration::hours(2)));
        history.push(make_event(now - Duration::minutes(30)));

        let recent: Vec<_> = history.since(now - Duration::hours(1)).collect();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_find_mut() {
        let mut history = EventHistory::new(100, Duration::hours(24));
        let event = make_event(Utc::now());
        let id = event.id;
        history.push(event);

        assert!(history.find_mut(id).is_some());
        assert!(history.find_mut(Uuid::new_v4()).is_none());
    }
}
