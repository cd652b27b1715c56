//! Event correlation
//!
//! Groups events by `(source, event_type)` and maintains a sliding time window
//! per key. When enough same-key events land inside the window, a synthetic
//! `suspicious_activity` event is emitted so that patterns invisible in single
//! events surface as first-class events in the pipeline.
//!
//! Buckets are intentionally not cleared after firing: sustained floods keep
//! refiring, which gives continuous rate-based alerting rather than
//! edge-triggered alerting. Callers that need edge-triggering must track
//! already-fired state themselves.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{EventType, SecurityEvent, MAX_SEVERITY};

/// Target assigned to synthetic correlation events.
const SYNTHETIC_TARGET: &str = "SYSTEM";

/// A lightweight reference to an event held in a correlation bucket.
#[derive(Debug, Clone)]
struct BucketEntry {
    id: Uuid,
    severity: u8,
    timestamp: DateTime<Utc>,
}

/// Per-key sliding window of recent same-key events.
#[derive(Debug, Default)]
struct Bucket {
    entries: Vec<BucketEntry>,
}

impl Bucket {
    /// Drop members older than the window relative to `now`.
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        self.entries.retain(|e| e.timestamp >= cutoff);
    }
}

/// Correlation statistics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CorrelationStats {
    pub events_observed: u64,
    pub patterns_fired: u64,
    pub active_buckets: usize,
}

/// Sliding-window correlation engine.
pub struct CorrelationEngine {
    buckets: HashMap<(String, EventType), Bucket>,
    window: Duration,
    threshold: usize,
    stats: CorrelationStats,
}

impl CorrelationEngine {
    pub fn new(window: Duration, threshold: usize) -> Self {
        if threshold < 2 {
            warn!(threshold, "Correlation threshold below 2 fires on nearly every event");
        }
        Self {
            buckets: HashMap::new(),
            window,
            threshold,
            stats: CorrelationStats::default(),
        }
    }

    /// Observe a processed event.
    ///
    /// Appends the event to its `(source, event_type)` bucket, lazily prunes
    /// members that fell out of the window, and returns a synthetic
    /// `suspicious_activity` event once the bucket holds at least the
    /// configured threshold of events.
    pub fn observe(&mut self, event: &SecurityEvent, now: DateTime<Utc>) -> Option<SecurityEvent> {
        self.stats.events_observed += 1;

        let key = (event.source.clone(), event.event_type);
        let bucket = self.buckets.entry(key).or_default();

        bucket.entries.push(BucketEntry {
            id: event.id,
            severity: event.severity,
            timestamp: event.timestamp,
        });
        bucket.prune(now - self.window);

        if bucket.entries.len() < self.threshold {
            return None;
        }

        let max_severity = bucket
            .entries
            .iter()
            .map(|e| e.severity)
            .max()
            .unwrap_or(event.severity);
        let severity = (max_severity + 1).min(MAX_SEVERITY);
        let pattern = format!("{}_{}", event.source, event.event_type);
        let correlated_ids: Vec<String> =
            bucket.entries.iter().map(|e| e.id.to_string()).collect();
        let event_count = bucket.entries.len();

        self.stats.patterns_fired += 1;
        debug!(
            pattern = %pattern,
            event_count,
            severity,
            "Correlated activity pattern detected"
        );

        let mut synthetic = SecurityEvent::new(
            EventType::SuspiciousActivity,
            severity,
            pattern.clone(),
            SYNTHETIC_TARGET,
            now,
        )
        .with_detail("correlated_event_ids", serde_json::json!(correlated_ids))
        .with_detail("pattern", serde_json::json!(pattern))
        .with_detail("event_count", serde_json::json!(event_count));
        synthetic.hop = event.hop + 1;

        Some(synthetic)
    }

    /// Prune all buckets against `now` and drop the empty ones.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        for bucket in self.buckets.values_mut() {
            bucket.prune(cutoff);
        }
        self.buckets.retain(|_, b| !b.entries.is_empty());
    }

    pub fn stats(&self) -> CorrelationStats {
        CorrelationStats {
            active_buckets: self.buckets.len(),
            ..self.stats
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(
        source: &str,
        event_type: EventType,
        severity: u8,
        ts: DateTime<Utc>,
    ) -> SecurityEvent {
        SecurityEvent::new(event_type, severity, source, "auth-service", ts)
    }

    fn engine() -> CorrelationEngine {
        CorrelationEngine::new(Duration::seconds(300), 3)
    }

    #[test]
    fn test_below_threshold_no_pattern() {
        let mut engine = engine();
        let now = Utc::now();

        let e1 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        let e2 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        assert!(engine.observe(&e1, now).is_none());
        assert!(engine.observe(&e2, now).is_none());
    }

    #[test]
    fn test_threshold_fires_synthetic_event() {
        let mut engine = engine();
        let now = Utc::now();

        for _ in 0..2 {
            let e = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
            assert!(engine.observe(&e, now).is_none());
        }
        let e3 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        let synthetic = engine.observe(&e3, now).expect("pattern should fire");

        assert_eq!(synthetic.event_type, EventType::SuspiciousActivity);
        assert_eq!(synthetic.severity, 5); // max(4) + 1
        assert_eq!(synthetic.source, "10.0.0.1_authentication_failure");
        assert_eq!(synthetic.target, "SYSTEM");
        assert_eq!(synthetic.hop, 1);
        assert_eq!(
            synthetic.details.get("event_count"),
            Some(&serde_json::json!(3))
        );
        let ids = synthetic.details.get("correlated_event_ids").unwrap();
        assert_eq!(ids.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_severity_capped_at_ten() {
        let mut engine = engine();
        let now = Utc::now();

        for _ in 0..2 {
            let e = make_event("10.0.0.1", EventType::ThreatDetected, 10, now);
            engine.observe(&e, now);
        }
        let e3 = make_event("10.0.0.1", EventType::ThreatDetected, 10, now);
        let synthetic = engine.observe(&e3, now).unwrap();
        assert_eq!(synthetic.severity, 10);
    }

    #[test]
    fn test_different_keys_do_not_correlate() {
        let mut engine = engine();
        let now = Utc::now();

        let a = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        let b = make_event("10.0.0.2", EventType::AuthenticationFailure, 4, now);
        let c = make_event("10.0.0.1", EventType::UnauthorizedAccess, 4, now);
        assert!(engine.observe(&a, now).is_none());
        assert!(engine.observe(&b, now).is_none());
        assert!(engine.observe(&c, now).is_none());
        assert_eq!(engine.bucket_count(), 3);
    }

    #[test]
    fn test_window_eviction_blocks_stale_members() {
        let mut engine = engine();
        let now = Utc::now();

        // Two events well outside the window relative to the third observation
        let old = now - Duration::seconds(400);
        let e1 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, old);
        let e2 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, old);
        engine.observe(&e1, old);
        engine.observe(&e2, old);

        let e3 = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        assert!(engine.observe(&e3, now).is_none());
    }

    #[test]
    fn test_bucket_refires_without_clearing() {
        let mut engine = engine();
        let now = Utc::now();

        for i in 0..5 {
            let e = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
            let fired = engine.observe(&e, now);
            if i >= 2 {
                assert!(fired.is_some(), "bucket at or past threshold keeps firing");
            }
        }
        assert_eq!(engine.stats().patterns_fired, 3);
    }

    #[test]
    fn test_sweep_drops_empty_buckets() {
        let mut engine = engine();
        let now = Utc::now();

        let e = make_event("10.0.0.1", EventType::AuthenticationFailure, 4, now);
        engine.observe(&e, now);
        assert_eq!(engine.bucket_count(), 1);

        engine.sweep(now + Duration::seconds(301));
        assert_eq!(engine.bucket_count(), 0);
    }
}
