//! Rolling security metrics
//!
//! Pure recomputation over the bounded history. Histograms are counted from
//! scratch on every refresh, never accumulated, so eviction cannot introduce
//! drift.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::EventHistory;
use crate::types::EventType;

/// Derived metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    /// Count per severity; index 0 holds severity 1.
    pub events_by_severity: [u64; 10],
    pub events_by_type: HashMap<String, u64>,
    /// threat_detected events as a percentage of all events.
    pub threat_detection_rate: f64,
    /// 0-100 composite health score derived from last-hour severities.
    pub security_score: f64,
    pub uptime_seconds: i64,
    pub last_updated: DateTime<Utc>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            total_events: 0,
            events_by_severity: [0; 10],
            events_by_type: HashMap::new(),
            threat_detection_rate: 0.0,
            security_score: 100.0,
            uptime_seconds: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Recompute all metrics from the current history.
pub fn recompute(
    history: &EventHistory,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MetricsSnapshot {
    let mut events_by_severity = [0u64; 10];
    let mut events_by_type: HashMap<String, u64> = HashMap::new();
    let mut total = 0u64;
    let mut threats = 0u64;

    for event in history.iter() {
        total += 1;
        if event.event_type == EventType::ThreatDetected {
            threats += 1;
        }
        let idx = (event.severity.clamp(1, 10) - 1) as usize;
        events_by_severity[idx] += 1;
        *events_by_type
            .entry(event.event_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    let threat_detection_rate = if total > 0 {
        threats as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    MetricsSnapshot {
        total_events: total,
        events_by_severity,
        events_by_type,
        threat_detection_rate,
        security_score: security_score(history, now),
        uptime_seconds: (now - started_at).num_seconds().max(0),
        last_updated: now,
    }
}

/// Composite security score: `100 - 10 * mean(severity of last-hour events)`,
/// clamped to [0, 100]. An empty hour scores 100.
pub fn security_score(history: &EventHistory, now: DateTime<Utc>) -> f64 {
    let hour_ago = now - Duration::hours(1);
    let mut sum = 0u64;
    let mut count = 0u64;
    for event in history.since(hour_ago) {
        sum += event.severity as u64;
        count += 1;
    }
    if count == 0 {
        return 100.0;
    }
    let mean = sum as f64 / count as f64;
    (100.0 - mean * 10.0).clamp(0.0, 100.0)
}
