//! Dashboard snapshot assembly
//!
//! Pure, read-only view over the engine state. Status classification looks at
//! the last hour of events only, never all-time history.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::retention::EventHistory;
use crate::types::SecurityEvent;

/// How many events the dashboard lists.
const RECENT_EVENT_LIMIT: usize = 50;
/// Hourly buckets in the activity timeline.
const TIMELINE_HOURS: i64 = 24;

/// Overall platform security status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Secure,
    Warning,
    Critical,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Secure => write!(f, "SECURE"),
            OverallStatus::Warning => write!(f, "WARNING"),
            OverallStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Health indicators for the engine's own components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub monitoring_active: bool,
    /// History fill level, 0.0-1.0.
    pub history_utilization: f64,
    pub correlation_buckets: usize,
    pub collaborator_errors: u64,
}

/// Read-only dashboard composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub overall_status: OverallStatus,
    pub active_incidents: u64,
    /// Last-hour events, newest first, capped at 50.
    pub recent_events: Vec<SecurityEvent>,
    pub metrics: MetricsSnapshot,
    /// Last-hour counts per event type.
    pub events_by_type: HashMap<String, u64>,
    /// Last-hour counts per source.
    pub events_by_source: HashMap<String, u64>,
    /// Hourly event counts over the last 24 hours, oldest hour first.
    pub hourly_timeline: Vec<u64>,
    pub health: ComponentHealth,
}

/// Assemble a dashboard snapshot from the current state. Never mutates.
pub fn snapshot(
    history: &EventHistory,
    active_incidents: u64,
    metrics: MetricsSnapshot,
    health: ComponentHealth,
    high_threshold: u8,
    critical_threshold: u8,
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let hour_ago = now - Duration::hours(1);

    let mut overall_status = OverallStatus::Secure;
    let mut events_by_type: HashMap<String, u64> = HashMap::new();
    let mut events_by_source: HashMap<String, u64> = HashMap::new();
    let mut recent: Vec<SecurityEvent> = Vec::new();
    let mut hourly_timeline = vec![0u64; TIMELINE_HOURS as usize];

    for event in history.iter() {
        let age_hours = (now - event.timestamp).num_hours();
        if (0..TIMELINE_HOURS).contains(&age_hours) {
            hourly_timeline[(TIMELINE_HOURS - 1 - age_hours) as usize] += 1;
        }

        if event.timestamp < hour_ago {
            continue;
        }

        if event.severity >= critical_threshold {
            overall_status = OverallStatus::Critical;
        } else if event.severity >= high_threshold && overall_status == OverallStatus::Secure {
            overall_status = OverallStatus::Warning;
        }

        *events_by_type
            .entry(event.event_type.as_str().to_string())
            .or_insert(0) += 1;
        *events_by_source.entry(event.source.clone()).or_insert(0) += 1;
        recent.push(event.clone());
    }

    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(RECENT_EVENT_LIMIT);

    DashboardSnapshot {
        overall_status,
        active_incidents,
        recent_events: recent,
        metrics,
        events_by_type,
        events_by_source,
        hourly_timeline,
        health,
    }
}
