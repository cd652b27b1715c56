//! Incident lifecycle tracking
//!
//! Classifies response actions for each event, drives the status state
//! machine, and maintains the set of active incidents (events at or above the
//! high-severity threshold). Externally triggered transitions (containment,
//! resolution, false-positive) are accepted as input; this module does not
//! decide who is allowed to make them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{EventStatus, EventType, ResponseAction, SecurityEvent};

/// Result of running an event through the tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOutcome {
    /// Event crossed the critical threshold; the pipeline must synthesize an
    /// `incident_escalation` event (bounded to one extra hop).
    pub escalate: bool,
    /// Event was registered as an active incident.
    pub registered: bool,
}

/// Tracks active incidents and drives their lifecycle.
pub struct IncidentTracker {
    active: HashMap<Uuid, SecurityEvent>,
    high_threshold: u8,
    critical_threshold: u8,
    retention: Duration,
}

impl IncidentTracker {
    pub fn new(high_threshold: u8, critical_threshold: u8, retention: Duration) -> Self {
        Self {
            active: HashMap::new(),
            high_threshold,
            critical_threshold,
            retention,
        }
    }

    /// Fixed response-action lookup, keyed by event type and severity.
    pub fn classify(&self, event_type: EventType, severity: u8) -> Vec<ResponseAction> {
        let mut actions = Vec::with_capacity(3);
        match event_type {
            EventType::ThreatDetected => {
                actions.push(ResponseAction::LogThreatDetails);
                if severity >= self.high_threshold {
                    actions.push(ResponseAction::AlertSecurityTeam);
                }
                if severity >= self.critical_threshold {
                    actions.push(ResponseAction::InitiateIncidentResponse);
                }
            }
            EventType::AuthenticationFailure => {
                actions.push(ResponseAction::LogAuthFailure);
                if severity >= self.high_threshold {
                    actions.push(ResponseAction::AlertSecurityTeam);
                }
            }
            EventType::UnauthorizedAccess => {
                actions.push(ResponseAction::BlockAccessAttempt);
                actions.push(ResponseAction::AlertSecurityTeam);
            }
            EventType::NetworkIntrusion => {
                actions.push(ResponseAction::IsolateSegment);
                actions.push(ResponseAction::AlertSecurityTeam);
            }
            EventType::DataAccessViolation => {
                actions.push(ResponseAction::RevokeDataAccess);
                actions.push(ResponseAction::AlertSecurityTeam);
            }
            EventType::ConfigurationChange => {
                actions.push(ResponseAction::RecordConfigChange);
            }
            EventType::SecurityPolicyViolation => {
                actions.push(ResponseAction::EnforcePolicy);
                if severity >= self.high_threshold {
                    actions.push(ResponseAction::AlertSecurityTeam);
                }
            }
            EventType::SuspiciousActivity => {
                actions.push(ResponseAction::MonitorAndLog);
                if severity >= self.high_threshold {
                    actions.push(ResponseAction::AlertSecurityTeam);
                }
            }
            EventType::IncidentEscalation => {
                actions.push(ResponseAction::InitiateEmergencyResponse);
            }
            EventType::SystemAnomaly => {
                actions.push(ResponseAction::MonitorAndLog);
            }
        }
        actions
    }

    /// Classify actions, apply the status transition, and register the event
    /// as an active incident when it crosses the high threshold.
    pub fn process(&mut self, event: &mut SecurityEvent) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();

        for action in self.classify(event.event_type, event.severity) {
            event.push_action(action);
        }

        if event.status == EventStatus::New && event.severity >= self.high_threshold {
            event.status = EventStatus::Investigating;
        }
        if event.status == EventStatus::Investigating && event.severity >= self.critical_threshold {
            event.status = EventStatus::Responding;
        }

        if event.severity >= self.critical_threshold {
            outcome.escalate = true;
        }

        if event.severity >= self.high_threshold {
            debug!(
                event_id = %event.id,
                severity = event.severity,
                "Registering active incident"
            );
            self.active.insert(event.id, event.clone());
            outcome.registered = true;
        }

        outcome
    }

    /// Apply an externally triggered status transition.
    ///
    /// Terminal statuses deregister the incident. Returns false when the id is
    /// not an active incident (the caller may still hold it in history).
    pub fn set_status(&mut self, id: Uuid, status: EventStatus) -> bool {
        if status.is_terminal() {
            if let Some(incident) = self.active.remove(&id) {
                info!(event_id = %id, status = %status, severity = incident.severity, "Incident closed");
                return true;
            }
            return false;
        }

        match self.active.get_mut(&id) {
            Some(incident) => {
                incident.status = status;
                true
            }
            None => false,
        }
    }

    /// Drop incidents in terminal states and incidents past the retention
    /// window regardless of status. Idempotent.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.active.len();
        self.active
            .retain(|_, e| !e.status.is_terminal() && e.timestamp >= cutoff);
        before - self.active.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Copies of the active incidents, newest first.
    pub fn active_incidents(&self) -> Vec<SecurityEvent> {
        let mut incidents: Vec<_> = self.active.values().cloned().collect();
        incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        incidents
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.active.contains_key(&id)
    }
}
