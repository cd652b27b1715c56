//! Security events
//!
//! Unified event format shared by ingestion, correlation, incident tracking,
//! and the dashboard. Events are created once at ingestion and mutated only
//! through status transitions and response-action appends.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MonitorError, Result};

/// Lowest accepted severity
pub const MIN_SEVERITY: u8 = 1;
/// Highest accepted severity
pub const MAX_SEVERITY: u8 = 10;

/// Security event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ThreatDetected,
    AuthenticationFailure,
    UnauthorizedAccess,
    SuspiciousActivity,
    SystemAnomaly,
    NetworkIntrusion,
    DataAccessViolation,
    ConfigurationChange,
    SecurityPolicyViolation,
    IncidentEscalation,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ThreatDetected => "threat_detected",
            EventType::AuthenticationFailure => "authentication_failure",
            EventType::UnauthorizedAccess => "unauthorized_access",
            EventType::SuspiciousActivity => "suspicious_activity",
            EventType::SystemAnomaly => "system_anomaly",
            EventType::NetworkIntrusion => "network_intrusion",
            EventType::DataAccessViolation => "data_access_violation",
            EventType::ConfigurationChange => "configuration_change",
            EventType::SecurityPolicyViolation => "security_policy_violation",
            EventType::IncidentEscalation => "incident_escalation",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "threat_detected" => Ok(EventType::ThreatDetected),
            "authentication_failure" => Ok(EventType::AuthenticationFailure),
            "unauthorized_access" => Ok(EventType::UnauthorizedAccess),
            "suspicious_activity" => Ok(EventType::SuspiciousActivity),
            "system_anomaly" => Ok(EventType::SystemAnomaly),
            "network_intrusion" => Ok(EventType::NetworkIntrusion),
            "data_access_violation" => Ok(EventType::DataAccessViolation),
            "configuration_change" => Ok(EventType::ConfigurationChange),
            "security_policy_violation" => Ok(EventType::SecurityPolicyViolation),
            "incident_escalation" => Ok(EventType::IncidentEscalation),
            other => Err(MonitorError::Validation(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

/// Lifecycle status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    New,
    Investigating,
    Responding,
    Contained,
    Resolved,
    FalsePositive,
}

impl EventStatus {
    /// Terminal states close out the event; incidents in a terminal state
    /// are dropped on the next sweep.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Resolved | EventStatus::FalsePositive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::New => "new",
            EventStatus::Investigating => "investigating",
            EventStatus::Responding => "responding",
            EventStatus::Contained => "contained",
            EventStatus::Resolved => "resolved",
            EventStatus::FalsePositive => "false_positive",
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::New
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response actions attached to an event after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    LogThreatDetails,
    LogAuthFailure,
    AlertSecurityTeam,
    InitiateIncidentResponse,
    InitiateEmergencyResponse,
    BlockAccessAttempt,
    IsolateSegment,
    RevokeDataAccess,
    RecordConfigChange,
    EnforcePolicy,
    MonitorAndLog,
}

impl ResponseAction {
    /// Human-readable action label, as shown on the dashboard and in audit records.
    pub fn label(&self) -> &'static str {
        match self {
            ResponseAction::LogThreatDetails => "Log threat details",
            ResponseAction::LogAuthFailure => "Log authentication failure",
            ResponseAction::AlertSecurityTeam => "Alert security team",
            ResponseAction::InitiateIncidentResponse => "Initiate incident response",
            ResponseAction::InitiateEmergencyResponse => "Initiate emergency response",
            ResponseAction::BlockAccessAttempt => "Block access attempt",
            ResponseAction::IsolateSegment => "Isolate affected segment",
            ResponseAction::RevokeDataAccess => "Revoke data access",
            ResponseAction::RecordConfigChange => "Record configuration change",
            ResponseAction::EnforcePolicy => "Enforce security policy",
            ResponseAction::MonitorAndLog => "Monitor and log",
        }
    }

    /// Actions that are pushed to the notification channel in addition to the
    /// audit log.
    pub fn requires_notification(&self) -> bool {
        matches!(
            self,
            ResponseAction::AlertSecurityTeam
                | ResponseAction::InitiateIncidentResponse
                | ResponseAction::InitiateEmergencyResponse
        )
    }
}

impl std::fmt::Display for ResponseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A security event as held by the engine.
///
/// `hop` tracks synthetic re-entry depth (correlation and escalation events fed
/// back through the pipeline) and bounds the feedback loop; it is internal and
/// not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub severity: u8,
    pub source: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub response_actions: Vec<ResponseAction>,
    #[serde(skip)]
    pub hop: u8,
}

impl SecurityEvent {
    pub fn new(
        event_type: EventType,
        severity: u8,
        source: impl Into<String>,
        target: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity,
            source: source.into(),
            target: target.into(),
            timestamp,
            details: HashMap::new(),
            status: EventStatus::New,
            response_actions: Vec::new(),
            hop: 0,
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Append a response action. Actions are append-only and never rewritten.
    pub fn push_action(&mut self, action: ResponseAction) {
        self.response_actions.push(action);
    }

    /// Validate and convert an inbound record into the internal event shape.
    ///
    /// Assigns a local timestamp and id when absent, defaults status to `new`.
    /// Rejects out-of-range severity and unknown event types; rejected events
    /// never enter the history.
    pub fn normalize(raw: RawSecurityEvent, now: DateTime<Utc>) -> Result<Self> {
        if raw.severity < MIN_SEVERITY || raw.severity > MAX_SEVERITY {
            return Err(MonitorError::Validation(format!(
                "severity {} outside [{MIN_SEVERITY},{MAX_SEVERITY}]",
                raw.severity
            )));
        }
        let event_type = raw.event_type.parse::<EventType>()?;

        Ok(Self {
            id: raw.id.unwrap_or_else(Uuid::new_v4),
            event_type,
            severity: raw.severity,
            source: raw.source,
            target: raw.target,
            timestamp: raw.timestamp.unwrap_or(now),
            details: raw.details.unwrap_or_default(),
            status: EventStatus::New,
            response_actions: Vec::new(),
            hop: 0,
        })
    }
}

/// Inbound event shape accepted by `ingest`.
///
/// Fields map 1:1 to `SecurityEvent` minus the internal-only ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSecurityEvent {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub event_type: String,
    pub severity: u8,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: Option<HashMap<String, serde_json::Value>>,
}
