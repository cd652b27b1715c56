//! Collaborator sinks
//!
//! Narrow contracts for the external audit log store and notification
//! channels. The engine fires these and moves on: a failed delivery is logged
//! and counted but never rolls back or blocks event processing. Retry policy
//! belongs to the collaborator implementations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{ResponseAction, SecurityEvent};

/// Outcome recorded in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    Failure,
}

/// Compliance record emitted for every processed event and for engine
/// lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub event_type: String,
    pub actor: String,
    pub resource: String,
    pub action: String,
    pub result: AuditResult,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        event_type: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            event_type: event_type.into(),
            actor: "SYSTEM".to_string(),
            resource: resource.into(),
            action: action.into(),
            result: AuditResult::Success,
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn for_event(event: &SecurityEvent) -> Self {
        Self::new(
            event.event_type.as_str(),
            event.target.clone(),
            "process_event",
            serde_json::json!({
                "event_id": event.id,
                "severity": event.severity,
                "source": event.source,
                "status": event.status,
                "response_actions": event.response_actions,
            }),
        )
    }
}

/// Append-only audit log store.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<()>;
}

/// Notification channel (email, Telegram, pager) for escalation actions.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &SecurityEvent, action: ResponseAction) -> Result<()>;
}

/// Default audit sink writing structured records through tracing.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "tradewatch::audit", "{json}"),
            Err(e) => warn!("Failed to serialize audit record: {e}"),
        }
        Ok(())
    }
}

/// Default notifier writing alerts through tracing.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: &SecurityEvent, action: ResponseAction) -> Result<()> {
        warn!(
            target: "tradewatch::notify",
            event_id = %event.id,
            severity = event.severity,
            source = %event.source,
            action = %action,
            "Security notification"
        );
        Ok(())
    }
}

/// Work items handed from the synchronous processing path to the dispatcher.
#[derive(Debug)]
pub enum SinkCommand {
    Audit(AuditRecord),
    Notify {
        event: Box<SecurityEvent>,
        action: ResponseAction,
    },
}

/// Drain sink commands and deliver them to the collaborators.
///
/// Runs until the command channel closes. Delivery failures are logged and
/// counted; nothing is retried here.
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<SinkCommand>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSink>,
    errors: Arc<AtomicU64>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Audit(record) => {
                if let Err(e) = audit.record(record).await {
                    errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Audit sink failure: {e}");
                }
            }
            SinkCommand::Notify { event, action } => {
                if let Err(e) = notifier.notify(&event, action).await {
                    errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Notification sink failure: {e}");
                }
            }
        }
    }
}
