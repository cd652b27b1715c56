//! Security monitoring engine
//!
//! Owns all mutable monitoring state and serializes every mutating operation
//! through a single write lock, so correlation buckets, the incident set, and
//! the history always reflect a total order consistent with event arrival.
//!
//! # Architecture
//! ```text
//! ingest ──▶ normalize ──▶ incident tracker ──▶ correlation ──▶ history
//!                              │                    │
//!                              │ escalation         │ suspicious_activity
//!                              ▼                    ▼
//!                         (fed back through the same pipeline, hop-capped)
//!
//! side effects ──▶ bounded mpsc ──▶ dispatcher task ──▶ audit / notification
//! scheduler    ──▶ sweep / metrics refresh / dashboard push ticks
//! ```

pub mod scheduler;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::correlation::CorrelationEngine;
use crate::dashboard::{self, ComponentHealth, DashboardSnapshot};
use crate::error::{MonitorError, Result};
use crate::incident::IncidentTracker;
use crate::metrics::{self, MetricsSnapshot};
use crate::retention::EventHistory;
use crate::sinks::{
    self, AuditRecord, AuditSink, LogAuditSink, LogNotifier, NotificationSink, SinkCommand,
};
use crate::types::{EventStatus, EventType, RawSecurityEvent, SecurityEvent, MAX_SEVERITY};

/// Engine run-state and counters, served by `SecurityMonitor::status`.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub uptime_seconds: i64,
    pub events_processed: u64,
    pub feedback_dropped: u64,
    pub collaborator_errors: u64,
    pub active_incidents: usize,
    pub history_len: usize,
    pub patterns_fired: u64,
}

/// All mutable engine state, guarded by a single lock.
struct EngineState {
    history: EventHistory,
    correlation: CorrelationEngine,
    incidents: IncidentTracker,
    metrics: MetricsSnapshot,
    events_processed: u64,
    feedback_dropped: u64,
    /// Reset on every `start()`; uptime measures time monitored, not the age
    /// of the engine value.
    started_at: DateTime<Utc>,
}

/// The monitoring engine.
///
/// Cheap to clone; clones share the same state. Collaborators (audit log
/// store, notification channel) are injected at construction so the engine
/// carries no global state.
#[derive(Clone)]
pub struct SecurityMonitor {
    config: MonitorConfig,
    state: Arc<RwLock<EngineState>>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSink>,
    sink_tx: mpsc::Sender<SinkCommand>,
    sink_rx: Arc<Mutex<Option<mpsc::Receiver<SinkCommand>>>>,
    event_tx: broadcast::Sender<SecurityEvent>,
    dashboard_tx: broadcast::Sender<DashboardSnapshot>,
    collaborator_errors: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: Arc<Mutex<Option<mpsc::Sender<()>>>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SecurityMonitor {
    pub fn new(
        config: MonitorConfig,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let retention = config.retention_window();
        let state = EngineState {
            history: EventHistory::new(config.retention.max_events, retention),
            correlation: CorrelationEngine::new(
                config.correlation_window(),
                config.correlation.event_threshold,
            ),
            incidents: IncidentTracker::new(
                config.thresholds.high,
                config.thresholds.critical,
                retention,
            ),
            metrics: MetricsSnapshot::default(),
            events_processed: 0,
            feedback_dropped: 0,
            started_at: Utc::now(),
        };

        let (sink_tx, sink_rx) = mpsc::channel(config.channels.sink_buffer);
        let (event_tx, _) = broadcast::channel(config.channels.event_buffer);
        let (dashboard_tx, _) = broadcast::channel(16);

        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            audit,
            notifier,
            sink_tx,
            sink_rx: Arc::new(Mutex::new(Some(sink_rx))),
            event_tx,
            dashboard_tx,
            collaborator_errors: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Arc::new(Mutex::new(None)),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Construct with tracing-backed default sinks.
    pub fn with_default_sinks(config: MonitorConfig) -> Self {
        Self::new(config, Arc::new(LogAuditSink), Arc::new(LogNotifier))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Ingest a security event.
    ///
    /// Validation failures are reported synchronously and leave no partial
    /// state. Everything downstream of validation (collaborator failures,
    /// feedback drops) is absorbed internally and surfaced via logs and
    /// counters, keeping the pipeline available.
    pub fn ingest(&self, raw: RawSecurityEvent) -> Result<SecurityEvent> {
        let now = Utc::now();
        let event = SecurityEvent::normalize(raw, now)?;
        let state = &mut *self.state.write();
        Ok(self.process_event(state, event, now))
    }

    /// Run one event through classification, correlation, and history,
    /// feeding synthetic events back through the same path.
    fn process_event(
        &self,
        state: &mut EngineState,
        mut event: SecurityEvent,
        now: DateTime<Utc>,
    ) -> SecurityEvent {
        let outcome = state.incidents.process(&mut event);
        self.dispatch_effects(&event);
        let correlated = state.correlation.observe(&event, now);

        state.history.push(event.clone());
        state.events_processed += 1;
        // No subscribers is fine; lagging subscribers drop oldest.
        let _ = self.event_tx.send(event.clone());

        if outcome.escalate {
            let mut escalation = SecurityEvent::new(
                EventType::IncidentEscalation,
                MAX_SEVERITY,
                event.source.clone(),
                event.target.clone(),
                now,
            )
            .with_detail("escalated_from", serde_json::json!(event.id.to_string()));
            escalation.hop = event.hop + 1;
            self.feed_back(state, escalation, now);
        }

        if let Some(synthetic) = correlated {
            self.feed_back(state, synthetic, now);
        }

        event
    }

    /// Re-enter the pipeline with a synthetic event, bounded by the hop cap.
    fn feed_back(&self, state: &mut EngineState, event: SecurityEvent, now: DateTime<Utc>) {
        if event.hop > self.config.correlation.max_feedback_hops {
            state.feedback_dropped += 1;
            debug!(
                event_type = %event.event_type,
                hop = event.hop,
                "Dropping synthetic event past feedback hop limit"
            );
            return;
        }
        self.process_event(state, event, now);
    }

    /// Hand audit and notification work to the dispatcher without blocking
    /// the processing path. A full buffer drops the command (logged, counted).
    fn dispatch_effects(&self, event: &SecurityEvent) {
        self.send_sink(SinkCommand::Audit(AuditRecord::for_event(event)));
        for action in &event.response_actions {
            if action.requires_notification() {
                self.send_sink(SinkCommand::Notify {
                    event: Box::new(event.clone()),
                    action: *action,
                });
            }
        }
    }

    fn send_sink(&self, command: SinkCommand) {
        if self.sink_tx.try_send(command).is_err() {
            self.collaborator_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Collaborator dispatch buffer full, dropping command");
        }
    }

    /// Apply an externally triggered status transition (containment,
    /// resolution, false-positive). Accepted as input; terminal statuses
    /// deregister the incident.
    pub fn set_event_status(&self, id: Uuid, status: EventStatus) -> Result<()> {
        let found = {
            let state = &mut *self.state.write();
            let in_incidents = state.incidents.set_status(id, status);
            let in_history = match state.history.find_mut(id) {
                Some(event) => {
                    event.status = status;
                    true
                }
                None => false,
            };
            in_incidents || in_history
        };

        if !found {
            return Err(MonitorError::Lifecycle(format!("unknown event: {id}")));
        }

        self.send_sink(SinkCommand::Audit(AuditRecord::new(
            "status_change",
            id.to_string(),
            status.as_str(),
            serde_json::json!({ "event_id": id }),
        )));
        Ok(())
    }

    /// Retention sweep across history, incidents, and correlation buckets.
    pub fn sweep(&self) {
        let now = Utc::now();
        let state = &mut *self.state.write();
        let removed_events = state.history.sweep(now);
        let removed_incidents = state.incidents.sweep(now);
        state.correlation.sweep(now);
        if removed_events > 0 || removed_incidents > 0 {
            debug!(removed_events, removed_incidents, "Retention sweep");
        }
    }

    /// Recompute the cached metrics snapshot used by the dashboard.
    pub fn refresh_metrics(&self) {
        let now = Utc::now();
        let state = &mut *self.state.write();
        let snapshot = metrics::recompute(&state.history, state.started_at, now);
        state.metrics = snapshot;
    }

    /// Freshly recomputed metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        let now = Utc::now();
        let state = self.state.read();
        metrics::recompute(&state.history, state.started_at, now)
    }

    /// Assemble the current dashboard snapshot. Read-only; uses the cached
    /// metrics so repeated calls without intervening ingests are identical.
    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let now = Utc::now();
        let state = self.state.read();
        self.build_dashboard(&state, now)
    }

    fn build_dashboard(&self, state: &EngineState, now: DateTime<Utc>) -> DashboardSnapshot {
        let health = ComponentHealth {
            monitoring_active: self.running.load(Ordering::Relaxed),
            history_utilization: state.history.len() as f64 / state.history.max_events() as f64,
            correlation_buckets: state.correlation.bucket_count(),
            collaborator_errors: self.collaborator_errors.load(Ordering::Relaxed),
        };
        dashboard::snapshot(
            &state.history,
            state.incidents.active_count() as u64,
            state.metrics.clone(),
            health,
            self.config.thresholds.high,
            self.config.thresholds.critical,
            now,
        )
    }

    /// Build and broadcast a dashboard snapshot (dashboard-push tick).
    pub fn push_dashboard(&self) {
        let now = Utc::now();
        let snapshot = {
            let state = self.state.read();
            self.build_dashboard(&state, now)
        };
        let _ = self.dashboard_tx.send(snapshot);
    }

    pub fn status(&self) -> MonitorStatus {
        let state = self.state.read();
        MonitorStatus {
            running: self.running.load(Ordering::Relaxed),
            uptime_seconds: (Utc::now() - state.started_at).num_seconds().max(0),
            events_processed: state.events_processed,
            feedback_dropped: state.feedback_dropped,
            collaborator_errors: self.collaborator_errors.load(Ordering::Relaxed),
            active_incidents: state.incidents.active_count(),
            history_len: state.history.len(),
            patterns_fired: state.correlation.stats().patterns_fired,
        }
    }

    pub fn active_incidents(&self) -> Vec<SecurityEvent> {
        self.state.read().incidents.active_incidents()
    }

    /// Subscribe to fully processed events (synthetic ones included).
    pub fn subscribe_events(&self) -> broadcast::Receiver<SecurityEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to periodic dashboard pushes.
    pub fn subscribe_dashboard(&self) -> broadcast::Receiver<DashboardSnapshot> {
        self.dashboard_tx.subscribe()
    }

    /// Start the scheduler and the collaborator dispatcher.
    ///
    /// Idempotent; calling while running is a no-op. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Monitor already running");
            return;
        }

        self.state.write().started_at = Utc::now();

        // First start only; the dispatcher survives stop() so queued
        // side effects still drain.
        if let Some(rx) = self.sink_rx.lock().take() {
            tokio::spawn(sinks::run_dispatcher(
                rx,
                self.audit.clone(),
                self.notifier.clone(),
                self.collaborator_errors.clone(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let monitor = self.clone();
        let handle = tokio::spawn(async move { scheduler::run(monitor, shutdown_rx).await });
        self.tasks.lock().push(handle);

        self.audit_lifecycle("start");
        info!("Security monitor started");
    }

    /// Cancel periodic ticks and wait for the scheduler to wind down.
    ///
    /// Safe to call concurrently with in-flight processing and when never
    /// started; an event currently being processed runs to completion.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Monitor not running");
            return;
        }

        let shutdown_tx = self.shutdown_tx.lock().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.audit_lifecycle("stop");
        info!("Security monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn audit_lifecycle(&self, action: &str) {
        self.send_sink(SinkCommand::Audit(AuditRecord::new(
            "lifecycle",
            "security_monitor",
            action,
            serde_json::json!({
                "uptime_seconds": (Utc::now() - self.state.read().started_at).num_seconds(),
            }),
        )));
    }
}
