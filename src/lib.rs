//! tradewatch — continuous security-event monitoring for trading platforms
//!
//! Ingests discrete security events (threat detections, authentication
//! failures, unauthorized access attempts, configuration changes), keeps a
//! bounded rolling history, correlates related events inside sliding time
//! windows, tracks incident lifecycles, computes rolling security metrics, and
//! serves dashboard snapshots on demand.
//!
//! The engine is in-memory with external sinks: the audit log store and the
//! notification channels are injected collaborators behind narrow traits.
//!
//! # Example
//! ```ignore
//! use tradewatch::{MonitorConfig, SecurityMonitor};
//!
//! let monitor = SecurityMonitor::with_default_sinks(MonitorConfig::default());
//! monitor.start();
//! let event = monitor.ingest(raw_event)?;
//! let dashboard = monitor.dashboard_snapshot();
//! monitor.stop().await;
//! ```

pub mod config;
pub mod correlation;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod incident;
pub mod metrics;
pub mod retention;
pub mod sinks;
pub mod types;

pub use config::MonitorConfig;
pub use dashboard::{DashboardSnapshot, OverallStatus};
pub use engine::{MonitorStatus, SecurityMonitor};
pub use error::{MonitorError, Result};
pub use metrics::MetricsSnapshot;
pub use sinks::{AuditRecord, AuditSink, NotificationSink};
pub use types::{EventStatus, EventType, RawSecurityEvent, ResponseAction, SecurityEvent};
