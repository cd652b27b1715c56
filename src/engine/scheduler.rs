//! Periodic tick loop
//!
//! Drives the retention sweep, metrics refresh, and dashboard push on
//! independent intervals. Shutdown cancels future ticks only; a tick already
//! executing runs to completion before the loop exits.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::SecurityMonitor;

pub(crate) async fn run(monitor: SecurityMonitor, mut shutdown_rx: mpsc::Receiver<()>) {
    let config = monitor.config().scheduler.clone();
    debug!(
        scan = config.scan_interval_secs,
        metrics = config.metrics_interval_secs,
        dashboard = config.dashboard_interval_secs,
        "Scheduler intervals (seconds)"
    );

    let mut scan_timer = interval(Duration::from_secs(config.scan_interval_secs.max(1)));
    let mut metrics_timer = interval(Duration::from_secs(config.metrics_interval_secs.max(1)));
    let mut dashboard_timer = interval(Duration::from_secs(config.dashboard_interval_secs.max(1)));
    scan_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    metrics_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    dashboard_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Scheduler started");

    loop {
        tokio::select! {
            _ = scan_timer.tick() => {
                monitor.sweep();
            }

            _ = metrics_timer.tick() => {
                monitor.refresh_metrics();
            }

            _ = dashboard_timer.tick() => {
                monitor.push_dashboard();
            }

            _ = shutdown_rx.recv() => {
                info!("Scheduler shutdown signal received");
                break;
            }
        }
    }

    info!("Scheduler stopped");
}
