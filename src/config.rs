use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub correlation: CorrelationConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub channels: ChannelConfig,
}

/// Severity thresholds driving incident classification and dashboard status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Events at or above this severity become active incidents
    pub high: u8,
    /// Events at or above this severity trigger escalation
    pub critical: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { high: 7, critical: 9 }
    }
}

/// Sliding-window correlation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Correlation time window in seconds
    pub window_seconds: u64,
    /// Minimum same-key events within the window to fire a pattern
    pub event_threshold: usize,
    /// Maximum re-entry depth for synthetic (correlation/escalation) events
    pub max_feedback_hops: u8,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300, // 5 minutes
            event_threshold: 3,
            max_feedback_hops: 1,
        }
    }
}

/// Bounded history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum events kept in the rolling history
    pub max_events: usize,
    /// Maximum age of events and incidents, in hours
    pub retention_hours: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            retention_hours: 24,
        }
    }
}

/// Periodic tick intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Retention sweep interval in seconds
    pub scan_interval_secs: u64,
    /// Metrics refresh interval in seconds
    pub metrics_interval_secs: u64,
    /// Dashboard push interval in seconds
    pub dashboard_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 5,
            metrics_interval_secs: 60,
            dashboard_interval_secs: 10,
        }
    }
}

/// Channel capacities for pub/sub and collaborator dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Processed-event broadcast buffer (lagging subscribers drop oldest)
    pub event_buffer: usize,
    /// Audit/notification dispatch buffer (full buffer drops newest, logged)
    pub sink_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            sink_buffer: 1024,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Load from the first config file found in standard locations, or defaults
    pub fn load_or_default() -> Result<Self> {
        let candidates = [
            PathBuf::from("/etc/tradewatch/config.toml"),
            dirs_config_path(),
            PathBuf::from("config.toml"),
        ];

        for path in candidates.iter() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn correlation_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.correlation.window_seconds as i64)
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention.retention_hours)
    }
}

fn dirs_config_path() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .map(|p| p.join("tradewatch/config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
