use std::path::Path;

use apiary_core::{ApiaryError, ApiaryResult};
use serde::{Deserialize, Serialize};

/// Tuning knobs for agent selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Hard upper bound on swarm size.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Lower bound fed into the selection-limit formula.
    #[serde(default = "default_min_agents")]
    pub min_agents: usize,
    /// How many candidates to request from the agent directory.
    #[serde(default = "default_directory_max_results")]
    pub directory_max_results: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            min_agents: default_min_agents(),
            directory_max_results: default_directory_max_results(),
        }
    }
}

/// Tuning knobs for the swarm health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between monitoring ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum health reports retained per session.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Silence after which an agent counts as unresponsive.
    #[serde(default = "default_unresponsive_after_secs")]
    pub unresponsive_after_secs: i64,
    /// Silence after which an agent counts as idle.
    #[serde(default = "default_idle_after_secs")]
    pub idle_after_secs: i64,
    /// Open assignments above which an agent counts as overloaded.
    #[serde(default = "default_overload_threshold")]
    pub overload_threshold: usize,
    /// Error rate above which an agent counts as erroring.
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
    /// Average response latency considered unhealthy, in milliseconds.
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: f64,
    /// Coordination-efficiency ratio below which an issue is raised.
    #[serde(default = "default_low_coordination_ratio")]
    pub low_coordination_ratio: f64,
    /// Share of session messages above which an agent is a bottleneck.
    #[serde(default = "default_bottleneck_share")]
    pub bottleneck_share: f64,
    /// Session-overrun factor relative to summed subtask estimates.
    #[serde(default = "default_overrun_factor")]
    pub overrun_factor: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            history_cap: default_history_cap(),
            unresponsive_after_secs: default_unresponsive_after_secs(),
            idle_after_secs: default_idle_after_secs(),
            overload_threshold: default_overload_threshold(),
            error_rate_threshold: default_error_rate_threshold(),
            latency_threshold_ms: default_latency_threshold_ms(),
            low_coordination_ratio: default_low_coordination_ratio(),
            bottleneck_share: default_bottleneck_share(),
            overrun_factor: default_overrun_factor(),
        }
    }
}

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Hard timeout on reasoning-boundary calls, in seconds.
    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,
    /// Agent selection tuning.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Health monitor tuning.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            selection: SelectionConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl SwarmConfig {
    /// Parses a config from a TOML string.
    pub fn from_toml_str(raw: &str) -> ApiaryResult<Self> {
        toml::from_str(raw).map_err(|e| ApiaryError::Config(e.to_string()))
    }

    /// Loads a config file from disk.
    pub async fn load(path: impl AsRef<Path>) -> ApiaryResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&raw)
    }
}

fn default_max_agents() -> usize {
    5
}
fn default_min_agents() -> usize {
    2
}
fn default_directory_max_results() -> usize {
    20
}
fn default_interval_secs() -> u64 {
    30
}
fn default_history_cap() -> usize {
    100
}
fn default_unresponsive_after_secs() -> i64 {
    300
}
fn default_idle_after_secs() -> i64 {
    60
}
fn default_overload_threshold() -> usize {
    3
}
fn default_error_rate_threshold() -> f64 {
    0.2
}
fn default_latency_threshold_ms() -> f64 {
    5_000.0
}
fn default_low_coordination_ratio() -> f64 {
    0.2
}
fn default_bottleneck_share() -> f64 {
    0.4
}
fn default_overrun_factor() -> f64 {
    1.5
}
fn default_reasoning_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwarmConfig::default();
        assert_eq!(config.reasoning_timeout_secs, 30);
        assert_eq!(config.selection.max_agents, 5);
        assert_eq!(config.selection.min_agents, 2);
        assert_eq!(config.monitor.interval_secs, 30);
        assert_eq!(config.monitor.history_cap, 100);
        assert_eq!(config.monitor.unresponsive_after_secs, 300);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = SwarmConfig::from_toml_str(
            r#"
            reasoning_timeout_secs = 10

            [monitor]
            interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.reasoning_timeout_secs, 10);
        assert_eq!(config.monitor.interval_secs, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.monitor.overload_threshold, 3);
        assert_eq!(config.selection.max_agents, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SwarmConfig::from_toml_str("not toml at all [").unwrap_err();
        assert!(matches!(err, ApiaryError::Config(_)));
    }
}
