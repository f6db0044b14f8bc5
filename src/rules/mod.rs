// src/rules/mod.rs - Pure rule evaluation: raw cluster objects in, alerts out

use std::fmt;
use std::time::Duration;

use crate::config::AlertRulesConfig;

pub mod node;
pub mod pod;
pub mod usage;

pub use node::evaluate_node;
pub use pod::evaluate_pod;
pub use usage::{evaluate_node_usage, evaluate_pod_usage};

/// Categories of alerts the evaluator can produce. The string form goes into
/// the `alert_type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    // Event-based alerts
    PodFailed,
    PodUnknown,
    PodOomKilled,
    PodCrashLoop,
    PodImagePull,
    PodRestartThreshold,
    PodPending,
    NodeNotReady,
    NodeMemoryPressure,
    NodeDiskPressure,
    NodePidPressure,

    // Metric-based alerts
    PodCpuHigh,
    PodMemoryHigh,
    NodeCpuHigh,
    NodeMemoryHigh,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PodFailed => "pod_failed",
            AlertType::PodUnknown => "pod_unknown",
            AlertType::PodOomKilled => "pod_oom_killed",
            AlertType::PodCrashLoop => "pod_crash_loop",
            AlertType::PodImagePull => "pod_image_pull",
            AlertType::PodRestartThreshold => "pod_restart_threshold",
            AlertType::PodPending => "pod_pending",
            AlertType::NodeNotReady => "node_not_ready",
            AlertType::NodeMemoryPressure => "node_memory_pressure",
            AlertType::NodeDiskPressure => "node_disk_pressure",
            AlertType::NodePidPressure => "node_pid_pressure",
            AlertType::PodCpuHigh => "pod_cpu_high",
            AlertType::PodMemoryHigh => "pod_memory_high",
            AlertType::NodeCpuHigh => "node_cpu_high",
            AlertType::NodeMemoryHigh => "node_memory_high",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison limits the evaluators run against, precomputed from
/// configuration once at wiring time.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub pod_restart_threshold: i32,
    pub pod_cpu_percent: f64,
    pub pod_memory_percent: f64,
    pub node_cpu_percent: f64,
    pub node_memory_percent: f64,
    pub pod_pending_grace: Duration,
}

impl From<&AlertRulesConfig> for Thresholds {
    fn from(rules: &AlertRulesConfig) -> Self {
        Self {
            pod_restart_threshold: rules.pod_restart_threshold,
            pod_cpu_percent: f64::from(rules.pod_cpu_threshold),
            pod_memory_percent: f64::from(rules.pod_memory_threshold),
            node_cpu_percent: f64::from(rules.node_cpu_threshold),
            node_memory_percent: f64::from(rules.node_memory_threshold),
            pod_pending_grace: rules.pod_pending_grace(),
        }
    }
}

#[cfg(test)]
impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&crate::config::Config::default().alert_rules)
    }
}
