// src/alert.rs - Alert model and bus event types

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MonitorError;

/// Lifecycle state of an alert. The pipeline only ever produces `Firing`;
/// `Resolved` is supported by the schema for future use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firing" => Ok(AlertStatus::Firing),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(MonitorError::Database(format!(
                "unknown alert status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::High => "high",
            AlertSeverity::Medium => "medium",
            AlertSeverity::Low => "low",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(AlertSeverity::Critical),
            "high" => Ok(AlertSeverity::High),
            "medium" => Ok(AlertSeverity::Medium),
            "low" => Ok(AlertSeverity::Low),
            other => Err(MonitorError::Database(format!(
                "unknown alert severity: {other}"
            ))),
        }
    }
}

/// Where an alert originated in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSource {
    #[serde(rename = "k8s_pod")]
    Pod,
    #[serde(rename = "k8s_node")]
    Node,
    #[serde(rename = "k8s_pod_metrics")]
    PodMetrics,
    #[serde(rename = "k8s_node_metrics")]
    NodeMetrics,
}

impl AlertSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSource::Pod => "k8s_pod",
            AlertSource::Node => "k8s_node",
            AlertSource::PodMetrics => "k8s_pod_metrics",
            AlertSource::NodeMetrics => "k8s_node_metrics",
        }
    }
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSource {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "k8s_pod" => Ok(AlertSource::Pod),
            "k8s_node" => Ok(AlertSource::Node),
            "k8s_pod_metrics" => Ok(AlertSource::PodMetrics),
            "k8s_node_metrics" => Ok(AlertSource::NodeMetrics),
            other => Err(MonitorError::Database(format!(
                "unknown alert source: {other}"
            ))),
        }
    }
}

/// A detected cluster condition. The only entity the pipeline persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub status: AlertStatus,
    pub severity: AlertSeverity,
    pub message: String,
    pub source: AlertSource,
    pub labels: HashMap<String, String>,
    pub value: f64,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: AlertSeverity,
        source: AlertSource,
        message: impl Into<String>,
        value: f64,
        labels: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: AlertStatus::Firing,
            severity,
            message: message.into(),
            source,
            labels,
            value,
            triggered_at: now,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the alert resolved. The schema supports this transition; the
    /// current pipeline never performs it.
    pub fn resolve(&mut self) {
        let now = Utc::now();
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }

    /// The `alert_type` label, empty when absent.
    pub fn alert_type(&self) -> &str {
        self.labels.get("alert_type").map(String::as_str).unwrap_or("")
    }
}

/// An alert paired with its publication time. In-memory only.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub alert: Alert,
    pub timestamp: DateTime<Utc>,
}
