// src/config.rs - Environment-driven configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub kubernetes: KubernetesConfig,
    pub alert_rules: AlertRulesConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host for the WebSocket endpoint
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type: "memory" or "postgres"
    pub backend: String,
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// How often the metrics watcher samples the metrics API (in seconds)
    pub metrics_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    /// Total container restarts above which a pod alert fires
    pub pod_restart_threshold: i32,

    /// Pod CPU usage percent (of requests) above which an alert fires
    pub pod_cpu_threshold: u32,

    /// Pod memory usage percent (of requests) above which an alert fires
    pub pod_memory_threshold: u32,

    /// Node CPU usage percent (of capacity) above which an alert fires
    pub node_cpu_threshold: u32,

    /// Node memory usage percent (of capacity) above which an alert fires
    pub node_memory_threshold: u32,

    /// How long a pod may sit in Pending before it alerts (in seconds)
    pub pod_pending_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                backend: "memory".to_string(),
                database_url: None,
                max_connections: Some(10),
            },
            kubernetes: KubernetesConfig {
                metrics_interval_seconds: 60,
            },
            alert_rules: AlertRulesConfig {
                pod_restart_threshold: 5,
                pod_cpu_threshold: 80,
                pod_memory_threshold: 80,
                node_cpu_threshold: 90,
                node_memory_threshold: 90,
                pod_pending_grace_seconds: 300,
            },
            email: EmailConfig {
                enabled: false,
                smtp_host: String::new(),
                smtp_port: 587,
                username: String::new(),
                password: String::new(),
                from: String::new(),
                to: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables, starting from defaults.
    /// Unparseable values are logged at warn and left at their default.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        debug!("Loading configuration from environment variables");

        override_string("PULSE_SERVER_HOST", &mut config.server.host);
        override_parsed("PULSE_SERVER_PORT", &mut config.server.port);

        override_string("PULSE_STORAGE_BACKEND", &mut config.storage.backend);
        if let Ok(url) = std::env::var("PULSE_DATABASE_URL") {
            config.storage.database_url = Some(url);
        }
        if let Ok(raw) = std::env::var("PULSE_DB_MAX_CONNECTIONS") {
            match raw.parse() {
                Ok(n) => config.storage.max_connections = Some(n),
                Err(_) => warn!("Invalid PULSE_DB_MAX_CONNECTIONS: {}", raw),
            }
        }

        override_parsed(
            "PULSE_METRICS_INTERVAL",
            &mut config.kubernetes.metrics_interval_seconds,
        );

        override_parsed(
            "PULSE_POD_RESTART_THRESHOLD",
            &mut config.alert_rules.pod_restart_threshold,
        );
        override_parsed(
            "PULSE_POD_CPU_THRESHOLD",
            &mut config.alert_rules.pod_cpu_threshold,
        );
        override_parsed(
            "PULSE_POD_MEMORY_THRESHOLD",
            &mut config.alert_rules.pod_memory_threshold,
        );
        override_parsed(
            "PULSE_NODE_CPU_THRESHOLD",
            &mut config.alert_rules.node_cpu_threshold,
        );
        override_parsed(
            "PULSE_NODE_MEMORY_THRESHOLD",
            &mut config.alert_rules.node_memory_threshold,
        );
        override_parsed(
            "PULSE_POD_PENDING_GRACE",
            &mut config.alert_rules.pod_pending_grace_seconds,
        );

        if let Ok(raw) = std::env::var("PULSE_EMAIL_ENABLED") {
            config.email.enabled = raw.eq_ignore_ascii_case("true") || raw == "1";
        }
        override_string("PULSE_SMTP_HOST", &mut config.email.smtp_host);
        override_parsed("PULSE_SMTP_PORT", &mut config.email.smtp_port);
        override_string("PULSE_SMTP_USERNAME", &mut config.email.username);
        override_string("PULSE_SMTP_PASSWORD", &mut config.email.password);
        override_string("PULSE_SMTP_FROM", &mut config.email.from);
        if let Ok(raw) = std::env::var("PULSE_SMTP_TO") {
            config.email.to = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        match self.storage.backend.as_str() {
            "memory" => {}
            "postgres" => {
                if self.storage.database_url.is_none() {
                    return Err(MonitorError::Configuration(
                        "postgres backend requires PULSE_DATABASE_URL".to_string(),
                    ));
                }
            }
            other => {
                return Err(MonitorError::Configuration(format!(
                    "unknown storage backend: {other}"
                )));
            }
        }

        if self.kubernetes.metrics_interval_seconds == 0 {
            return Err(MonitorError::Configuration(
                "metrics interval must be positive".to_string(),
            ));
        }

        if self.email.enabled && self.email.to.is_empty() {
            warn!("Email notifications enabled but no recipients configured");
        }

        Ok(())
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.kubernetes.metrics_interval_seconds)
    }

    /// Email dispatch requires a host and credentials on top of the flag.
    pub fn email_ready(&self) -> bool {
        self.email.enabled
            && !self.email.smtp_host.is_empty()
            && !self.email.username.is_empty()
            && !self.email.password.is_empty()
    }
}

impl AlertRulesConfig {
    pub fn pod_pending_grace(&self) -> Duration {
        Duration::from_secs(self.pod_pending_grace_seconds)
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {}: {}", key, raw),
        }
    }
}
