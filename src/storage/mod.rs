// src/storage/mod.rs - Alert repository trait and factory

use std::sync::Arc;

use async_trait::async_trait;

use crate::alert::{Alert, AlertSeverity, AlertStatus};
use crate::config::Config;
use crate::error::{MonitorError, Result};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryAlertRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAlertRepository;

/// Persistence port for alerts.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Insert a new alert record.
    async fn create(&self, alert: &Alert) -> Result<()>;

    /// Most recent alerts, descending by `triggered_at`.
    async fn get_recent(&self, limit: usize) -> Result<Vec<Alert>>;

    /// Total number of alerts.
    async fn count(&self) -> Result<u64>;

    /// Number of alerts in the given status.
    async fn count_by_status(&self, status: AlertStatus) -> Result<u64>;

    /// Number of firing alerts with the given severity.
    async fn count_by_severity(&self, severity: AlertSeverity) -> Result<u64>;
}

/// Build the repository selected by configuration.
pub async fn create_repository(config: &Config) -> Result<Arc<dyn AlertRepository>> {
    match config.storage.backend.as_str() {
        "memory" => {
            tracing::info!("Creating in-memory alert repository");
            Ok(Arc::new(MemoryAlertRepository::new()))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let database_url = config.storage.database_url.as_ref().ok_or_else(|| {
                MonitorError::Configuration(
                    "database URL required for postgres backend".to_string(),
                )
            })?;
            let max_connections = config.storage.max_connections.unwrap_or(10);

            tracing::info!(
                "Creating PostgreSQL alert repository with {} max connections",
                max_connections
            );
            let repository = PostgresAlertRepository::new(database_url, max_connections).await?;
            Ok(Arc::new(repository))
        }
        #[cfg(not(feature = "postgres"))]
        "postgres" => Err(MonitorError::Configuration(
            "postgres support not compiled in, enable the 'postgres' feature".to_string(),
        )),
        backend => Err(MonitorError::Configuration(format!(
            "unknown storage backend: {backend}"
        ))),
    }
}
