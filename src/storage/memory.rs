// src/storage/memory.rs - In-memory repository used by tests and the
// memory backend

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::alert::{Alert, AlertSeverity, AlertStatus};
use crate::error::Result;

use super::AlertRepository;

/// Concurrency-safe list of alerts under a read/write lock.
pub struct MemoryAlertRepository {
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryAlertRepository {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::with_capacity(1000)),
        }
    }
}

impl Default for MemoryAlertRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertRepository for MemoryAlertRepository {
    async fn create(&self, alert: &Alert) -> Result<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut recent: Vec<Alert> = alerts.iter().cloned().collect();
        recent.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.alerts.read().await.len() as u64)
    }

    async fn count_by_status(&self, status: AlertStatus) -> Result<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts.iter().filter(|a| a.status == status).count() as u64)
    }

    async fn count_by_severity(&self, severity: AlertSeverity) -> Result<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .filter(|a| a.severity == severity && a.status == AlertStatus::Firing)
            .count() as u64)
    }
}
