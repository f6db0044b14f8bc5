// src/state.rs - Alert state manager: persist, then publish

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::alert::{Alert, AlertEvent};
use crate::bus::EventBus;
use crate::error::Result;
use crate::storage::AlertRepository;

/// Owns the persist-then-publish step of the pipeline. Every alert is
/// created as new; there is no deduplication.
pub struct AlertStateManager {
    repository: Arc<dyn AlertRepository>,
    bus: Arc<EventBus>,
}

impl AlertStateManager {
    pub fn new(repository: Arc<dyn AlertRepository>, bus: Arc<EventBus>) -> Self {
        Self { repository, bus }
    }

    /// Persist the alert and publish it to the bus. A persistence failure
    /// suppresses publication and is returned to the caller; a failed
    /// publication never un-persists.
    ///
    /// The boolean is always `true` today; the signature leaves room for
    /// deduplication without API churn.
    pub async fn process_alert(&self, alert: Alert) -> Result<bool> {
        self.repository.create(&alert).await?;

        self.bus.publish(AlertEvent {
            alert: alert.clone(),
            timestamp: Utc::now(),
        });

        info!(
            severity = %alert.severity,
            source = %alert.source,
            message = %alert.message,
            "Alert created and published"
        );

        Ok(true)
    }
}
