// src/storage/postgres.rs - PostgreSQL repository

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::alert::{Alert, AlertSeverity, AlertSource, AlertStatus};
use crate::error::{MonitorError, Result};

use super::AlertRepository;

#[derive(Clone)]
pub struct PostgresAlertRepository {
    pool: PgPool,
}

impl PostgresAlertRepository {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL with {} max connections",
            max_connections
        );

        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| MonitorError::Database(e.to_string()))?
            .application_name("clusterpulse");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MonitorError::Database(e.to_string()))?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MonitorError::Database(format!("migration failed: {e}")))?;

        info!("PostgreSQL alert repository initialized");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn alert_from_row(row: &PgRow) -> Result<Alert> {
        let labels_json: serde_json::Value = row
            .try_get("labels")
            .map_err(|e| MonitorError::Database(e.to_string()))?;
        let labels: HashMap<String, String> =
            serde_json::from_value(labels_json).unwrap_or_default();

        let status: String = row
            .try_get("status")
            .map_err(|e| MonitorError::Database(e.to_string()))?;
        let severity: String = row
            .try_get("severity")
            .map_err(|e| MonitorError::Database(e.to_string()))?;
        let source: String = row
            .try_get("source")
            .map_err(|e| MonitorError::Database(e.to_string()))?;

        Ok(Alert {
            id: row
                .try_get::<Uuid, _>("id")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            status: status.parse()?,
            severity: severity.parse()?,
            message: row
                .try_get("message")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            source: source.parse()?,
            labels,
            value: row
                .try_get("value")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            triggered_at: row
                .try_get::<DateTime<Utc>, _>("triggered_at")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            resolved_at: row
                .try_get::<Option<DateTime<Utc>>, _>("resolved_at")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(|e| MonitorError::Database(e.to_string()))?,
        })
    }
}

#[async_trait]
impl AlertRepository for PostgresAlertRepository {
    async fn create(&self, alert: &Alert) -> Result<()> {
        let labels = serde_json::to_value(&alert.labels)?;

        sqlx::query(
            r#"
            INSERT INTO alerts
                (id, status, severity, message, source, labels, value,
                 triggered_at, resolved_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(alert.id)
        .bind(alert.status.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.source.as_str())
        .bind(labels)
        .bind(alert.value)
        .bind(alert.triggered_at)
        .bind(alert.resolved_at)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Persist(e.to_string()))?;

        Ok(())
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts ORDER BY triggered_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(e.to_string()))?;

        rows.iter().map(Self::alert_from_row).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    async fn count_by_status(&self, status: AlertStatus) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MonitorError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    async fn count_by_severity(&self, severity: AlertSeverity) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE severity = $1 AND status = $2",
        )
        .bind(severity.as_str())
        .bind(AlertStatus::Firing.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(e.to_string()))?;
        Ok(count as u64)
    }
}
