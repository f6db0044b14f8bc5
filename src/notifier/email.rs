// src/notifier/email.rs - SMTP alert dispatcher

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::alert::{Alert, AlertEvent};
use crate::bus::AlertSink;
use crate::config::EmailConfig;
use crate::error::{MonitorError, Result};

const SEND_ATTEMPTS: usize = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bus sink that mails every alert to the configured recipients. Attached
/// only when email is enabled and SMTP host plus credentials are present.
pub struct EmailDispatcher {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDispatcher {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let credentials =
            Credentials::new(config.username.clone(), config.password.clone());

        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| MonitorError::Configuration(e.to_string()))?
                .port(config.smtp_port)
                .credentials(credentials)
                .build();

        Ok(Self { config, transport })
    }

    fn format_subject(alert: &Alert) -> String {
        format!("Alert: {} - {}", alert.severity, alert.source)
    }

    fn format_body(event: &AlertEvent) -> String {
        let alert = &event.alert;

        // Sorted labels keep the layout stable across dispatches.
        let labels: BTreeMap<&String, &String> = alert.labels.iter().collect();
        let labels_text = labels
            .iter()
            .map(|(key, value)| format!("  {key}={value}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "\nMonitoring Alert\n\n\
             Severity: {}\n\
             Source: {}\n\
             Message: {}\n\
             Value: {:.2}\n\
             Timestamp: {}\n\n\
             Labels:\n{}\n\n\
             --\n\
             ClusterPulse\n",
            alert.severity,
            alert.source,
            alert.message,
            alert.value,
            alert.created_at.to_rfc3339(),
            labels_text,
        )
    }

    fn build_message(&self, event: &AlertEvent) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|_| MonitorError::Configuration("invalid from address".to_string()))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(Self::format_subject(&event.alert));

        for recipient in &self.config.to {
            let to: Mailbox = recipient.parse().map_err(|_| {
                MonitorError::Configuration(format!("invalid recipient address: {recipient}"))
            })?;
            builder = builder.to(to);
        }

        builder
            .body(Self::format_body(event))
            .map_err(|e| MonitorError::Sink(e.to_string()))
    }
}

#[async_trait]
impl AlertSink for EmailDispatcher {
    fn name(&self) -> &str {
        "email_dispatcher"
    }

    async fn on_alert(&self, event: &AlertEvent) -> Result<()> {
        if self.config.smtp_host.is_empty() || self.config.username.is_empty() {
            warn!("Email configuration incomplete, skipping email dispatch");
            return Ok(());
        }

        let message = self.build_message(event)?;

        let mut last_error = String::new();
        for attempt in 0..SEND_ATTEMPTS {
            if attempt > 0 {
                sleep(RETRY_DELAY).await;
            }

            match self.transport.send(message.clone()).await {
                Ok(_) => {
                    info!(
                        recipients = self.config.to.len(),
                        severity = %event.alert.severity,
                        "Alert email sent"
                    );
                    return Ok(());
                }
                Err(err) => last_error = err.to_string(),
            }
        }

        Err(MonitorError::Sink(format!(
            "email dispatch failed after retries: {last_error}"
        )))
    }
}
