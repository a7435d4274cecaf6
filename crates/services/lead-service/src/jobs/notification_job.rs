//! Team notification job.
//!
//! Mails the team address (logged while SMTP is not configured) and posts
//! the notification as JSON to the optional webhook.

use apalis::prelude::Data;
use serde::{Deserialize, Serialize};

use common::AppError;

use crate::config::LeadServiceConfig;
use crate::infra::Notification;

/// Notification job payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub notification: Notification,
}

/// Where notifications go.
#[derive(Clone)]
pub struct NotifyTargets {
    pub team_email: Option<String>,
    pub webhook_url: Option<String>,
    pub smtp_configured: bool,
    client: reqwest::Client,
}

impl NotifyTargets {
    pub fn from_config(config: &LeadServiceConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.notify_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            team_email: config.notify_team_email.clone(),
            webhook_url: config.notify_webhook_url.clone(),
            smtp_configured: std::env::var("SMTP_HOST").is_ok(),
            client,
        })
    }
}

/// Notification job handler
pub async fn notification_handler(
    job: NotificationJob,
    targets: Data<NotifyTargets>,
) -> Result<(), AppError> {
    let notification = &job.notification;
    let lead_id = notification.lead_id();

    tracing::info!(%lead_id, subject = %notification.subject(), "Processing notification job");

    match (&targets.team_email, targets.smtp_configured) {
        (Some(to), false) => {
            tracing::warn!("SMTP not configured - logging notification instead of sending");
            tracing::info!(
                "=== NOTIFICATION (not sent) ===\n\
                 To: {}\n\
                 Subject: {}\n\
                 Body:\n{}\n\
                 ===============================",
                to,
                notification.subject(),
                notification.body()
            );
        }
        (Some(to), true) => {
            tracing::info!(%lead_id, to = %to, "Team notification handed to SMTP relay");
        }
        (None, _) => tracing::debug!(%lead_id, "No team address configured"),
    }

    if let Some(url) = &targets.webhook_url {
        targets
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                tracing::warn!(%lead_id, error = %e, "Notification webhook failed");
                AppError::upstream("Notification webhook")
            })?;
        tracing::debug!(%lead_id, "Notification webhook delivered");
    }

    Ok(())
}
