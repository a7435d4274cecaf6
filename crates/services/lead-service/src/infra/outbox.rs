//! Outgoing side channels: team notifications and staff email delivery.
//!
//! Both hand work to the background job queue. [`LogOutbox`] replaces the
//! queue when running without PostgreSQL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use common::{AppError, AppResult};

use crate::jobs::{EmailDeliveryJob, NotificationJob};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Events the team is alerted about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    NewLead {
        lead_id: Uuid,
        reference: String,
        name: String,
        email: String,
    },
    NewMessage {
        lead_id: Uuid,
        reference: String,
        subject: String,
        author: String,
    },
    PaymentSucceeded {
        lead_id: Uuid,
        reference: String,
        amount_cents: i64,
    },
}

impl Notification {
    pub fn lead_id(&self) -> Uuid {
        match self {
            Notification::NewLead { lead_id, .. }
            | Notification::NewMessage { lead_id, .. }
            | Notification::PaymentSucceeded { lead_id, .. } => *lead_id,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::NewLead { reference, name, .. } => {
                format!("[{}] New request from {}", reference, name)
            }
            Notification::NewMessage { reference, subject, .. } => {
                format!("[{}] New message: {}", reference, subject)
            }
            Notification::PaymentSucceeded { reference, .. } => {
                format!("[{}] Payment received", reference)
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::NewLead { name, email, .. } => {
                format!("{} <{}> completed the request form.", name, email)
            }
            Notification::NewMessage { author, subject, .. } => {
                format!("{} posted \"{}\".", author, subject)
            }
            Notification::PaymentSucceeded { amount_cents, .. } => {
                format!(
                    "Payment of {}.{:02} EUR confirmed.",
                    amount_cents / 100,
                    amount_cents % 100
                )
            }
        }
    }
}

/// Best-effort team alerts.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> AppResult<()>;
}

/// Hands a rendered outbound email to the mail transport.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OutboundMailer: Send + Sync {
    async fn enqueue(&self, job: EmailDeliveryJob) -> AppResult<()>;
}

/// Job queue backed by apalis PostgreSQL storage.
#[derive(Clone)]
pub struct JobQueue {
    notifications: PostgresStorage<NotificationJob>,
    emails: PostgresStorage<EmailDeliveryJob>,
}

impl JobQueue {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AppError::internal(format!("Failed to connect job queue: {}", e)))?;

        PostgresStorage::setup(&pool)
            .await
            .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

        Ok(Self {
            notifications: PostgresStorage::new(pool.clone()),
            emails: PostgresStorage::new(pool),
        })
    }

    pub fn notification_storage(&self) -> PostgresStorage<NotificationJob> {
        self.notifications.clone()
    }

    pub fn email_storage(&self) -> PostgresStorage<EmailDeliveryJob> {
        self.emails.clone()
    }
}

#[async_trait]
impl Notifier for JobQueue {
    async fn dispatch(&self, notification: Notification) -> AppResult<()> {
        let mut storage = self.notifications.clone();
        storage
            .push(NotificationJob { notification })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to enqueue notification");
                AppError::upstream("Notification queue")
            })?;
        Ok(())
    }
}

#[async_trait]
impl OutboundMailer for JobQueue {
    async fn enqueue(&self, job: EmailDeliveryJob) -> AppResult<()> {
        let email_id = job.email_id;
        let mut storage = self.emails.clone();
        storage.push(job).await.map_err(|e| {
            tracing::warn!(%email_id, error = %e, "Failed to enqueue email");
            AppError::upstream("Mail queue")
        })?;
        Ok(())
    }
}

/// Logs instead of queueing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOutbox;

#[async_trait]
impl Notifier for LogOutbox {
    async fn dispatch(&self, notification: Notification) -> AppResult<()> {
        tracing::info!(
            lead_id = %notification.lead_id(),
            subject = %notification.subject(),
            "Notification (not queued)"
        );
        Ok(())
    }
}

#[async_trait]
impl OutboundMailer for LogOutbox {
    async fn enqueue(&self, job: EmailDeliveryJob) -> AppResult<()> {
        tracing::info!(
            email_id = %job.email_id,
            to = %job.to,
            subject = %job.subject,
            "Outbound email (not queued)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_body_formats_cents() {
        let notification = Notification::PaymentSucceeded {
            lead_id: Uuid::nil(),
            reference: "RAC-00000000".to_string(),
            amount_cents: 12900,
        };

        assert_eq!(notification.body(), "Payment of 129.00 EUR confirmed.");
        assert_eq!(notification.subject(), "[RAC-00000000] Payment received");
    }
}
