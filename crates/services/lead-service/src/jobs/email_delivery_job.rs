//! Outbound staff email job.
//!
//! In development mode the email is logged. The provider reports delivery
//! later through the delivery webhook; this job only moves the email from
//! `queued` to `sent`.

use std::sync::Arc;

use apalis::prelude::Data;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::AppError;
use domain::DeliveryStatus;

use crate::repository::EmailRepository;

/// Email delivery job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDeliveryJob {
    /// Row in the email channel
    pub email_id: Uuid,
    pub to: String,
    pub subject: String,
    pub body: String,
}

fn smtp_from() -> String {
    std::env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@example.com".to_string())
}

/// Email delivery job handler
pub async fn email_delivery_handler(
    job: EmailDeliveryJob,
    emails: Data<Arc<dyn EmailRepository>>,
) -> Result<(), AppError> {
    let from = smtp_from();

    tracing::info!(
        email_id = %job.email_id,
        to = %job.to,
        from = %from,
        subject = %job.subject,
        "Processing email delivery job"
    );

    if std::env::var("SMTP_HOST").is_err() {
        tracing::warn!("SMTP not configured - logging email instead of sending");
        tracing::info!(
            "=== EMAIL (not sent) ===\n\
             From: {}\n\
             To: {}\n\
             Subject: {}\n\
             Body:\n{}\n\
             ========================",
            from,
            job.to,
            job.subject,
            job.body
        );
    }

    match emails
        .advance_delivery(job.email_id, DeliveryStatus::Sent, None)
        .await?
    {
        Some(_) => tracing::info!(email_id = %job.email_id, "Email marked as sent"),
        // A provider callback may already have moved it further
        None => tracing::debug!(email_id = %job.email_id, "Email already past sent"),
    }

    Ok(())
}
