//! Job worker and queue maintenance.
//!
//! - `work`: process notification and email jobs until Ctrl+C
//! - `list`: job counts per status
//! - `clear`: remove failed jobs

use std::sync::Arc;

use apalis::prelude::*;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use common::{AppError, AppResult};

use super::{email_delivery_handler, notification_handler, NotifyTargets};
use crate::config::LeadServiceConfig;
use crate::infra::{Database, JobQueue};
use crate::repository::{CommunicationStore, EmailRepository};

/// Both workers registered on one monitor.
pub fn worker_monitor(
    queue: &JobQueue,
    emails: Arc<dyn EmailRepository>,
    targets: NotifyTargets,
) -> Monitor {
    let notifications = WorkerBuilder::new("notification-worker")
        .data(targets)
        .backend(queue.notification_storage())
        .build_fn(notification_handler);

    let deliveries = WorkerBuilder::new("email-worker")
        .data(emails)
        .backend(queue.email_storage())
        .build_fn(email_delivery_handler);

    Monitor::new().register(notifications).register(deliveries)
}

/// Start the background job worker
pub async fn run_worker(config: &LeadServiceConfig) -> AppResult<()> {
    tracing::info!("Connecting to database for job worker...");

    let db = Database::connect_without_migrations(&config.database).await?;
    let queue = JobQueue::connect(config.database_url()).await?;
    let emails: Arc<dyn EmailRepository> = Arc::new(CommunicationStore::new(db.get_connection()));
    let monitor = worker_monitor(&queue, emails, NotifyTargets::from_config(config)?);

    tracing::info!("Job worker started. Press Ctrl+C to stop.");

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Job worker stopped.");
    Ok(())
}

async fn queue_initialized(db: &DatabaseConnection) -> AppResult<bool> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') as exists".to_string(),
        ))
        .await?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}

/// Print job counts per type and status
pub async fn list_jobs(config: &LeadServiceConfig) -> AppResult<()> {
    let db = Database::connect_without_migrations(&config.database).await?;
    let db = db.connection();

    if !queue_initialized(db).await? {
        println!("Job queue not initialized. Run 'jobs work' first to create the queue tables.");
        return Ok(());
    }

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT job_type, status::text as status, COUNT(*)::bigint as count \
             FROM apalis.jobs GROUP BY job_type, status ORDER BY job_type, status"
                .to_string(),
        ))
        .await?;

    println!("\n=== Job Queue Status ===");
    if rows.is_empty() {
        println!("No jobs.");
    }
    for row in rows {
        if let (Ok(job_type), Ok(status), Ok(count)) = (
            row.try_get::<String>("", "job_type"),
            row.try_get::<String>("", "status"),
            row.try_get::<i64>("", "count"),
        ) {
            let short = job_type.rsplit("::").next().unwrap_or(&job_type);
            println!("{:<20} {:<8} {}", short, status, count);
        }
    }
    println!("========================\n");

    Ok(())
}

/// Delete failed jobs
pub async fn clear_failed_jobs(config: &LeadServiceConfig) -> AppResult<()> {
    let db = Database::connect_without_migrations(&config.database).await?;
    let db = db.connection();

    if !queue_initialized(db).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = db
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status = 'Failed'".to_string(),
        ))
        .await?;

    println!("Cleared {} failed job(s) from the queue.", result.rows_affected());
    Ok(())
}
