//! Lead Service Library
//!
//! Lead intake funnel, lifecycle, communication thread, search and payments.
//! The HTTP gateway and the combined binary embed it; the standalone binary
//! runs migrations and the job worker.

pub mod config;
pub mod infra;
pub mod jobs;
pub mod repository;
pub mod service;

use tracing::info;

use common::AppResult;
use domain::{normalize_email, Role, StaffAccount};

use crate::config::LeadServiceConfig;
use crate::infra::{Database, JobQueue};
use crate::repository::{InMemoryStore, Stores};
use crate::service::{Adapters, Services};

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Job queue action type.
#[derive(Debug, Clone, Copy)]
pub enum JobsAction {
    Work,
    List,
    Clear,
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> AppResult<()> {
    let config = LeadServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Run a job queue command (for CLI commands).
pub async fn run_jobs(action: JobsAction) -> AppResult<()> {
    let config = LeadServiceConfig::from_env();

    match action {
        JobsAction::Work => jobs::run_worker(&config).await,
        JobsAction::List => jobs::list_jobs(&config).await,
        JobsAction::Clear => jobs::clear_failed_jobs(&config).await,
    }
}

/// Everything a host process needs from the lead service.
pub struct Embedded {
    pub services: Services,
    pub stores: Stores,
    /// `None` in memory mode
    pub database: Option<Database>,
    pub queue: Option<JobQueue>,
}

/// PostgreSQL-backed services with pending migrations applied.
pub async fn embed(config: &LeadServiceConfig) -> AppResult<Embedded> {
    let database = Database::connect(&config.database).await?;
    let queue = JobQueue::connect(config.database_url()).await?;

    let stores = Stores::postgres(database.get_connection());
    let adapters = Adapters::live(config, queue.clone())?;
    let services = Services::build(stores.clone(), adapters, config);

    info!("Lead service ready (PostgreSQL)");
    Ok(Embedded {
        services,
        stores,
        database: Some(database),
        queue: Some(queue),
    })
}

/// Services over the in-memory store, with side channels logged.
pub fn embed_in_memory(config: &LeadServiceConfig, store: InMemoryStore) -> Embedded {
    let stores = Stores::in_memory(store);
    let services = Services::build(stores.clone(), Adapters::offline(config), config);

    info!("Lead service ready (in memory)");
    Embedded {
        services,
        stores,
        database: None,
        queue: None,
    }
}

/// Make sure a superadmin account exists for `email` so a fresh
/// installation can be administered. An existing account is left untouched.
pub async fn bootstrap_superadmin(stores: &Stores, email: &str) -> AppResult<StaffAccount> {
    let email = normalize_email(email)?;
    if let Some(existing) = stores.staff.find_by_email(&email).await? {
        if existing.role != Role::Superadmin || !existing.active {
            tracing::warn!(
                %email,
                role = %existing.role,
                active = existing.active,
                "Bootstrap account exists but is not an active superadmin"
            );
        }
        return Ok(existing);
    }

    let account = stores
        .staff
        .create(StaffAccount::new(email, Role::Superadmin, None))
        .await?;
    info!(email = %account.email, "Bootstrap superadmin created");
    Ok(account)
}
