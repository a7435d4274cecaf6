//! Combined binary for development - gateway and job worker in one process.

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_lib::config::GatewayConfig;
use lead_service_lib::config::LeadServiceConfig;
use lead_service_lib::jobs::{worker_monitor, NotifyTargets};

#[derive(Parser)]
#[command(name = "lead-desk")]
#[command(about = "Lead desk in a single process for development")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway and, unless in memory, the job worker
    Serve {
        #[arg(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "GATEWAY_PORT", default_value = "3000")]
        port: u16,
        /// Keep everything in memory (no PostgreSQL, no Redis, no worker)
        #[arg(long)]
        in_memory: bool,
        /// Create a superadmin with this email if it does not exist
        #[arg(long, env = "BOOTSTRAP_ADMIN_EMAIL")]
        bootstrap_admin: Option<String>,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            in_memory,
            bootstrap_admin,
        } => {
            let lead_config = LeadServiceConfig::from_env();
            let embedded = gateway_lib::embed_services(&lead_config, in_memory).await?;

            if let Some(email) = bootstrap_admin.as_deref() {
                lead_service_lib::bootstrap_superadmin(&embedded.stores, email).await?;
            }

            let state = gateway_lib::app_state(&embedded, GatewayConfig::from_env()).await?;

            info!("Starting lead desk in development mode");
            info!("  Gateway: http://{}:{}", host, port);
            info!("  Storage: {}", if in_memory { "in memory" } else { "PostgreSQL" });

            let gateway_handle = tokio::spawn(async move {
                if let Err(e) = gateway_lib::serve(&host, port, state).await {
                    error!("Gateway failed: {}", e);
                }
            });

            match embedded.queue {
                Some(queue) => {
                    let monitor = worker_monitor(
                        &queue,
                        embedded.stores.emails.clone(),
                        NotifyTargets::from_config(&lead_config)?,
                    );
                    let worker_handle = tokio::spawn(async move {
                        if let Err(e) = monitor.run().await {
                            error!("Job worker failed: {}", e);
                        }
                    });
                    info!("  Worker:  notification and email jobs");

                    // Either task ending means the process should stop
                    tokio::select! {
                        _ = gateway_handle => {
                            info!("Gateway stopped");
                        }
                        _ = worker_handle => {
                            error!("Job worker exited unexpectedly");
                        }
                    }
                }
                None => {
                    gateway_handle.await?;
                    info!("Gateway stopped");
                }
            }
        }
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateAction::Up => lead_service_lib::MigrateAction::Up,
                MigrateAction::Down => lead_service_lib::MigrateAction::Down,
                MigrateAction::Status => lead_service_lib::MigrateAction::Status,
                MigrateAction::Fresh => lead_service_lib::MigrateAction::Fresh,
            };
            lead_service_lib::run_migrations(migrate_action).await?;
        }
    }

    Ok(())
}
