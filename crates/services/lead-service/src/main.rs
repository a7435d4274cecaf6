//! Lead Service - migrations and background jobs.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_service_lib::{JobsAction, MigrateAction};

#[derive(Parser)]
#[command(name = "lead-service")]
#[command(about = "Lead desk persistence and background jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Background job commands
    Jobs {
        #[command(subcommand)]
        action: JobsCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[derive(Subcommand)]
enum JobsCommands {
    /// Start the job worker
    Work,
    /// Show job counts
    List,
    /// Remove failed jobs
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            lead_service_lib::run_migrations(migrate_action).await?;
        }
        Commands::Jobs { action } => {
            let jobs_action = match action {
                JobsCommands::Work => JobsAction::Work,
                JobsCommands::List => JobsAction::List,
                JobsCommands::Clear => JobsAction::Clear,
            };
            lead_service_lib::run_jobs(jobs_action).await?;
        }
    }

    Ok(())
}
