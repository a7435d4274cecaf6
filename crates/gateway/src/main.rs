//! API Gateway - HTTP REST API of the lead desk.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_lib::config::GatewayConfig;
use gateway_lib::middleware::issue_token;

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Lead desk HTTP gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "GATEWAY_PORT", default_value = "3000")]
        port: u16,
        /// Keep everything in memory (no PostgreSQL, no Redis)
        #[arg(long)]
        in_memory: bool,
        /// Create a superadmin with this email if it does not exist
        #[arg(long, env = "BOOTSTRAP_ADMIN_EMAIL")]
        bootstrap_admin: Option<String>,
    },
    /// Print a signed staff token (development)
    Token {
        #[arg(long)]
        email: String,
        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: i64,
    },
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
        Commands::Serve {
            host,
            port,
            in_memory,
            bootstrap_admin,
        } => {
            gateway_lib::run_server(&host, port, in_memory, bootstrap_admin.as_deref()).await?;
        }
        Commands::Token { email, ttl } => {
            let config = GatewayConfig::from_env();
            println!("{}", issue_token(&config.jwt, &email, ttl)?);
        }
    }

    Ok(())
}
