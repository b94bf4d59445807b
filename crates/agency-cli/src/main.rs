//! Agency CLI — deployment entrypoint and operator tools.
//!
//! Reuses the same core domain logic (agency-core) and server bootstrap
//! (agency-server) that the deployed service runs.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use agency_cli::smoke;

/// Agency CLI — multi-agent chat service deployment harness
#[derive(Parser)]
#[command(name = "agency", version, about = "Agency CLI — multi-agent chat service deployment harness")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the environment, prepare the database and start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on (defaults to 8000)
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Skip the startup connection check and migrations
        #[arg(long)]
        skip_migrations: bool,
    },

    /// Apply pending database migrations
    Migrate {
        /// Only list applied and pending migrations
        #[arg(long)]
        status: bool,
    },

    /// Check database connectivity on both access paths
    DbStatus,

    /// Print the public configuration as JSON
    Config,

    /// Run the smoke checks against a deployment
    SmokeTest {
        /// Base URL of the deployment
        #[arg(env = "TEST_BASE_URL", default_value = smoke::DEFAULT_BASE_URL)]
        base_url: String,
        /// Where to write the JSON report
        #[arg(long, default_value = smoke::DEFAULT_REPORT_PATH)]
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Variables already in the environment win over both files
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agency=info,agency_core=info,agency_server=info,agency_cli=info,tower_http=info".into()
            }),
        )
        .init();

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            skip_migrations,
        } => commands::serve::run(host, port, skip_migrations).await,
        Commands::Migrate { status } => commands::migrate::run(status).await,
        Commands::DbStatus => commands::db::status().await,
        Commands::Config => commands::config::run(),
        Commands::SmokeTest { base_url, report } => smoke::run(&base_url, &report).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
