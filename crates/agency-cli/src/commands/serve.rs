//! `agency serve` — deployment entrypoint.
//!
//! Checks required variables, prepares the database (connection check + migrations,
//! both non-fatal), then serves HTTP until interrupted.

use std::sync::Arc;

use agency_core::config::{missing_required, Settings};
use agency_core::llm::OpenAiChatModel;
use agency_core::migrations::{MigrationRunner, UnitOutcome};
use agency_core::state::AppStateInner;
use agency_core::Database;

pub async fn run(host: String, port: Option<u16>, skip_migrations: bool) -> Result<(), String> {
    let missing = missing_required(|key| std::env::var(key).ok());
    if !missing.is_empty() {
        for key in &missing {
            tracing::error!("Missing required environment variable: {}", key);
        }
        return Err(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        ));
    }

    let mut settings = super::load_settings()?;
    if let Some(port) = port {
        settings.port = port;
    }
    log_settings(&settings);

    let db = Database::new(&settings.database).map_err(|e| e.to_string())?;
    let migrations = super::migration_runner(&settings);
    if skip_migrations {
        tracing::info!("Skipping database setup (--skip-migrations)");
    } else {
        prepare_database(&db, &migrations);
    }

    let model = Arc::new(OpenAiChatModel::new(settings.llm.clone()));
    let config = agency_server::ServerConfig {
        host: host.clone(),
        port: settings.port,
    };
    let state = Arc::new(AppStateInner::with_database(settings, db, model));

    println!("Starting agency server on {}:{}...", host, config.port);

    let addr = agency_server::start_server_with_state(config, state).await?;
    println!("Agency server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}

fn log_settings(settings: &Settings) {
    tracing::info!("Configuration:");
    tracing::info!("  OpenAI model: {}", settings.llm.model);
    tracing::info!(
        "  OpenAI base URL: {}",
        settings.llm.base_url.as_deref().unwrap_or("default")
    );
    tracing::info!("  Temperature: {}", settings.llm.temperature);
    tracing::info!("  Port: {}", settings.port);
    tracing::info!("  Web UI: {}", settings.web_ui_enabled);
    tracing::info!(
        "  Database: {}",
        if settings.database.provider_supplied {
            "configured"
        } else {
            "not configured (using DB_* fields)"
        }
    );
}

/// Sync connection check then sync migrations. Failures are logged, never returned.
fn prepare_database(db: &Database, migrations: &MigrationRunner) {
    if !db.check_connection() {
        tracing::warn!("Database connection failed, continuing startup");
        return;
    }

    let report = migrations.run_blocking(db);
    match &report.failure {
        None => tracing::info!(
            "Database ready ({} migration(s) applied)",
            report.count(UnitOutcome::Applied)
        ),
        Some(failure) => tracing::warn!(
            "Database migrations failed, continuing startup: {}",
            failure.message
        ),
    }
}
