//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reads its
//! settings from the process environment (after dotenv loading).

pub mod config;
pub mod db;
pub mod migrate;
pub mod serve;

use agency_core::config::Settings;
use agency_core::migrations::MigrationRunner;

pub fn load_settings() -> Result<Settings, String> {
    Settings::from_env().map_err(|e| e.to_string())
}

pub fn migration_runner(settings: &Settings) -> MigrationRunner {
    MigrationRunner::with_defaults(&settings.migrations_dir).strict(settings.migrations_strict)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
