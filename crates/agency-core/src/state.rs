//! Shared application state for the axum server.

use std::sync::Arc;

use crate::config::Settings;
use crate::db::Database;
use crate::error::ServerError;
use crate::llm::ChatModel;
use crate::migrations::MigrationRunner;
use crate::workflow::{WorkflowRegistry, WorkflowRunner};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub settings: Settings,
    pub db: Database,
    pub workflows: WorkflowRegistry,
    pub runner: WorkflowRunner,
    pub migrations: MigrationRunner,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(settings: Settings, model: Arc<dyn ChatModel>) -> Result<Self, ServerError> {
        let db = Database::new(&settings.database)?;
        Ok(Self::with_database(settings, db, model))
    }

    /// State over an already-built [`Database`] handle.
    pub fn with_database(settings: Settings, db: Database, model: Arc<dyn ChatModel>) -> Self {
        let migrations =
            MigrationRunner::with_defaults(&settings.migrations_dir).strict(settings.migrations_strict);
        Self {
            runner: WorkflowRunner::new(model, settings.workflow_workers),
            workflows: WorkflowRegistry::builtin(),
            migrations,
            db,
            settings,
        }
    }
}
