//! Ordered, idempotent schema migrations.
//!
//! A migration unit is a stable name plus a [`MigrationSource`] that yields
//! its statement batch. Units are applied in declaration order, each at most
//! once, tracked in `migration_history`. A unit counts as applied iff its
//! name has a history row.
//!
//! ```text
//! MigrationRunner::run
//!   ├─ ensure migration_history
//!   └─ for unit in declared order
//!        ├─ has history row  → AlreadyApplied
//!        ├─ source missing   → SkippedMissing (no row, retried next run)
//!        └─ batch + row in one transaction → Applied
//!                 └─ error → rollback, stop the run
//! ```
//!
//! Two instances racing on first deploy may both try the same unit; the
//! loser trips the unique key on `migration_name` and reports a failure.
//! There is no advisory lock.

mod source;

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{Database, StoreConnection};
use crate::error::ServerError;

pub use source::{FileSource, InlineSource, MigrationSource};

/// Declared migration units, in application order.
pub const DEFAULT_MIGRATIONS: &[&str] = &[
    "20240509080137_add_model_table",
    "20240625114706_rename_applications_to_deployments",
    "20240702085925_add_fly_io_name_and_repo_name_to_json_str_column",
    "20240712121422_add_auth_token_table",
    "20240910072037_make_json_str_name_unique_per_user",
];

/// A named statement batch.
#[derive(Clone)]
pub struct MigrationUnit {
    pub name: String,
    source: Arc<dyn MigrationSource>,
}

impl MigrationUnit {
    pub fn new(name: impl Into<String>, source: impl MigrationSource + 'static) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    pub fn file(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(name, FileSource::new(path))
    }

    pub fn inline(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(name, InlineSource::new(sql))
    }
}

impl std::fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("name", &self.name)
            .field("source", &self.source.describe())
            .finish()
    }
}

/// The declared units, loaded from `dir`.
///
/// Names keep the `migrations/<id>/migration.sql` form whatever `dir` is,
/// so history rows stay valid when the directory moves.
pub fn default_units(dir: &Path) -> Vec<MigrationUnit> {
    DEFAULT_MIGRATIONS
        .iter()
        .map(|id| {
            MigrationUnit::file(
                format!("migrations/{}/migration.sql", id),
                dir.join(id).join("migration.sql"),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Applied,
    AlreadyApplied,
    SkippedMissing,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    /// `None` when the run failed before reaching any unit.
    pub unit: Option<String>,
    pub message: String,
}

/// What one run did, unit by unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub outcomes: Vec<UnitReport>,
    pub failure: Option<MigrationFailure>,
}

impl MigrationReport {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn count(&self, outcome: UnitOutcome) -> usize {
        self.outcomes.iter().filter(|u| u.outcome == outcome).count()
    }

    fn push(&mut self, name: &str, outcome: UnitOutcome) {
        self.outcomes.push(UnitReport {
            name: name.to_string(),
            outcome,
        });
    }
}

/// Applied/pending state of one declared unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<NaiveDateTime>,
}

pub struct MigrationRunner {
    units: Vec<MigrationUnit>,
    strict: bool,
}

impl MigrationRunner {
    pub fn new(units: Vec<MigrationUnit>) -> Self {
        Self { units, strict: false }
    }

    /// Runner over the declared units in `dir`.
    pub fn with_defaults(dir: &Path) -> Self {
        Self::new(default_units(dir))
    }

    /// Treat a missing source as a failure instead of skipping it.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Apply every pending unit. Never fails; see [`MigrationReport::success`].
    pub async fn run(&self, db: &Database) -> MigrationReport {
        let mut report = MigrationReport::default();
        let result = match db.connect().await {
            Ok(mut conn) => {
                let result = self.apply_all(conn.as_mut(), &mut report).await;
                conn.close().await;
                result
            }
            Err(e) => Err(MigrationFailure {
                unit: None,
                message: e.to_string(),
            }),
        };
        self.finish(report, result)
    }

    /// Same as [`MigrationRunner::run`], over the sync access path.
    pub fn run_blocking(&self, db: &Database) -> MigrationReport {
        let outcome = Database::block_on(async {
            let mut report = MigrationReport::default();
            let result = match db.connect_sync_path().await {
                Ok(mut conn) => {
                    let result = self.apply_all(conn.as_mut(), &mut report).await;
                    conn.close().await;
                    result
                }
                Err(e) => Err(MigrationFailure {
                    unit: None,
                    message: e.to_string(),
                }),
            };
            (report, result)
        });

        match outcome {
            Ok((report, result)) => self.finish(report, result),
            Err(e) => self.finish(
                MigrationReport::default(),
                Err(MigrationFailure {
                    unit: None,
                    message: e.to_string(),
                }),
            ),
        }
    }

    /// Applied/pending state of every declared unit.
    pub async fn status(&self, db: &Database) -> Result<Vec<UnitStatus>, ServerError> {
        let mut conn = db.connect().await?;
        let applied = async {
            conn.ensure_history_table().await?;
            conn.applied().await
        }
        .await;
        conn.close().await;
        let applied = applied?;

        Ok(self
            .units
            .iter()
            .map(|unit| {
                let row = applied.iter().find(|a| a.name == unit.name);
                UnitStatus {
                    name: unit.name.clone(),
                    applied: row.is_some(),
                    applied_at: row.and_then(|a| a.applied_at),
                }
            })
            .collect())
    }

    async fn apply_all(
        &self,
        conn: &mut dyn StoreConnection,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationFailure> {
        conn.ensure_history_table().await.map_err(|e| MigrationFailure {
            unit: None,
            message: format!("Failed to prepare migration_history: {}", e),
        })?;

        for unit in &self.units {
            self.apply_unit(conn, unit, report)
                .await
                .map_err(|e| MigrationFailure {
                    unit: Some(unit.name.clone()),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn apply_unit(
        &self,
        conn: &mut dyn StoreConnection,
        unit: &MigrationUnit,
        report: &mut MigrationReport,
    ) -> Result<(), ServerError> {
        if conn.is_applied(&unit.name).await? {
            tracing::info!("[Migrations] {} already applied", unit.name);
            report.push(&unit.name, UnitOutcome::AlreadyApplied);
            return Ok(());
        }

        let Some(sql) = unit.source.read()? else {
            if self.strict {
                return Err(ServerError::NotFound(format!(
                    "migration source {} does not exist",
                    unit.source.describe()
                )));
            }
            tracing::warn!(
                "[Migrations] {} skipped: source {} does not exist",
                unit.name,
                unit.source.describe()
            );
            report.push(&unit.name, UnitOutcome::SkippedMissing);
            return Ok(());
        };

        if let Err(e) = conn.apply(&unit.name, &sql).await {
            tracing::error!("[Migrations] {} failed, rolled back: {}", unit.name, e);
            return Err(e);
        }
        tracing::info!("[Migrations] {} applied", unit.name);
        report.push(&unit.name, UnitOutcome::Applied);
        Ok(())
    }

    fn finish(
        &self,
        mut report: MigrationReport,
        result: Result<(), MigrationFailure>,
    ) -> MigrationReport {
        match result {
            Ok(()) => {
                tracing::info!(
                    "[Migrations] Completed: {} applied, {} already applied, {} skipped",
                    report.count(UnitOutcome::Applied),
                    report.count(UnitOutcome::AlreadyApplied),
                    report.count(UnitOutcome::SkippedMissing),
                );
            }
            Err(failure) => {
                tracing::error!("[Migrations] Migration run failed: {}", failure.message);
                report.failure = Some(failure);
            }
        }
        report
    }
}
