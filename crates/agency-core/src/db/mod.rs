//! Store access for the relational database.
//!
//! Postgres (via sqlx) is the deployment target; SQLite (via rusqlite) backs
//! local runs and tests. There is no pooling: every connection check or migration run
//! opens its own [`StoreConnection`] and closes it when done, which keeps the
//! footprint inside the provider's connection cap. The one exception is an
//! in-memory SQLite store, which only exists while a connection to it is open.
//!
//! Each operation comes in an async flavour and a `_blocking` flavour. The
//! blocking one drives the same future on a private current-thread runtime
//! on a scoped helper thread, so it can be called from plain threads as well
//! as from inside async handlers (it then blocks that worker for the length
//! of the round-trip).

mod postgres;
mod sqlite;

use std::future::Future;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::DatabaseConfig;
use crate::error::ServerError;

pub use self::postgres::PgStoreConnection;
pub use self::sqlite::SqliteStoreConnection;

/// A row of `migration_history`.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: Option<NaiveDateTime>,
}

/// One open connection to the store.
#[async_trait]
pub trait StoreConnection: Send {
    /// Trivial round-trip (`SELECT 1`).
    async fn ping(&mut self) -> Result<(), ServerError>;

    /// Create `migration_history` if it does not exist yet.
    async fn ensure_history_table(&mut self) -> Result<(), ServerError>;

    async fn is_applied(&mut self, name: &str) -> Result<bool, ServerError>;

    /// Execute `sql` as one batch and record `name`, in a single transaction.
    /// Nothing is kept when either step fails.
    async fn apply(&mut self, name: &str, sql: &str) -> Result<(), ServerError>;

    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, ServerError>;

    async fn close(self: Box<Self>);
}

/// Where a connection should go, parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Connection URL in the form sqlx expects (`postgres://…`).
    Postgres(String),
    Sqlite(SqliteLocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    Memory,
    File(PathBuf),
}

impl Target {
    /// Recognises `postgres`, `postgresql`, `postgresql+<driver>` and `sqlite`.
    pub fn parse(url: &str) -> Result<Self, ServerError> {
        if let Some(rest) = url.strip_prefix("sqlite:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(ServerError::Config(format!("SQLite URL '{}' has no path", url)));
            }
            return Ok(if path == ":memory:" {
                Target::Sqlite(SqliteLocation::Memory)
            } else {
                Target::Sqlite(SqliteLocation::File(PathBuf::from(path)))
            });
        }

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ServerError::Config(format!("Database URL '{}' has no scheme", redact(url))))?;
        let base = scheme.split('+').next().unwrap_or(scheme);
        match base {
            "postgres" | "postgresql" => Ok(Target::Postgres(format!("postgres://{}", rest))),
            other => Err(ServerError::Config(format!(
                "Unsupported database scheme '{}'",
                other
            ))),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Target::Postgres(_) => "postgres",
            Target::Sqlite(_) => "sqlite",
        }
    }
}

/// Handle to the store, built once from the resolved [`DatabaseConfig`].
///
/// A `sqlite::memory:` target is opened once here and shared by every
/// connection (and clone) of this handle, so history survives between runs.
#[derive(Debug, Clone)]
pub struct Database {
    sync_target: Target,
    async_target: Target,
    echo: bool,
    memory: Option<SqliteStoreConnection>,
}

impl Database {
    pub fn new(config: &DatabaseConfig) -> Result<Self, ServerError> {
        Self::from_targets(
            Target::parse(&config.url)?,
            Target::parse(&config.async_url)?,
            config.echo,
        )
    }

    /// Handle for a local SQLite file (same target for both paths).
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        let target = Target::Sqlite(SqliteLocation::File(path.into()));
        Self {
            sync_target: target.clone(),
            async_target: target,
            echo: false,
            memory: None,
        }
    }

    fn from_targets(sync_target: Target, async_target: Target, echo: bool) -> Result<Self, ServerError> {
        let is_memory = |t: &Target| *t == Target::Sqlite(SqliteLocation::Memory);
        let memory = if is_memory(&sync_target) || is_memory(&async_target) {
            Some(SqliteStoreConnection::open_in_memory(echo)?)
        } else {
            None
        };
        Ok(Self {
            sync_target,
            async_target,
            echo,
            memory,
        })
    }

    /// Log every statement sent to the store.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        if let Some(memory) = self.memory.as_mut() {
            memory.set_echo(echo);
        }
        self
    }

    pub fn backend(&self) -> &'static str {
        self.async_target.backend()
    }

    /// Open a connection on the async access path.
    pub async fn connect(&self) -> Result<Box<dyn StoreConnection>, ServerError> {
        self.open(&self.async_target, true).await
    }

    /// Open a connection on the sync access path. The returned connection is
    /// meant to be driven through [`Database::block_on`].
    pub async fn connect_sync_path(&self) -> Result<Box<dyn StoreConnection>, ServerError> {
        self.open(&self.sync_target, true).await
    }

    /// Returns whether `SELECT 1` succeeds on the async path. Never fails.
    pub async fn check_connection_async(&self) -> bool {
        match ping(self.open(&self.async_target, false).await).await {
            Ok(()) => {
                tracing::info!("[Probe] Async database connection succeeded ({})", self.backend());
                true
            }
            Err(e) => {
                tracing::error!("[Probe] Async database connection failed: {}", e);
                false
            }
        }
    }

    /// Returns whether `SELECT 1` succeeds on the sync path. Never fails.
    pub fn check_connection(&self) -> bool {
        let outcome = Self::block_on(async { ping(self.open(&self.sync_target, false).await).await })
            .and_then(|r| r);
        match outcome {
            Ok(()) => {
                tracing::info!("[Probe] Database connection succeeded ({})", self.sync_target.backend());
                true
            }
            Err(e) => {
                tracing::error!("[Probe] Database connection failed: {}", e);
                false
            }
        }
    }

    /// Connection checks pass `create = false` so a missing SQLite file stays missing.
    async fn open(&self, target: &Target, create: bool) -> Result<Box<dyn StoreConnection>, ServerError> {
        match target {
            Target::Postgres(url) => Ok(Box::new(PgStoreConnection::connect(url, self.echo).await?)),
            Target::Sqlite(SqliteLocation::Memory) => match &self.memory {
                Some(shared) => Ok(Box::new(shared.clone())),
                None => Ok(Box::new(SqliteStoreConnection::open_in_memory(self.echo)?)),
            },
            Target::Sqlite(location) => Ok(Box::new(
                SqliteStoreConnection::open(location.clone(), self.echo, create).await?,
            )),
        }
    }

    /// Drive `future` to completion on a dedicated current-thread runtime.
    pub fn block_on<F>(future: F) -> Result<F::Output, ServerError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| ServerError::Internal(format!("Failed to build runtime: {}", e)))?;
                    Ok(runtime.block_on(future))
                })
                .join()
                .map_err(|_| ServerError::Internal("Blocking database task panicked".to_string()))?
        })
    }
}

/// Ping on a freshly opened connection, closing it on every exit path.
async fn ping(conn: Result<Box<dyn StoreConnection>, ServerError>) -> Result<(), ServerError> {
    let mut conn = conn?;
    let result = conn.ping().await;
    conn.close().await;
    result
}

/// Statement echo for `DB_ECHO`.
pub(crate) fn echo_statement(enabled: bool, sql: &str) {
    if enabled {
        tracing::info!(target: "agency_core::db::echo", "{}", sql.trim());
    }
}

/// Hide the password part of a URL for log and error messages.
pub fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}
