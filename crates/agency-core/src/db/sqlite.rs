//! SQLite connections via rusqlite.
//!
//! rusqlite is synchronous, so every call is executed via
//! `tokio::task::spawn_blocking` to avoid blocking the async runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags};

use super::{echo_statement, AppliedMigration, SqliteLocation, StoreConnection};
use crate::error::ServerError;

const CREATE_HISTORY: &str = "
    CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        migration_name VARCHAR(255) UNIQUE NOT NULL,
        applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

/// Thread-safe handle to one SQLite connection.
#[derive(Clone)]
pub struct SqliteStoreConnection {
    conn: Arc<Mutex<Connection>>,
    echo: bool,
}

impl std::fmt::Debug for SqliteStoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStoreConnection")
            .field("echo", &self.echo)
            .finish_non_exhaustive()
    }
}

impl SqliteStoreConnection {
    /// Open the database at `location`. With `create`, a missing file (and
    /// its parent directories) is created; without it, opening fails.
    pub async fn open(location: SqliteLocation, echo: bool, create: bool) -> Result<Self, ServerError> {
        let conn = tokio::task::spawn_blocking(move || open_blocking(&location, create))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))??;

        Ok(Self::from_connection(conn, echo))
    }

    /// A private in-memory database. Clones share it, so it lives as long
    /// as any handle does.
    pub fn open_in_memory(echo: bool) -> Result<Self, ServerError> {
        let conn = open_blocking(&SqliteLocation::Memory, true)?;
        Ok(Self::from_connection(conn, echo))
    }

    fn from_connection(conn: Connection, echo: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            echo,
        }
    }

    pub(super) fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Execute a closure with access to the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServerError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServerError::Database(e.to_string()))
    }

    /// Execute a closure with access to the connection (async-friendly).
    async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.with_conn(f))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))?
    }
}

fn open_blocking(location: &SqliteLocation, create: bool) -> Result<Connection, ServerError> {
    let conn = match location {
        SqliteLocation::Memory => Connection::open_in_memory(),
        SqliteLocation::File(path) if create => {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ServerError::Database(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            Connection::open(path)
        }
        SqliteLocation::File(path) => Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        ),
    }
    .map_err(|e| ServerError::Database(format!("Failed to open database: {}", e)))?;

    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;
    Ok(conn)
}

#[async_trait]
impl StoreConnection for SqliteStoreConnection {
    async fn ping(&mut self) -> Result<(), ServerError> {
        echo_statement(self.echo, "SELECT 1");
        self.with_conn_async(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }

    async fn ensure_history_table(&mut self) -> Result<(), ServerError> {
        echo_statement(self.echo, CREATE_HISTORY);
        self.with_conn_async(|conn| conn.execute_batch(CREATE_HISTORY)).await
    }

    async fn is_applied(&mut self, name: &str) -> Result<bool, ServerError> {
        let sql = "SELECT COUNT(*) FROM migration_history WHERE migration_name = ?1";
        echo_statement(self.echo, sql);
        let name = name.to_string();
        let count: i64 = self
            .with_conn_async(move |conn| conn.query_row(sql, rusqlite::params![name], |row| row.get(0)))
            .await?;
        Ok(count > 0)
    }

    async fn apply(&mut self, name: &str, sql: &str) -> Result<(), ServerError> {
        let insert = "INSERT INTO migration_history (migration_name) VALUES (?1)";
        echo_statement(self.echo, sql);
        echo_statement(self.echo, insert);
        let name = name.to_string();
        let sql = sql.to_string();
        self.with_conn_async(move |conn| {
            // Dropping the transaction without commit rolls it back.
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(&sql)?;
            tx.execute(insert, rusqlite::params![name])?;
            tx.commit()
        })
        .await
    }

    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, ServerError> {
        let sql = "SELECT migration_name, applied_at FROM migration_history ORDER BY id";
        echo_statement(self.echo, sql);
        self.with_conn_async(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([], |row| {
                    let applied_at: Option<String> = row.get(1)?;
                    Ok(AppliedMigration {
                        name: row.get(0)?,
                        applied_at: applied_at.and_then(|raw| {
                            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").ok()
                        }),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn close(self: Box<Self>) {
        // The connection is released once the last handle drops.
    }
}
