//! Postgres connections via sqlx, one physical connection per handle.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Executor, Row};

use super::{echo_statement, AppliedMigration, StoreConnection};
use crate::error::ServerError;

const CREATE_HISTORY: &str = "
    CREATE TABLE IF NOT EXISTS migration_history (
        id SERIAL PRIMARY KEY,
        migration_name VARCHAR(255) UNIQUE NOT NULL,
        applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

pub struct PgStoreConnection {
    conn: PgConnection,
    echo: bool,
}

impl PgStoreConnection {
    pub async fn connect(url: &str, echo: bool) -> Result<Self, ServerError> {
        // Statements are echoed by this module, not by sqlx.
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| ServerError::Config(format!("Invalid Postgres URL: {}", e)))?
            .disable_statement_logging();

        let conn = options
            .connect()
            .await
            .map_err(|e| ServerError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        Ok(Self { conn, echo })
    }
}

#[async_trait]
impl StoreConnection for PgStoreConnection {
    async fn ping(&mut self) -> Result<(), ServerError> {
        echo_statement(self.echo, "SELECT 1");
        sqlx::query("SELECT 1").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn ensure_history_table(&mut self) -> Result<(), ServerError> {
        echo_statement(self.echo, CREATE_HISTORY);
        sqlx::query(CREATE_HISTORY).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn is_applied(&mut self, name: &str) -> Result<bool, ServerError> {
        let sql = "SELECT COUNT(*) FROM migration_history WHERE migration_name = $1";
        echo_statement(self.echo, sql);
        let count: i64 = sqlx::query_scalar(sql)
            .bind(name)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count > 0)
    }

    async fn apply(&mut self, name: &str, sql: &str) -> Result<(), ServerError> {
        let insert = "INSERT INTO migration_history (migration_name) VALUES ($1)";
        // Dropping the transaction without commit rolls it back.
        let mut tx = self.conn.begin().await?;

        echo_statement(self.echo, sql);
        tx.execute(sqlx::raw_sql(sql)).await?;
        echo_statement(self.echo, insert);
        tx.execute(sqlx::query(insert).bind(name)).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, ServerError> {
        let sql = "SELECT migration_name, applied_at FROM migration_history ORDER BY id";
        echo_statement(self.echo, sql);
        let rows = sqlx::query(sql).fetch_all(&mut self.conn).await?;
        rows.iter()
            .map(|row| {
                Ok(AppliedMigration {
                    name: row.try_get("migration_name")?,
                    applied_at: row.try_get::<Option<NaiveDateTime>, _>("applied_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!("Postgres connection close failed: {}", e);
        }
    }
}
