//! Fabric catalog storage.
//!
//! A single `fabrics` table accessed through parameterized queries. Schema
//! creation runs through `sqlx::migrate!` plus an idempotent ALTER pass, so
//! connecting to an existing database (including one created before
//! `fabric_type`/`color` existed) is always safe.
//!
//! There is no update operation: catalog edits are delete + recreate.

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::str::FromStr;

/// Default timeout for individual SQLite queries.
/// Prevents a hung query from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FabricRow {
    pub id: i64,
    pub name: String,
    pub image_url: String,
    /// Free-text category, e.g. "Tessuti screen". NULL when never set.
    pub fabric_type: Option<String>,
    /// Free-text color family, e.g. "Bianco". NULL when never set.
    pub color: Option<String>,
    /// RFC 3339, bound at insert, never modified.
    pub created_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_slow_query(database_url, 0).await
    }

    /// Connect with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding
    /// it are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn connect_with_slow_query(database_url: &str, slow_query_ms: u64) -> Result<Self> {
        let mut opts = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database URL: {database_url}"))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;

        // Idempotent column additions (ALTER TABLE IF NOT EXISTS is not
        // supported in SQLite, so we attempt the ALTER and ignore the
        // "duplicate column name" error).
        let alter_stmts = [
            "ALTER TABLE fabrics ADD COLUMN fabric_type TEXT",
            "ALTER TABLE fabrics ADD COLUMN color TEXT",
        ];
        for stmt in alter_stmts {
            let result = sqlx::query(stmt).execute(pool).await;
            if let Err(e) = result {
                let msg = e.to_string();
                if !msg.contains("duplicate column") {
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    // ─── Fabrics ────────────────────────────────────────────────────────────

    /// Insert a fabric and return the stored row (with generated id and
    /// timestamp). `name` and `image_url` are required; empty optional
    /// fields are stored as NULL.
    pub async fn create_fabric(
        &self,
        name: &str,
        image_url: &str,
        fabric_type: Option<&str>,
        color: Option<&str>,
    ) -> Result<FabricRow> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO fabrics (name, image_url, fabric_type, color, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(image_url)
        .bind(fabric_type.filter(|s| !s.is_empty()))
        .bind(color.filter(|s| !s.is_empty()))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_fabric(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("fabric not found after insert"))
    }

    pub async fn get_fabric(&self, id: i64) -> Result<Option<FabricRow>> {
        Ok(sqlx::query_as("SELECT * FROM fabrics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All fabrics, newest first. Ties on `created_at` are broken by id so
    /// the ordering is stable.
    pub async fn list_fabrics(&self) -> Result<Vec<FabricRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM fabrics ORDER BY created_at DESC, id DESC")
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    pub async fn count_fabrics(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fabrics")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    /// Delete by id. Succeeds whether or not a row matched — the caller
    /// cannot distinguish "deleted" from "was never there".
    pub async fn delete_fabric(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM fabrics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
