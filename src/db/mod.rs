//! Database module for the article tracker.
//!
//! This module provides connection pooling and migration management for the
//! durable store behind the article ledger. SQLite is the default backend;
//! PostgreSQL is available through the `postgres` feature.

mod schema;

pub use schema::MIGRATIONS;

use tracing::{debug, info};

use crate::Result;

/// Database driver selected at compile time.
#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;
/// Database driver selected at compile time.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

/// Connection pool type.
pub type DbPool = sqlx::Pool<Db>;

/// Transaction type. Dropping it without `commit` rolls back.
pub type DbTransaction = sqlx::Transaction<'static, Db>;

/// Single connection type, shared by pooled connections and transactions.
pub type DbConnection = <Db as sqlx::Database>::Connection;

/// Database wrapper owning the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to the database at `url` and apply pending migrations.
    ///
    /// For SQLite file databases the parent directory and file are created
    /// if they don't exist.
    #[cfg(feature = "sqlite")]
    pub async fn connect(url: &str) -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
        use std::str::FromStr;
        use std::time::Duration;

        info!("Opening database at {}", url);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool_options = if in_memory {
            // A memory database lives only as long as its connection
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if let Some(parent) = sqlite_file_path(url).and_then(|p| p.parent().map(|p| p.to_path_buf()))
            {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(&parent)?;
                }
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database at `url` and apply pending migrations.
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    pub async fn connect(url: &str) -> Result<Self> {
        use sqlx::postgres::PgPoolOptions;

        info!("Connecting to database");
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database for testing.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        Self::connect("sqlite::memory:").await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        if !self.table_exists("schema_version").await? {
            return Ok(0);
        }

        let version: i64 =
            sqlx::query_scalar("SELECT CAST(COALESCE(MAX(version), 0) AS BIGINT) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     BIGINT PRIMARY KEY,
                applied_at  TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Apply each pending migration in a transaction
        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES ($1, $2)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!("Migration v{} applied successfully", version);
        }

        info!(
            "Database migration complete (now at version {})",
            MIGRATIONS.len()
        );
        Ok(())
    }

    /// Check if a table exists.
    #[cfg(feature = "sqlite")]
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Check if a table exists.
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = $1",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

/// Extract the file path from a `sqlite:` URL, if it names a file.
#[cfg(feature = "sqlite")]
fn sqlite_file_path(url: &str) -> Option<std::path::PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(std::path::PathBuf::from(path))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.schema_version().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_migrations_applied() {
        let db = Database::open_in_memory().await.unwrap();
        let version = db.schema_version().await.unwrap();
        assert_eq!(version as usize, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_tables_exist() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.table_exists("articles").await.unwrap());
        assert!(db.table_exists("daily_stats").await.unwrap());
        assert!(db.table_exists("streak_info").await.unwrap());
        assert!(db.table_exists("schema_version").await.unwrap());
        assert!(!db.table_exists("users").await.unwrap());
    }

    #[tokio::test]
    async fn test_streak_row_seeded() {
        let db = Database::open_in_memory().await.unwrap();
        let (streak, last): (i64, Option<String>) =
            sqlx::query_as("SELECT current_streak, last_publish_date FROM streak_info WHERE id = 1")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(streak, 0);
        assert!(last.is_none());
    }

    #[tokio::test]
    async fn test_open_file_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.db");
        let url = format!("sqlite:{}", path.display());

        {
            let db = Database::connect(&url).await.unwrap();
            assert!(db.table_exists("articles").await.unwrap());
            db.close().await;
        }

        // Reopen: migrations are not reapplied
        let db = Database::connect(&url).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
        db.close().await;
    }

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite:data/tracker.db"),
            Some(std::path::PathBuf::from("data/tracker.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:///var/lib/tracker.db?mode=rwc"),
            Some(std::path::PathBuf::from("/var/lib/tracker.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }
}
