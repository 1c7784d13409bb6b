//! Database module for Tavern.
//!
//! This module owns the SQLite connection pool and migration management.
//! Components borrow the pool and take one connection per operation, or one
//! per transaction for multi-row writes.

mod schema;

pub use schema::MIGRATIONS;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::{Result, TavernError};

/// Connection pool type shared by every component.
pub type DbPool = SqlitePool;

/// How long a statement waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Current UNIX timestamp in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Database wrapper for the connection pool and migrations.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool of `size` connections against the database file at `path`.
    ///
    /// The file is created if missing and migrations are applied before the
    /// pool is returned. Any failure here is fatal for startup.
    pub async fn open(path: impl AsRef<Path>, size: u32) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?} with {} connections", path, size);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(size.max(1))
            .acquire_timeout(BUSY_TIMEOUT * 6)
            .connect_with(options)
            .await
            .map_err(|e| TavernError::Database(format!("failed to open pool: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Open an isolated in-memory database.
    ///
    /// Uses a single connection that is never recycled, since every SQLite
    /// in-memory connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Begin a new transaction on a borrowed connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Close the pool, waiting for borrowed connections to be returned.
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        if !self.table_exists("schema_version").await? {
            return Ok(0);
        }

        let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;

        Ok(version)
    }

    /// Apply pending migrations.
    ///
    /// Safe to call on every startup: applied versions are skipped and no
    /// migration drops or rewrites existing data.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.schema_version().await?;
        let migrations = MIGRATIONS;

        if current_version as usize >= migrations.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            migrations.len()
        );

        for (i, migration) in migrations.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;

            sqlx::raw_sql(migration)
                .execute(&mut *tx)
                .await
                .map_err(|e| TavernError::Database(format!("migration v{version} failed: {e}")))?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(now())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            debug!("Migration v{} applied successfully", version);
        }

        info!(
            "Database migration complete (now at version {})",
            migrations.len()
        );
        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if a column exists on a table.
    pub async fn column_exists(&self, table_name: &str, column_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?) WHERE name = ?)",
        )
        .bind(table_name)
        .bind(column_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
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
    async fn test_all_tables_exist() {
        let db = Database::open_in_memory().await.unwrap();
        for table in [
            "schema_version",
            "board",
            "topic",
            "post",
            "account_user",
            "user_session",
            "password_reset_token",
        ] {
            assert!(db.table_exists(table).await.unwrap(), "missing {table}");
        }
    }

    #[tokio::test]
    async fn test_additive_columns_exist() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.column_exists("account_user", "user_status").await.unwrap());
        assert!(db.column_exists("account_user", "user_bio").await.unwrap());
        assert!(!db.column_exists("account_user", "nickname").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(recorded as usize, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().await.unwrap();
        let fk_enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[tokio::test]
    async fn test_indexes_exist() {
        let db = Database::open_in_memory().await.unwrap();
        for index in [
            "idx_board_slug",
            "idx_topic_board_id",
            "idx_post_topic_id",
            "idx_account_user_username_nocase",
            "idx_account_user_email",
            "idx_user_session_token",
            "idx_user_session_expires_at",
            "idx_password_reset_token_token",
        ] {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?",
            )
            .bind(index)
            .fetch_one(db.pool())
            .await
            .unwrap();
            assert_eq!(count, 1, "missing index {index}");
        }
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let db = Database::open_in_memory().await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query(
                "INSERT INTO board (section, slug, title, description, created_at)
                 VALUES ('General', 'lounge', 'Lounge', '', 0)",
            )
            .execute(&mut *tx)
            .await
            .unwrap();
            // Dropped without commit.
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM board")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");

        {
            let db = Database::open(&db_path, 2).await.unwrap();
            assert!(db.table_exists("account_user").await.unwrap());
            db.close().await;
            assert!(db.is_closed());
        }

        // Reopening must not reapply migrations.
        let db = Database::open(&db_path, 2).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("corrupt.db");
        std::fs::write(&db_path, b"this is definitely not an sqlite database file").unwrap();

        assert!(Database::open(&db_path, 1).await.is_err());
    }

    /// Build a database file that stopped at migration `version`.
    async fn create_at_version(path: &Path, version: usize, seed: &str) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for (i, migration) in MIGRATIONS.iter().take(version).enumerate() {
            sqlx::raw_sql(migration).execute(&pool).await.unwrap();
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, 0)")
                .bind((i + 1) as i64)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::raw_sql(seed).execute(&pool).await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_upgrade_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("old.db");
        create_at_version(
            &db_path,
            4,
            "INSERT INTO account_user (username, email, password_salt, password_hash,
                                       password_iterations, thread_count, post_count,
                                       created_at, updated_at)
             VALUES ('nova', 'nova@example.com', x'01', x'02', 2, 3, 7, 10, 20);",
        )
        .await;

        let db = Database::open(&db_path, 2).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());

        let (username, thread_count, post_count, status, bio): (String, i64, i64, String, String) =
            sqlx::query_as(
                "SELECT username, thread_count, post_count, user_status, user_bio
                 FROM account_user",
            )
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(username, "nova");
        assert_eq!((thread_count, post_count), (3, 7));
        assert_eq!(status, "");
        assert_eq!(bio, "");
        db.close().await;
    }

    #[tokio::test]
    async fn test_upgrade_with_case_duplicate_usernames_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("dupes.db");
        create_at_version(
            &db_path,
            5,
            "INSERT INTO account_user (username, email, password_salt, password_hash,
                                       password_iterations, created_at, updated_at)
             VALUES ('nova', 'a@example.com', x'00', x'00', 1, 0, 0),
                    ('Nova', 'b@example.com', x'00', x'00', 1, 0, 0);",
        )
        .await;

        assert!(Database::open(&db_path, 1).await.is_err());

        // The failed migration left the data and the recorded version alone.
        let options = SqliteConnectOptions::new().filename(&db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_user")
            .fetch_one(&pool)
            .await
            .unwrap();
        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(version, 5);
        pool.close().await;
    }
}
