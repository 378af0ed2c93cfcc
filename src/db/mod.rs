//! SQLite hash database
//!
//! Backs `keep_hashes_db` mode: the whole hash index lives in one SQLite
//! file. Saves replace the table contents inside a single transaction, so a
//! crash mid-save leaves the previous index intact.

use crate::dedup::HashStore;
use crate::error::{DatabaseError, PersistenceError};
use crate::types::ContentHash;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current schema version
const SCHEMA_VERSION: i64 = 1;

/// Database handle for the hash index
pub struct HashDatabase {
    pool: SqlitePool,
}

impl HashDatabase {
    /// Open (or create) the hash database at `path`
    ///
    /// Creates the parent directory and the schema if they don't exist.
    pub async fn new(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                ))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!("Failed to parse database path: {}", e))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to connect to database: {}", e))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to acquire connection: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            ))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to query schema version: {}", e))
                })?
                .flatten();

        if current_version.unwrap_or(0) < SCHEMA_VERSION {
            Self::migrate_v1(&mut conn).await?;
        }
        Ok(())
    }

    /// Migration v1: content hash table
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<(), DatabaseError> {
        tracing::info!("Applying hash database migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_hashes (
                hash TEXT PRIMARY KEY NOT NULL,
                path TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            DatabaseError::MigrationFailed(format!("Failed to create content_hashes table: {}", e))
        })?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(SCHEMA_VERSION)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                DatabaseError::MigrationFailed(format!("Failed to record migration: {}", e))
            })?;

        Ok(())
    }

    /// All stored hash entries
    pub async fn all_hashes(&self) -> Result<Vec<(ContentHash, PathBuf)>, DatabaseError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT hash, path FROM content_hashes ORDER BY hash")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to load content hashes: {}", e))
                })?;

        Ok(rows
            .into_iter()
            .map(|(hash, path)| (ContentHash(hash), PathBuf::from(path)))
            .collect())
    }

    /// Look up the canonical path for a hash
    pub async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<PathBuf>, DatabaseError> {
        let path: Option<String> =
            sqlx::query_scalar("SELECT path FROM content_hashes WHERE hash = ?")
                .bind(hash.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to find content hash: {}", e))
                })?;
        Ok(path.map(PathBuf::from))
    }

    /// Replace the stored index with `entries` in one transaction
    pub async fn replace_all(
        &self,
        entries: &BTreeMap<ContentHash, PathBuf>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DatabaseError::QueryFailed(format!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM content_hashes")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::QueryFailed(format!("Failed to clear content hashes: {}", e))
            })?;

        for (hash, path) in entries {
            sqlx::query("INSERT INTO content_hashes (hash, path) VALUES (?, ?)")
                .bind(hash.as_str())
                .bind(path.to_string_lossy().into_owned())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to insert content hash: {}", e))
                })?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().await.map_err(|e| {
            DatabaseError::QueryFailed(format!("Failed to commit content hashes: {}", e))
        })?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HashStore for HashDatabase {
    fn name(&self) -> &str {
        "hash database"
    }

    async fn load(&self) -> Result<Vec<(ContentHash, PathBuf)>, PersistenceError> {
        Ok(self.all_hashes().await?)
    }

    async fn save(
        &self,
        entries: &BTreeMap<ContentHash, PathBuf>,
    ) -> Result<(), PersistenceError> {
        self.replace_all(entries).await?;
        Ok(())
    }
}
