//! SQLite-backed [`TimeboxStore`].
//!
//! Bookmarks live in one table keyed by `(system, tbl)`:
//!
//! ```text
//! timeboxes
//! ┌────────┬──────────┬─────────────────────────────┬────────────┐
//! │ system │ tbl      │ last_updated_timestamp      │ updated_at │
//! ├────────┼──────────┼─────────────────────────────┼────────────┤
//! │ etq    │ doc_work │ 2022-06-24T09:26:09.548513Z │ 1656062769 │
//! └────────┴──────────┴─────────────────────────────┴────────────┘
//! ```
//!
//! Each [`connect`](TimeboxStore::connect) opens its own pool and applies the
//! schema, so `bagel run` works against a fresh database without `bagel init`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use bagel_core::{TimeboxClient, TimeboxEntry, TimeboxStore};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{db, migrate};

pub struct SqliteTimeboxStore {
    path: PathBuf,
}

impl SqliteTimeboxStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl TimeboxStore for SqliteTimeboxStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn connect(&self) -> Result<Box<dyn TimeboxClient>> {
        let pool = db::connect(&self.path).await?;
        migrate::apply(&pool).await?;
        Ok(Box::new(SqliteTimeboxClient { pool }))
    }
}

pub struct SqliteTimeboxClient {
    pool: SqlitePool,
}

#[async_trait]
impl TimeboxClient for SqliteTimeboxClient {
    async fn read_timestamp(&self, system: &str, table: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT last_updated_timestamp FROM timeboxes WHERE system = ? AND tbl = ?",
        )
        .bind(system)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn upsert_timestamp(&self, entry: &TimeboxEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO timeboxes (system, tbl, last_updated_timestamp, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(system, tbl) DO UPDATE SET
                last_updated_timestamp = excluded.last_updated_timestamp,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.system)
        .bind(&entry.table)
        .bind(&entry.last_updated_timestamp)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
