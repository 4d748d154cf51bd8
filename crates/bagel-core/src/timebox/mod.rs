//! Bookmark ("timebox") storage contract.
//!
//! A bookmark is one timestamp per `(source system, table)`: everything up to
//! and including that instant has been durably written. The engine reads it
//! when a table run starts and advances it after each window.
//!
//! Backends implement two levels:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`TimeboxStore`] | Long-lived handle built from configuration; opens connections |
//! | [`TimeboxClient`] | One open connection, scoped to a single table run |
//!
//! A client only exists once connected, so an unconnected client cannot be
//! used. Backends provide raw string reads and upserts; bookmark parsing,
//! the first-use default, and the timebox itself are shared provided
//! methods so every backend behaves identically.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use crate::error::BagelError;
use crate::naming::{format_bookmark, parse_bookmark};

/// Lookback applied when a table has no bookmark and no initial timestamp.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 3;

/// A persisted bookmark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeboxEntry {
    pub system: String,
    pub table: String,
    /// Bookmark in `%Y-%m-%dT%H:%M:%S.%fZ` form.
    pub last_updated_timestamp: String,
}

impl TimeboxEntry {
    pub fn new(system: &str, table: &str, ts: &DateTime<Utc>) -> Self {
        Self {
            system: system.to_string(),
            table: table.to_string(),
            last_updated_timestamp: format_bookmark(ts),
        }
    }
}

/// Wall-clock time at the precision bookmarks are persisted with.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A configured bookmark backend.
#[async_trait]
pub trait TimeboxStore: Send + Sync {
    /// Backend name for logs (`"sqlite"`, `"memory"`, ...).
    fn backend(&self) -> &str;

    /// Open a connection for one table run.
    async fn connect(&self) -> Result<Box<dyn TimeboxClient>>;
}

/// An open bookmark connection.
#[async_trait]
pub trait TimeboxClient: Send + Sync {
    /// Read the raw persisted bookmark, if any.
    async fn read_timestamp(&self, system: &str, table: &str) -> Result<Option<String>>;

    /// Insert or overwrite a bookmark.
    async fn upsert_timestamp(&self, entry: &TimeboxEntry) -> Result<()>;

    /// Release the connection. The client must not be used afterwards.
    async fn close(&self) -> Result<()>;

    /// The "now" used for timeboxes, truncated to microseconds.
    fn current_timestamp(&self) -> DateTime<Utc> {
        now_micros()
    }

    /// Last processed timestamp for `(system, table)`.
    ///
    /// On first use the bookmark is created from `initial` (or now minus
    /// [`DEFAULT_LOOKBACK_DAYS`]) and persisted immediately, so a retried or
    /// concurrent run sees the same starting point. A persisted value that
    /// does not match the bookmark pattern is a
    /// [`BagelError::CorruptBookmark`].
    async fn get_last_run_timestamp(
        &self,
        system: &str,
        table: &str,
        initial: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        if let Some(value) = self.read_timestamp(system, table).await? {
            return parse_bookmark(&value).ok_or_else(|| {
                BagelError::CorruptBookmark {
                    system: system.to_string(),
                    table: table.to_string(),
                    value,
                }
                .into()
            });
        }

        let start = initial
            .unwrap_or_else(|| self.current_timestamp() - Duration::days(DEFAULT_LOOKBACK_DAYS))
            .trunc_subsecs(6);
        self.write_run_timestamp(system, table, start).await?;
        Ok(start)
    }

    /// Persist a new bookmark and return the row that was written.
    async fn write_run_timestamp(
        &self,
        system: &str,
        table: &str,
        ts: DateTime<Utc>,
    ) -> Result<TimeboxEntry> {
        let entry = TimeboxEntry::new(system, table, &ts);
        self.upsert_timestamp(&entry).await?;
        Ok(entry)
    }

    /// `(last processed, now)` for a table run.
    async fn get_timebox(
        &self,
        system: &str,
        table: &str,
        initial: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let now = self.current_timestamp();
        let last = self.get_last_run_timestamp(system, table, initial).await?;
        Ok((last, now))
    }
}
