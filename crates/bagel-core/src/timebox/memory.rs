//! In-memory [`TimeboxStore`] for tests and embedding.
//!
//! All clients opened from one store share the same map, so bookmarks
//! survive across table runs for the lifetime of the store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use super::{now_micros, TimeboxClient, TimeboxEntry, TimeboxStore};
use crate::naming::format_bookmark;

#[derive(Default)]
struct Shared {
    entries: HashMap<(String, String), String>,
    writes: Vec<TimeboxEntry>,
    connects: usize,
    closes: usize,
}

/// Bookmarks held in a process-local map.
#[derive(Clone, Default)]
pub struct InMemoryTimeboxStore {
    shared: Arc<RwLock<Shared>>,
    fixed_now: Option<DateTime<Utc>>,
}

impl InMemoryTimeboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin "now" for every client opened from this store.
    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now.trunc_subsecs(6));
        self
    }

    /// Pre-populate a bookmark.
    pub fn seed(&self, system: &str, table: &str, ts: DateTime<Utc>) {
        self.seed_raw(system, table, &format_bookmark(&ts));
    }

    /// Pre-populate a raw (possibly malformed) bookmark value.
    pub fn seed_raw(&self, system: &str, table: &str, value: &str) {
        if let Ok(mut shared) = self.shared.write() {
            shared
                .entries
                .insert((system.to_string(), table.to_string()), value.to_string());
        }
    }

    /// Current raw bookmark for `(system, table)`.
    pub fn get(&self, system: &str, table: &str) -> Option<String> {
        self.shared.read().ok().and_then(|shared| {
            shared
                .entries
                .get(&(system.to_string(), table.to_string()))
                .cloned()
        })
    }

    /// Every upsert in order, across all clients.
    pub fn writes(&self) -> Vec<TimeboxEntry> {
        self.shared
            .read()
            .map(|shared| shared.writes.clone())
            .unwrap_or_default()
    }

    /// `(connects, closes)` observed so far.
    pub fn connection_counts(&self) -> (usize, usize) {
        self.shared
            .read()
            .map(|shared| (shared.connects, shared.closes))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TimeboxStore for InMemoryTimeboxStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<Box<dyn TimeboxClient>> {
        self.shared
            .write()
            .map_err(|_| anyhow!("timebox store lock poisoned"))?
            .connects += 1;
        Ok(Box::new(InMemoryTimeboxClient {
            shared: self.shared.clone(),
            fixed_now: self.fixed_now,
        }))
    }
}

/// A connection to an [`InMemoryTimeboxStore`].
pub struct InMemoryTimeboxClient {
    shared: Arc<RwLock<Shared>>,
    fixed_now: Option<DateTime<Utc>>,
}

#[async_trait]
impl TimeboxClient for InMemoryTimeboxClient {
    async fn read_timestamp(&self, system: &str, table: &str) -> Result<Option<String>> {
        let shared = self
            .shared
            .read()
            .map_err(|_| anyhow!("timebox store lock poisoned"))?;
        Ok(shared
            .entries
            .get(&(system.to_string(), table.to_string()))
            .cloned())
    }

    async fn upsert_timestamp(&self, entry: &TimeboxEntry) -> Result<()> {
        let mut shared = self
            .shared
            .write()
            .map_err(|_| anyhow!("timebox store lock poisoned"))?;
        shared.entries.insert(
            (entry.system.clone(), entry.table.clone()),
            entry.last_updated_timestamp.clone(),
        );
        shared.writes.push(entry.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shared
            .write()
            .map_err(|_| anyhow!("timebox store lock poisoned"))?
            .closes += 1;
        Ok(())
    }

    fn current_timestamp(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(now_micros)
    }
}
