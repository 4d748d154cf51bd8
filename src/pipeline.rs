//! The orchestrator.
//!
//! [`Bagel`] runs every configured table of one source system through the
//! same cycle and isolates failures per table:
//!
//! ```text
//! for each table (sequentially):
//!   open TableLog ─▶ connect TimeboxClient ─▶ (bookmark, now)
//!        │
//!        ▼
//!   extract_windows(bookmark, now)
//!        │
//!        ▼  for each window, in order
//!   connector.get_data ─▶ BitePages ─▶ encode ─▶ ObjectStore::upload_data
//!        │                 (pulled one bite at a time)
//!        ▼
//!   write_run_timestamp(window.end)        // only after every bite landed
//!        │
//!        ▼
//!   close client ─▶ finish TableLog ─▶ ObjectStore::upload_log
//! ```
//!
//! A failing table is recorded and the run moves on; once every table has
//! been attempted, any failures are returned together as a [`RunError`].
//! Bookmarks already advanced and artifacts already written are kept:
//! artifacts overwrite by path, so re-running a window is safe.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bagel_core::naming::{format_blob_name, format_bookmark, ArtifactKind};
use bagel_core::timebox::now_micros;
use bagel_core::{
    extract_windows, BagelError, Bite, ObjectStore, RunError, SourceConnector, Table,
    TableFailure, TimeboxClient, TimeboxStore, Window,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::logging::TableLog;

/// Issues artifact timestamps that strictly increase within one engine, so
/// two bites without a file-name hint can never map to the same path.
#[derive(Default)]
pub struct ArtifactClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ArtifactClock {
    pub fn next(&self) -> DateTime<Utc> {
        let now = now_micros();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let ts = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        ts
    }
}

/// Outcome of one successful table run.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    /// Windows fully processed (bookmark advanced).
    pub windows: usize,
    /// Data artifact paths, in write order.
    pub files: Vec<String>,
    /// Bookmark after the run.
    pub bookmark: String,
    /// Log artifact path, when the log was uploaded.
    pub log_path: Option<String>,
}

/// Outcome of a run in which every table succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub tables: Vec<TableReport>,
}

impl RunSummary {
    pub fn files_written(&self) -> usize {
        self.tables.iter().map(|t| t.files.len()).sum()
    }
}

/// The extract-and-land engine for one source system.
pub struct Bagel {
    source: String,
    connector: Arc<dyn SourceConnector>,
    timebox: Arc<dyn TimeboxStore>,
    storage: Arc<dyn ObjectStore>,
    tables: Vec<Table>,
    log_dir: PathBuf,
    clock: ArtifactClock,
}

impl Bagel {
    /// Build an engine. The source name defaults to the connector's name.
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        timebox: Arc<dyn TimeboxStore>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            source: connector.name().to_string(),
            connector,
            timebox,
            storage,
            tables: Vec::new(),
            log_dir: PathBuf::from("./logs"),
            clock: ArtifactClock::default(),
        }
    }

    pub fn with_source_name(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_tables(mut self, tables: Vec<Table>) -> Self {
        self.tables = tables;
        self
    }

    /// Directory the per-table log files are written to before upload.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Run every configured table.
    ///
    /// Returns `Ok` only if every table succeeded. Otherwise all tables were
    /// still attempted and the error lists each failure.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        self.run_all(&self.tables).await
    }

    /// Run only the named tables, in configuration order.
    ///
    /// Names are normalized before matching; an unknown name is a
    /// configuration error and nothing runs.
    pub async fn run_tables(&self, names: &[String]) -> Result<RunSummary> {
        let selected = self.select(names)?;
        Ok(self.run_all(&selected).await?)
    }

    fn select(&self, names: &[String]) -> Result<Vec<Table>, BagelError> {
        let wanted: Vec<String> = names
            .iter()
            .map(|n| bagel_core::naming::format_table_name(n.trim()))
            .collect();
        if let Some(unknown) = wanted
            .iter()
            .find(|w| !self.tables.iter().any(|t| &t.name == *w))
        {
            return Err(BagelError::Config(format!(
                "table '{}' is not configured for source '{}'",
                unknown, self.source
            )));
        }
        Ok(self
            .tables
            .iter()
            .filter(|t| wanted.contains(&t.name))
            .cloned()
            .collect())
    }

    async fn run_all(&self, tables: &[Table]) -> Result<RunSummary, RunError> {
        let mut reports = Vec::with_capacity(tables.len());
        let mut failures = Vec::new();

        for table in tables {
            match self.run_table(table).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(source = %self.source, table = %table.name, "table failed: {:#}", err);
                    failures.push(TableFailure::from_error(&table.name, &err));
                }
            }
        }

        if failures.is_empty() {
            info!(source = %self.source, tables = reports.len(), "run complete");
            Ok(RunSummary {
                source: self.source.clone(),
                tables: reports,
            })
        } else {
            Err(RunError::new(failures))
        }
    }

    /// Run one table end to end, uploading its log on every exit path.
    ///
    /// On success a failed log upload fails the table. On failure the
    /// pipeline error is returned and a failed log upload is only reported.
    pub async fn run_table(&self, table: &Table) -> Result<TableReport> {
        let started_at = self.clock.next();
        let mut log = TableLog::open(&self.log_dir, &self.source, &table.name, &started_at)?;
        log.info("run_table", format!("table_name: {}", table.name));
        log.info(
            "run_table",
            format!("connector: {}", self.connector.description()),
        );
        log.info(
            "run_table",
            format!("elt_type: {}", table.elt_type.as_deref().unwrap_or("")),
        );

        let outcome = self.process_table(table, &mut log).await;
        match &outcome {
            Ok(report) => log.info(
                "run_table",
                format!("Job Complete: {} files created", report.files.len()),
            ),
            Err(err) => log.error("run_table", format!("{:#}", err)),
        }

        let log_path = format_blob_name(
            &self.source,
            &table.name,
            &started_at,
            ArtifactKind::Log,
            None,
            None,
        );
        let uploaded = self.upload_log(log, &log_path).await;

        match (outcome, uploaded) {
            (Ok(mut report), Ok(())) => {
                report.log_path = Some(log_path);
                Ok(report)
            }
            (Ok(_), Err(upload_err)) => Err(upload_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(upload_err)) => {
                warn!(table = %table.name, "log upload failed after table error: {:#}", upload_err);
                Err(err)
            }
        }
    }

    async fn upload_log(&self, log: TableLog, path: &str) -> Result<()> {
        let bytes = log.finish()?;
        self.storage
            .upload_log(path, bytes)
            .await
            .map_err(|e| BagelError::Storage(e.context(format!("uploading log {}", path))).into())
    }

    /// Connect, process every window, and close the connection on all paths.
    async fn process_table(&self, table: &Table, log: &mut TableLog) -> Result<TableReport> {
        let client = self.timebox.connect().await.map_err(storage_error)?;
        let result = self.process_windows(client.as_ref(), table, log).await;
        if let Err(e) = client.close().await {
            warn!(table = %table.name, "failed to close timebox client: {:#}", e);
        }
        result
    }

    async fn process_windows(
        &self,
        client: &dyn TimeboxClient,
        table: &Table,
        log: &mut TableLog,
    ) -> Result<TableReport> {
        let (last_run, now) = client
            .get_timebox(&self.source, &table.name, table.initial_timestamp)
            .await
            .map_err(storage_error)?;
        log.info("get_timebox", format!("Current Timestamp: {}", format_bookmark(&now)));
        log.info("get_timebox", format!("Last Run Timestamp: {}", format_bookmark(&last_run)));

        let windows = extract_windows(last_run, now, table.historical_batch, table.historical_frequency);
        if windows.is_empty() {
            log.warning(
                "run_table",
                format!(
                    "bookmark {} is ahead of now {}; nothing to extract",
                    format_bookmark(&last_run),
                    format_bookmark(&now)
                ),
            );
        }
        log.info("run_table", format!("windows: {}", windows.len()));

        let mut files = Vec::new();
        let mut bookmark = last_run;
        for (i, window) in windows.iter().enumerate() {
            log.info(
                "process_window",
                format!("window {}/{}: {}", i + 1, windows.len(), window),
            );
            let written = self.process_window(table, window, log).await?;

            let entry = client
                .write_run_timestamp(&self.source, &table.name, window.end)
                .await
                .map_err(storage_error)?;
            bookmark = window.end;
            log.info(
                "process_window",
                format!(
                    "{} files written, bookmark now {}",
                    written.len(),
                    entry.last_updated_timestamp
                ),
            );
            files.extend(written);
        }

        Ok(TableReport {
            table: table.name.clone(),
            windows: windows.len(),
            files,
            bookmark: format_bookmark(&bookmark),
            log_path: None,
        })
    }

    /// Pull and land every bite of one window.
    async fn process_window(
        &self,
        table: &Table,
        window: &Window,
        log: &mut TableLog,
    ) -> Result<Vec<String>> {
        let extract = self
            .connector
            .get_data(table, window)
            .await
            .map_err(connector_error)?;
        let mut pages = extract.into_pages();

        let mut written = Vec::new();
        while let Some(bite) = pages.next_bite().await.map_err(connector_error)? {
            let path = self.write_bite(table, bite).await?;
            log.info("write_bite", format!("File: {}", path));
            written.push(path);
        }
        Ok(written)
    }

    async fn write_bite(&self, table: &Table, bite: Bite) -> Result<String> {
        let format = table.output_format();
        let data = bite.encode(format)?;
        let (_, hint) = bite.into_parts();

        let created_at = self.clock.next();
        let path = format_blob_name(
            &self.source,
            &table.name,
            &created_at,
            ArtifactKind::Data,
            Some(format),
            hint.as_deref(),
        );
        self.storage
            .upload_data(&path, data)
            .await
            .map_err(|e| BagelError::Storage(e.context(format!("uploading {}", path))))?;
        Ok(path)
    }
}

/// Keep an already categorized error, otherwise file it as a connector error.
fn connector_error(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<BagelError>().is_some() {
        err
    } else {
        BagelError::Connector(err).into()
    }
}

/// Keep an already categorized error, otherwise file it as a storage error.
fn storage_error(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<BagelError>().is_some() {
        err
    } else {
        BagelError::Storage(err).into()
    }
}
