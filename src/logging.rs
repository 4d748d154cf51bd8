//! Process-wide tracing setup and the per-table run log.
//!
//! Console output goes through `tracing`. Each table run additionally owns a
//! [`TableLog`]: a JSON-lines file opened when the run starts and uploaded to
//! the object store as a log artifact when it ends, whatever the outcome.
//!
//! ```text
//! {"timestamp":"2022-06-24T09:26:09.548513Z","level_name":"INFO","function_name":"run_table","message":"table_name: doc_work"}
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bagel_core::naming::{format_bookmark, format_file_timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// Uses the `RUST_LOG` environment variable for filtering, falling back to
/// `default_level`. Calling it twice is harmless.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: String,
    level_name: &'static str,
    function_name: &'a str,
    message: &'a str,
}

/// The log of one table run.
///
/// Lines are mirrored to `tracing`. Write failures are reported to `tracing`
/// and never interrupt the run.
pub struct TableLog {
    path: PathBuf,
    table: String,
    writer: Option<BufWriter<File>>,
}

impl TableLog {
    /// Open `{dir}/{source}_{table}_{started_at}.log`, creating `dir`.
    pub fn open(dir: &Path, source: &str, table: &str, started_at: &DateTime<Utc>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(format!(
            "{}_{}_{}.log",
            source,
            table,
            format_file_timestamp(started_at)
        ));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        Ok(Self {
            path,
            table: table.to_string(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&mut self, function: &str, message: impl AsRef<str>) {
        self.write(Level::Info, function, message.as_ref());
    }

    pub fn warning(&mut self, function: &str, message: impl AsRef<str>) {
        self.write(Level::Warning, function, message.as_ref());
    }

    pub fn error(&mut self, function: &str, message: impl AsRef<str>) {
        self.write(Level::Error, function, message.as_ref());
    }

    fn write(&mut self, level: Level, function: &str, message: &str) {
        match level {
            Level::Info => tracing::info!(table = %self.table, "{}", message),
            Level::Warning => tracing::warn!(table = %self.table, "{}", message),
            Level::Error => tracing::error!(table = %self.table, "{}", message),
        }

        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let line = LogLine {
            timestamp: format_bookmark(&Utc::now()),
            level_name: level.as_str(),
            function_name: function,
            message,
        };
        let result = serde_json::to_writer(&mut *writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write table log");
        }
    }

    /// Flush and close the file, returning its contents for upload.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }
        std::fs::read(&self.path)
            .with_context(|| format!("Failed to read back {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    #[test]
    fn test_file_name_and_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let started = Utc.with_ymd_and_hms(2022, 6, 24, 9, 26, 9).unwrap();
        let mut log = TableLog::open(&dir.path().join("logs"), "etq", "docs", &started).unwrap();
        assert_eq!(
            log.path().file_name().unwrap().to_str().unwrap(),
            "etq_docs_2022_06_24T09_26_09_000000Z.log"
        );

        log.info("run_table", "table_name: docs");
        log.warning("get_timebox", "bookmark ahead of now");
        log.error("run_table", "boom \"quoted\"");
        let bytes = log.finish().unwrap();

        let lines: Vec<Value> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["level_name"], "INFO");
        assert_eq!(lines[0]["function_name"], "run_table");
        assert_eq!(lines[0]["message"], "table_name: docs");
        assert_eq!(lines[1]["level_name"], "WARNING");
        assert_eq!(lines[1]["function_name"], "get_timebox");
        assert_eq!(lines[2]["level_name"], "ERROR");
        assert_eq!(lines[2]["message"], "boom \"quoted\"");
        assert!(lines[2]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing("info");
        init_tracing("debug");
    }
}
