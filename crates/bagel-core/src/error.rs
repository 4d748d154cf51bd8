//! Error taxonomy for Bagel runs.
//!
//! Store and connector contracts return [`anyhow::Result`]; the engine wraps
//! failures in a [`BagelError`] at the seam where they happen, so the category
//! of any table failure can be recovered with
//! `err.downcast_ref::<BagelError>()`.
//!
//! [`RunError`] is the aggregate raised once per run when at least one table
//! failed.

use std::fmt;

/// Separator printed between individual failures in a [`RunError`].
pub const FAILURE_SPACER: &str = "---------------------------";

/// A categorized failure inside a single table run.
#[derive(Debug, thiserror::Error)]
pub enum BagelError {
    /// Missing or invalid configuration (table names, backend parameters,
    /// credentials). Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A connector produced a payload shape a [`Bite`](crate::Bite) cannot hold.
    #[error("validation error: {0}")]
    Validation(String),

    /// The source connector failed while extracting.
    #[error("connector error: {0:#}")]
    Connector(anyhow::Error),

    /// A timebox or object store operation failed.
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    /// A persisted bookmark does not match the timestamp pattern.
    #[error("corrupt bookmark for {system}/{table}: {value:?} does not match %Y-%m-%dT%H:%M:%S.%fZ")]
    CorruptBookmark {
        system: String,
        table: String,
        value: String,
    },
}

impl BagelError {
    /// Short label for the category, used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            BagelError::Config(_) => "config",
            BagelError::Validation(_) => "validation",
            BagelError::Connector(_) => "connector",
            BagelError::Storage(_) => "storage",
            BagelError::CorruptBookmark { .. } => "corrupt_bookmark",
        }
    }
}

/// One failed table within a run.
#[derive(Debug, Clone)]
pub struct TableFailure {
    /// Normalized table name.
    pub table: String,
    /// Category of the failure, when it could be determined.
    pub kind: Option<&'static str>,
    /// Full rendering of the error chain.
    pub detail: String,
}

impl TableFailure {
    /// Capture an engine error for the aggregate report.
    pub fn from_error(table: &str, err: &anyhow::Error) -> Self {
        Self {
            table: table.to_string(),
            kind: err.downcast_ref::<BagelError>().map(BagelError::kind),
            detail: format!("table {}: {:?}", table, err),
        }
    }
}

/// Aggregate error returned when one or more tables failed.
///
/// Every table was attempted before this error was produced; it carries the
/// detail of each failure in the order the tables ran.
#[derive(Debug, Clone)]
pub struct RunError {
    pub failures: Vec<TableFailure>,
}

impl RunError {
    pub fn new(failures: Vec<TableFailure>) -> Self {
        Self { failures }
    }

    /// Names of the tables that failed.
    pub fn tables(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.table.as_str()).collect()
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Errors occurred in Bagel:")?;
        write!(f, "{}", FAILURE_SPACER)?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "\n{}", FAILURE_SPACER)?;
            }
            write!(f, "\n{}", failure.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}
