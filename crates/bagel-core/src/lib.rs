//! # Bagel Core
//!
//! Runtime-agnostic building blocks for incremental extract-and-land jobs.
//!
//! A job pulls every configured table of one source system since its last
//! bookmark and lands each payload as an immutable, timestamp-named artifact
//! in an object store. This crate holds the pieces that do not depend on a
//! particular database, cloud, or async runtime:
//!
//! - [`Table`]: one extraction target and its batching settings.
//! - [`Bite`]: one validated payload (bytes or flat records).
//! - [`Window`] / [`extract_windows`]: partitioning of `[bookmark, now]`.
//! - [`naming`]: artifact paths and bookmark formats.
//! - [`SourceConnector`] / [`TableRouter`]: the extraction contract.
//! - [`TimeboxStore`] / [`ObjectStore`]: bookmark and artifact stores, each
//!   with an in-memory implementation.
//! - [`RunError`]: the aggregate failure of a run.
//!
//! The `bagel` crate adds configuration, the concrete backends, the
//! orchestrator, and the CLI.

pub mod bite;
pub mod connector;
pub mod error;
pub mod naming;
pub mod storage;
pub mod table;
pub mod timebox;
pub mod window;

pub use bite::{Bite, Content, Record};
pub use connector::{
    handler, BitePages, Extract, Handler, IterPages, RoutedConnector, SourceConnector, TableRouter,
};
pub use error::{BagelError, RunError, TableFailure, FAILURE_SPACER};
pub use naming::ArtifactKind;
pub use storage::memory::InMemoryObjectStore;
pub use storage::ObjectStore;
pub use table::{Table, TableConfig};
pub use timebox::memory::InMemoryTimeboxStore;
pub use timebox::{TimeboxClient, TimeboxEntry, TimeboxStore, DEFAULT_LOOKBACK_DAYS};
pub use window::{extract_windows, Frequency, FrequencyUnit, Window};
