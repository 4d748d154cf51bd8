//! # Bagel
//!
//! An incremental extract-and-land engine.
//!
//! Bagel pulls every configured table of a source system since the table's
//! bookmark, lands each payload as an immutable, timestamp-named artifact in
//! object storage, and advances the bookmark window by window. Connectors
//! only implement extraction; timeboxing, batching, naming, bookmarking and
//! failure isolation are shared.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Connector    │──▶│   Bagel      │──▶│ ObjectStore  │
//! │ HTTP/custom  │   │ window loop  │   │ local/S3/Az  │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           │
//!                           ▼
//!                    ┌──────────────┐
//!                    │ TimeboxStore │
//!                    │ SQLite/mem   │
//!                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bagel init                    # create the bookmark database
//! bagel tables                  # show normalized table config
//! bagel run                     # land every table
//! bagel run --table doc_work    # land one table
//! bagel timebox get doc_work
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`pipeline`] | The [`Bagel`](pipeline::Bagel) orchestrator |
//! | [`backends`] | Store and connector factories |
//! | [`logging`] | Tracing setup and per-table run logs |
//! | [`connector_http`] | Paginated HTTP JSON connector |
//! | [`timebox_sqlite`] | SQLite bookmark store |
//! | [`storage_local`] | Local filesystem object store |
//! | [`storage_s3`] | Amazon S3 object store |
//! | [`storage_azure`] | Azure Blob object store |
//! | [`signing`] | HMAC/SHA-256 request signing helpers |
//! | [`tables`] | `bagel tables` listing |
//! | [`timebox_cmd`] | `bagel timebox get/set` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod backends;
pub mod config;
pub mod connector_http;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod signing;
pub mod storage_azure;
pub mod storage_local;
pub mod storage_s3;
pub mod tables;
pub mod timebox_cmd;
pub mod timebox_sqlite;

pub use pipeline::{Bagel, RunSummary, TableReport};
