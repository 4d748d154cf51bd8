//! Source connector contract.
//!
//! A connector knows how to pull one source system's data for a table and a
//! time window. It hands the engine either one [`Bite`] or a lazy sequence of
//! them ([`BitePages`]); the engine writes each bite as it is pulled, so a
//! paginated source is never drained into memory first.
//!
//! # Architecture
//!
//! ```text
//! Bagel ──(table, window)──▶ SourceConnector::get_data
//!                                   │
//!                    ┌──────────────┴──────────────┐
//!                    ▼                             ▼
//!            Extract::Single(Bite)        Extract::Pages(BitePages)
//!                    │                             │ next_bite() ... None
//!                    └──────────────┬──────────────┘
//!                                   ▼
//!                          ObjectStore::upload_data
//! ```
//!
//! A connector that serves several related tables can route by table name
//! with a [`TableRouter`]: named handlers plus a declared default.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::bite::Bite;
use crate::table::Table;
use crate::window::Window;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A pull-based, finite, non-restartable sequence of bites.
///
/// Each call to [`next_bite`](BitePages::next_bite) may perform I/O (fetch
/// the next page). `Ok(None)` ends the sequence; an error aborts the table.
#[async_trait]
pub trait BitePages: Send {
    async fn next_bite(&mut self) -> Result<Option<Bite>>;
}

/// Adapts any iterator of bites into [`BitePages`].
///
/// The iterator is advanced one item per pull, so lazy iterators stay lazy.
pub struct IterPages<I> {
    iter: I,
}

impl<I> IterPages<I>
where
    I: Iterator<Item = Result<Bite>> + Send,
{
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

#[async_trait]
impl<I> BitePages for IterPages<I>
where
    I: Iterator<Item = Result<Bite>> + Send,
{
    async fn next_bite(&mut self) -> Result<Option<Bite>> {
        self.iter.next().transpose()
    }
}

/// What a connector returns for one window.
pub enum Extract {
    /// A single bite, written as one artifact.
    Single(Bite),
    /// A lazy sequence of bites, written one artifact per bite as pulled.
    Pages(Box<dyn BitePages>),
}

impl Extract {
    /// Wrap an already materialized list of bites.
    pub fn from_bites(bites: Vec<Bite>) -> Self {
        Extract::Pages(Box::new(IterPages::new(bites.into_iter().map(Ok))))
    }

    /// Wrap a lazy iterator of bites.
    pub fn lazy<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Bite>> + Send + 'static,
    {
        Extract::Pages(Box::new(IterPages::new(iter)))
    }

    /// Normalize into a lazy sequence: a single bite becomes a one-element
    /// sequence, pages are passed through untouched.
    pub fn into_pages(self) -> Box<dyn BitePages> {
        match self {
            Extract::Single(bite) => Box::new(IterPages::new(std::iter::once(Ok(bite)))),
            Extract::Pages(pages) => pages,
        }
    }
}

impl From<Bite> for Extract {
    fn from(bite: Bite) -> Self {
        Extract::Single(bite)
    }
}

/// Source-specific extraction logic.
///
/// Implementations must raise on error and return normally otherwise; an
/// empty source is an empty sequence (or a bite with no records), never an
/// error.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use bagel_core::{Bite, Extract, SourceConnector, Table, Window};
/// use serde_json::json;
///
/// struct Hello;
///
/// #[async_trait]
/// impl SourceConnector for Hello {
///     fn name(&self) -> &str { "hello" }
///
///     async fn get_data(&self, table: &Table, window: &Window) -> Result<Extract> {
///         let bite = Bite::from_json(json!([{
///             "table": table.name,
///             "start": window.start.to_rfc3339(),
///         }]))?;
///         Ok(Extract::Single(bite))
///     }
/// }
/// ```
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Source system name; roots every artifact path and partitions bookmarks.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        "custom connector"
    }

    /// Extract `table`'s data for `window`.
    async fn get_data(&self, table: &Table, window: &Window) -> Result<Extract>;
}

/// A routed extraction routine.
pub type Handler = Arc<dyn Fn(Table, Window) -> BoxFuture<'static, Result<Extract>> + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Table, Window) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Extract>> + Send + 'static,
{
    Arc::new(move |table: Table, window: Window| -> BoxFuture<'static, Result<Extract>> {
        Box::pin(f(table, window))
    })
}

/// Tagged dispatch from table name to extraction routine.
///
/// Lets one connector serve many related tables: specialized tables get a
/// named handler, everything else falls through to the default.
///
/// ```rust
/// use bagel_core::connector::handler;
/// use bagel_core::{Bite, Extract, TableRouter};
///
/// let router = TableRouter::new(handler(|_table, _window| async {
///     Ok(Extract::Single(Bite::records(vec![])))
/// }))
/// .route("docwork_attachment", handler(|_table, _window| async {
///     Ok(Extract::Single(Bite::bytes(b"%PDF".to_vec())))
/// }));
///
/// assert!(router.has_route("docwork_attachment"));
/// assert!(!router.has_route("docwork_document"));
/// ```
#[derive(Clone)]
pub struct TableRouter {
    routes: HashMap<String, Handler>,
    default: Handler,
}

impl TableRouter {
    /// Create a router whose unmatched tables go to `default`.
    pub fn new(default: Handler) -> Self {
        Self {
            routes: HashMap::new(),
            default,
        }
    }

    /// Register a handler for a (normalized) table name.
    pub fn route(mut self, table: &str, handler: Handler) -> Self {
        self.routes
            .insert(crate::naming::format_table_name(table), handler);
        self
    }

    pub fn has_route(&self, table: &str) -> bool {
        self.routes.contains_key(table)
    }

    /// Run the handler registered for `table`, or the default.
    pub async fn dispatch(&self, table: &Table, window: &Window) -> Result<Extract> {
        let handler = self.routes.get(&table.name).unwrap_or(&self.default);
        handler(table.clone(), *window).await
    }
}

/// A connector backed entirely by a [`TableRouter`].
pub struct RoutedConnector {
    name: String,
    router: TableRouter,
}

impl RoutedConnector {
    pub fn new(name: &str, router: TableRouter) -> Self {
        Self {
            name: name.to_string(),
            router,
        }
    }
}

#[async_trait]
impl SourceConnector for RoutedConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "routed connector"
    }

    async fn get_data(&self, table: &Table, window: &Window) -> Result<Extract> {
        self.router.dispatch(table, window).await
    }
}
