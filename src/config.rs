//! TOML configuration.
//!
//! One file describes a source system, where its bookmarks live, where its
//! artifacts land, and which tables to pull:
//!
//! ```toml
//! [source]
//! name = "etq"
//!
//! [timebox]
//! backend = "sqlite"
//! path = "./data/bagel.sqlite"
//!
//! [storage]
//! backend = "local"
//! root = "./landing"
//!
//! [logging]
//! dir = "./logs"
//! level = "info"
//!
//! [connector]
//! type = "http"
//! base_url = "https://api.example.com/v1"
//!
//! [[tables]]
//! name = "Doc Work"
//! elt_type = "delta"
//! historical_batch = true
//! historical_frequency = "D"
//! ```
//!
//! Everything that can be checked without touching the network is checked in
//! [`load_config`]; credentials are read from the environment when the
//! backends are built.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bagel_core::{BagelError, Table, TableConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub timebox: TimeboxConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub connector: Option<HttpConnectorConfig>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Source system name. Roots every artifact path and partitions bookmarks.
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeboxConfig {
    #[serde(default = "default_timebox_backend")]
    pub backend: String,
    #[serde(default = "default_timebox_path")]
    pub path: PathBuf,
}

impl Default for TimeboxConfig {
    fn default() -> Self {
        Self {
            backend: default_timebox_backend(),
            path: default_timebox_path(),
        }
    }
}

fn default_timebox_backend() -> String {
    "sqlite".to_string()
}
fn default_timebox_path() -> PathBuf {
    PathBuf::from("./data/bagel.sqlite")
}

/// Object store settings. Which fields are required depends on `backend`.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// `local`: directory the landing zone is written under.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// `s3`: bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// `s3`: bucket region.
    #[serde(default = "default_region")]
    pub region: String,
    /// `s3`: key prefix prepended to every artifact path.
    #[serde(default)]
    pub prefix: String,
    /// `s3`: custom endpoint (MinIO, LocalStack). Uses path-style addressing.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// `azure`: storage account name.
    #[serde(default)]
    pub account: Option<String>,
    /// `azure`: blob container.
    #[serde(default)]
    pub container: Option<String>,
    /// `azure`: custom blob endpoint (Azurite).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            root: Some(PathBuf::from("./landing")),
            bucket: None,
            region: default_region(),
            prefix: String::new(),
            endpoint_url: None,
            account: None,
            container: None,
            endpoint: None,
        }
    }
}

fn default_storage_backend() -> String {
    "local".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for per-table log files.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// Console filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for the built-in paginated HTTP JSON connector.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConnectorConfig {
    #[serde(rename = "type", default = "default_connector_type")]
    pub kind: String,
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Query parameter carrying the 1-based page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Query parameter carrying the page size.
    #[serde(default = "default_size_param")]
    pub size_param: String,
    /// `none`, `basic` or `bearer`.
    #[serde(default = "default_auth")]
    pub auth: String,
    /// Field holding the record array when responses are objects.
    #[serde(default)]
    pub records_field: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_connector_type() -> String {
    "http".to_string()
}
fn default_page_size() -> u32 {
    500
}
fn default_page_param() -> String {
    "page".to_string()
}
fn default_size_param() -> String {
    "page_size".to_string()
}
fn default_auth() -> String {
    "none".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Build the normalized table list, in configuration order.
    ///
    /// Fails on an invalid entry or when two entries normalize to the same
    /// name (they would share one bookmark).
    pub fn tables(&self) -> Result<Vec<Table>, BagelError> {
        let mut seen = HashSet::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for entry in &self.tables {
            let table = Table::from_config(entry)?;
            if !seen.insert(table.name.clone()) {
                return Err(BagelError::Config(format!(
                    "duplicate table '{}' (names are compared after normalization)",
                    table.name
                )));
            }
            tables.push(table);
        }
        Ok(tables)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.source.name.trim().is_empty() {
        return Err(BagelError::Config("source.name must not be empty".into()).into());
    }

    if config.tables.is_empty() {
        return Err(BagelError::Config("at least one [[tables]] entry is required".into()).into());
    }
    config.tables()?;

    match config.timebox.backend.as_str() {
        "sqlite" | "memory" => {}
        other => bail!(BagelError::Config(format!(
            "Unknown timebox backend: '{}'. Must be sqlite or memory.",
            other
        ))),
    }

    let storage = &config.storage;
    match storage.backend.as_str() {
        "local" => {
            if storage.root.is_none() {
                bail!(BagelError::Config(
                    "storage.root is required for the local backend".into()
                ));
            }
        }
        "s3" => {
            if storage.bucket.as_deref().map_or(true, str::is_empty) {
                bail!(BagelError::Config(
                    "storage.bucket is required for the s3 backend".into()
                ));
            }
        }
        "azure" => {
            if storage.account.as_deref().map_or(true, str::is_empty) {
                bail!(BagelError::Config(
                    "storage.account is required for the azure backend".into()
                ));
            }
            if storage.container.as_deref().map_or(true, str::is_empty) {
                bail!(BagelError::Config(
                    "storage.container is required for the azure backend".into()
                ));
            }
        }
        "memory" => {}
        other => bail!(BagelError::Config(format!(
            "Unknown storage backend: '{}'. Must be local, s3, azure, or memory.",
            other
        ))),
    }

    if let Some(connector) = &config.connector {
        if connector.kind != "http" {
            bail!(BagelError::Config(format!(
                "Unknown connector type: '{}'. Must be http.",
                connector.kind
            )));
        }
        if connector.base_url.trim().is_empty() {
            bail!(BagelError::Config("connector.base_url must not be empty".into()));
        }
        if connector.page_size == 0 {
            bail!(BagelError::Config("connector.page_size must be > 0".into()));
        }
        match connector.auth.as_str() {
            "none" | "basic" | "bearer" => {}
            other => bail!(BagelError::Config(format!(
                "Unknown connector auth: '{}'. Must be none, basic, or bearer.",
                other
            ))),
        }
    }

    Ok(config)
}
