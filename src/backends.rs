//! Build stores and the connector from configuration.
//!
//! Credentials are resolved here, so a missing one fails the run before any
//! table starts.

use std::sync::Arc;

use anyhow::Result;
use bagel_core::{
    BagelError, InMemoryObjectStore, InMemoryTimeboxStore, ObjectStore, SourceConnector,
    TimeboxStore,
};

use crate::config::Config;
use crate::connector_http::{HttpAuth, HttpConnector};
use crate::pipeline::Bagel;
use crate::storage_azure::AzureBlobStore;
use crate::storage_local::LocalObjectStore;
use crate::storage_s3::{AwsCredentials, S3ObjectStore};
use crate::timebox_sqlite::SqliteTimeboxStore;

pub fn timebox_store(config: &Config) -> Result<Arc<dyn TimeboxStore>> {
    match config.timebox.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteTimeboxStore::new(&config.timebox.path))),
        "memory" => Ok(Arc::new(InMemoryTimeboxStore::new())),
        other => Err(BagelError::Config(format!("Unknown timebox backend: '{}'", other)).into()),
    }
}

pub fn object_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let storage = &config.storage;
    match storage.backend.as_str() {
        "local" => {
            let root = storage.root.as_deref().ok_or_else(|| {
                BagelError::Config("storage.root is required for the local backend".into())
            })?;
            Ok(Arc::new(LocalObjectStore::new(root)))
        }
        "s3" => Ok(Arc::new(S3ObjectStore::new(storage, AwsCredentials::from_env()?)?)),
        "azure" => Ok(Arc::new(AzureBlobStore::from_env(storage)?)),
        "memory" => Ok(Arc::new(InMemoryObjectStore::new())),
        other => Err(BagelError::Config(format!("Unknown storage backend: '{}'", other)).into()),
    }
}

/// The connector named by `[connector]`.
pub fn connector(config: &Config) -> Result<Arc<dyn SourceConnector>> {
    let http = config.connector.clone().ok_or_else(|| {
        BagelError::Config(
            "no [connector] section; the CLI runs the built-in http connector".into(),
        )
    })?;
    let auth = HttpAuth::from_env(&http.auth)?;
    Ok(Arc::new(HttpConnector::new(&config.source.name, http, auth)?))
}

/// Assemble an engine from configuration around the given connector.
pub fn build_bagel(config: &Config, connector: Arc<dyn SourceConnector>) -> Result<Bagel> {
    let tables = config.tables()?;
    Ok(Bagel::new(connector, timebox_store(config)?, object_store(config)?)
        .with_source_name(&config.source.name)
        .with_tables(tables)
        .with_log_dir(config.logging.dir.clone()))
}
