//! Object storage contract.
//!
//! The landing zone is a flat namespace of paths built by
//! [`format_blob_name`](crate::naming::format_blob_name). Writes overwrite:
//! putting the same path twice leaves exactly one object holding the second
//! payload, which is what makes a retried window safe.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// A write-only destination for data and log artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs (`"local"`, `"s3"`, `"azure"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Store `data` at `path`, replacing any existing object.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Store a data artifact.
    async fn upload_data(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.put(path, data).await
    }

    /// Store a table run log.
    async fn upload_log(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.put(path, data).await
    }
}
