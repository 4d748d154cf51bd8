//! Azure Blob Storage [`ObjectStore`].
//!
//! Writes each artifact with one `Put Blob` (block blob) request signed with
//! the storage account's Shared Key. `Put Blob` replaces an existing blob, so
//! writes are idempotent by path.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "azure"
//! account = "acmelanding"
//! container = "raw"
//! # endpoint = "http://127.0.0.1:10000/devstoreaccount1"   # Azurite
//! ```
//!
//! The account key is read from `AZURE_STORAGE_KEY` (base64, as shown in the
//! portal).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bagel_core::{BagelError, ObjectStore};
use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::signing::{encode_key, hmac_sha256};

const API_VERSION: &str = "2021-08-06";
const CONTENT_TYPE: &str = "application/octet-stream";

pub struct AzureBlobStore {
    account: String,
    container: String,
    endpoint: String,
    key: Vec<u8>,
    client: reqwest::Client,
}

impl AzureBlobStore {
    /// Build a store from configuration and a base64 account key.
    pub fn new(config: &StorageConfig, account_key: &str) -> Result<Self, BagelError> {
        let account = config
            .account
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| BagelError::Config("storage.account is required for azure".into()))?;
        let container = config
            .container
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BagelError::Config("storage.container is required for azure".into()))?;
        let key = BASE64
            .decode(account_key.trim())
            .map_err(|e| BagelError::Config(format!("AZURE_STORAGE_KEY is not valid base64: {}", e)))?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", account))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            account,
            container,
            endpoint,
            key,
            client: reqwest::Client::new(),
        })
    }

    /// Build a store reading the key from `AZURE_STORAGE_KEY`.
    pub fn from_env(config: &StorageConfig) -> Result<Self, BagelError> {
        let key = std::env::var("AZURE_STORAGE_KEY").map_err(|_| {
            BagelError::Config("AZURE_STORAGE_KEY environment variable not set".into())
        })?;
        Self::new(config, &key)
    }

    fn blob_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.container, encode_key(path))
    }

    /// Path component of a blob URL, used in the canonicalized resource.
    fn url_path(url: &str) -> &str {
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        without_scheme
            .find('/')
            .map_or("/", |i| &without_scheme[i..])
    }

    /// Headers for a `Put Blob` of `content_length` bytes, `Authorization`
    /// included.
    fn signed_put_headers(
        &self,
        url: &str,
        content_length: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>> {
        let ms_headers = vec![
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            (
                "x-ms-date".to_string(),
                now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];

        let string_to_sign = string_to_sign(
            "PUT",
            content_length,
            CONTENT_TYPE,
            &ms_headers,
            &format!("/{}{}", self.account, Self::url_path(url)),
        );
        let signature = BASE64.encode(hmac_sha256(&self.key, string_to_sign.as_bytes())?);

        let mut headers = ms_headers;
        headers.push(("Content-Type".to_string(), CONTENT_TYPE.to_string()));
        headers.push((
            "Authorization".to_string(),
            format!("SharedKey {}:{}", self.account, signature),
        ));
        Ok(headers)
    }
}

/// Shared Key string-to-sign for a request without conditional headers.
///
/// `ms_headers` must already be lower-case and sorted by name. A zero
/// content length is signed as an empty string.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(String, String)],
    canonical_resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        verb, length, content_type, canonical_headers, canonical_resource
    )
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    fn backend(&self) -> &str {
        "azure"
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let url = self.blob_url(path);
        let headers = self.signed_put_headers(&url, data.len(), Utc::now())?;

        let mut req = self.client.put(&url).body(data);
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await.with_context(|| {
            format!("Failed to put blob {}/{}", self.container, path)
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Azure Put Blob failed (HTTP {}) for '{}': {}",
                status,
                path,
                body.chars().take(500).collect::<String>()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(endpoint: Option<&str>) -> StorageConfig {
        StorageConfig {
            backend: "azure".into(),
            account: Some("acct".into()),
            container: Some("raw".into()),
            endpoint: endpoint.map(str::to_string),
            ..StorageConfig::default()
        }
    }

    fn key() -> String {
        BASE64.encode(b"not-a-real-key")
    }

    #[test]
    fn test_default_endpoint() {
        let store = AzureBlobStore::new(&config(None), &key()).unwrap();
        assert_eq!(
            store.blob_url("etq/data/docs/a.json"),
            "https://acct.blob.core.windows.net/raw/etq/data/docs/a.json"
        );
    }

    #[test]
    fn test_url_path() {
        assert_eq!(
            AzureBlobStore::url_path("https://acct.blob.core.windows.net/raw/a.json"),
            "/raw/a.json"
        );
        assert_eq!(
            AzureBlobStore::url_path("http://127.0.0.1:10000/devstoreaccount1/raw/a.json"),
            "/devstoreaccount1/raw/a.json"
        );
    }

    #[test]
    fn test_string_to_sign_layout() {
        let headers = vec![
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("x-ms-date".to_string(), "Fri, 24 Jun 2022 09:26:09 GMT".to_string()),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];
        let s = string_to_sign("PUT", 2, CONTENT_TYPE, &headers, "/acct/raw/a.json");
        let lines: Vec<&str> = s.split('\n').collect();
        assert_eq!(lines[0], "PUT");
        assert_eq!(lines[3], "2");
        assert_eq!(lines[5], CONTENT_TYPE);
        assert_eq!(lines[12], "x-ms-blob-type:BlockBlob");
        assert_eq!(lines[15], "/acct/raw/a.json");

        let empty = string_to_sign("PUT", 0, CONTENT_TYPE, &headers, "/acct/raw/a.json");
        assert_eq!(empty.split('\n').nth(3), Some(""));
    }

    #[test]
    fn test_signed_headers() {
        let store = AzureBlobStore::new(&config(None), &key()).unwrap();
        let now = Utc.with_ymd_and_hms(2022, 6, 24, 9, 26, 9).unwrap();
        let url = store.blob_url("a.json");
        let headers = store.signed_put_headers(&url, 2, now).unwrap();

        assert!(headers
            .iter()
            .any(|(k, v)| k == "x-ms-date" && v == "Fri, 24 Jun 2022 09:26:09 GMT"));
        let auth = &headers.iter().find(|(k, _)| k == "Authorization").unwrap().1;
        let signature = auth.strip_prefix("SharedKey acct:").unwrap();
        assert_eq!(BASE64.decode(signature).unwrap().len(), 32);
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let result = AzureBlobStore::new(&config(None), "***");
        assert!(matches!(result, Err(BagelError::Config(_))));
    }

    #[test]
    fn test_missing_container_is_config_error() {
        let mut cfg = config(None);
        cfg.container = None;
        assert!(matches!(
            AzureBlobStore::new(&cfg, &key()),
            Err(BagelError::Config(_))
        ));
    }
}
