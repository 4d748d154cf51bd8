//! Generic paginated HTTP JSON connector.
//!
//! Serves any API that lists records for a time range page by page:
//!
//! ```text
//! GET {base_url}/{table.path | table.name}
//!     ?start=2022-06-24T00:00:00.000000Z
//!     &end=2022-06-25T00:00:00.000000Z
//!     &elt_type=delta
//!     &page_size=500
//!     &page=1
//! ```
//!
//! Each page becomes one [`Bite`], fetched only when the engine pulls it, and
//! the sequence ends at the first empty page. A response is either a JSON
//! array of records or an object holding the array under `records_field`
//! (a per-table `records_field` option overrides the connector default).
//!
//! # Authentication
//!
//! | `auth` | Environment |
//! |--------|-------------|
//! | `none` | |
//! | `basic` | `BAGEL_HTTP_USER`, `BAGEL_HTTP_PASSWORD` |
//! | `bearer` | `BAGEL_HTTP_TOKEN` |

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bagel_core::naming::format_bookmark;
use bagel_core::{BagelError, Bite, BitePages, Extract, SourceConnector, Table, Window};
use serde_json::Value;
use tracing::debug;

use crate::config::HttpConnectorConfig;

/// Credentials attached to every request.
#[derive(Clone)]
pub enum HttpAuth {
    None,
    Basic {
        user: String,
        password: Option<String>,
    },
    Bearer(String),
}

impl HttpAuth {
    /// Resolve the configured auth mode against the environment.
    pub fn from_env(mode: &str) -> Result<Self, BagelError> {
        match mode {
            "none" => Ok(HttpAuth::None),
            "basic" => {
                let user = std::env::var("BAGEL_HTTP_USER").map_err(|_| {
                    BagelError::Config("BAGEL_HTTP_USER environment variable not set".into())
                })?;
                Ok(HttpAuth::Basic {
                    user,
                    password: std::env::var("BAGEL_HTTP_PASSWORD").ok(),
                })
            }
            "bearer" => {
                let token = std::env::var("BAGEL_HTTP_TOKEN").map_err(|_| {
                    BagelError::Config("BAGEL_HTTP_TOKEN environment variable not set".into())
                })?;
                Ok(HttpAuth::Bearer(token))
            }
            other => Err(BagelError::Config(format!(
                "Unknown connector auth: '{}'",
                other
            ))),
        }
    }

    fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            HttpAuth::None => req,
            HttpAuth::Basic { user, password } => req.basic_auth(user, password.as_ref()),
            HttpAuth::Bearer(token) => req.bearer_auth(token),
        }
    }
}

pub struct HttpConnector {
    name: String,
    config: HttpConnectorConfig,
    auth: HttpAuth,
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new(name: &str, config: HttpConnectorConfig, auth: HttpAuth) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            name: name.to_string(),
            config,
            auth,
            client,
        })
    }

    /// Endpoint for a table: its `path` option, or its name.
    fn table_url(&self, table: &Table) -> String {
        let resource = table.option_str("path").unwrap_or(&table.name);
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }

    /// Query parameters shared by every page of one window.
    fn window_query(&self, table: &Table, window: &Window) -> Vec<(String, String)> {
        let mut query = vec![
            ("start".to_string(), format_bookmark(&window.start)),
            ("end".to_string(), format_bookmark(&window.end)),
        ];
        if let Some(elt_type) = &table.elt_type {
            query.push(("elt_type".to_string(), elt_type.clone()));
        }
        query.push((
            self.config.size_param.clone(),
            self.config.page_size.to_string(),
        ));
        query
    }
}

#[async_trait]
impl SourceConnector for HttpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Paginated HTTP JSON API"
    }

    async fn get_data(&self, table: &Table, window: &Window) -> Result<Extract> {
        let records_field = table
            .option_str("records_field")
            .map(str::to_string)
            .or_else(|| self.config.records_field.clone());

        Ok(Extract::Pages(Box::new(HttpPages {
            client: self.client.clone(),
            auth: self.auth.clone(),
            url: self.table_url(table),
            query: self.window_query(table, window),
            page_param: self.config.page_param.clone(),
            records_field,
            page: 1,
            done: false,
        })))
    }
}

/// Lazily fetched pages of one window.
struct HttpPages {
    client: reqwest::Client,
    auth: HttpAuth,
    url: String,
    query: Vec<(String, String)>,
    page_param: String,
    records_field: Option<String>,
    page: u32,
    done: bool,
}

#[async_trait]
impl BitePages for HttpPages {
    async fn next_bite(&mut self) -> Result<Option<Bite>> {
        if self.done {
            return Ok(None);
        }

        let mut query = self.query.clone();
        query.push((self.page_param.clone(), self.page.to_string()));
        debug!(url = %self.url, page = self.page, "fetching page");

        let req = self.auth.apply(self.client.get(&self.url).query(&query));
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to GET {} (page {})", self.url, self.page))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "GET {} page {} failed (HTTP {}): {}",
                self.url,
                self.page,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Response from {} is not JSON", self.url))?;
        let records = extract_records(body, self.records_field.as_deref())?;
        let bite = Bite::from_json(records)?;

        if bite.record_count() == Some(0) {
            self.done = true;
            return Ok(None);
        }
        self.page += 1;
        Ok(Some(bite))
    }
}

/// Pull the record array out of a response body.
fn extract_records(body: Value, records_field: Option<&str>) -> Result<Value> {
    match (body, records_field) {
        (Value::Object(mut obj), Some(field)) => match obj.remove(field) {
            Some(records) => Ok(records),
            None => bail!("response has no '{}' field", field),
        },
        (Value::Object(_), None) => {
            bail!("response is an object; set records_field to the array holding the records")
        }
        (other, _) => Ok(other),
    }
}
