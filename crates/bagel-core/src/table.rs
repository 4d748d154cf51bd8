//! Declarative description of one extraction target.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::BagelError;
use crate::naming::{format_table_name, parse_user_timestamp, DEFAULT_DATA_FORMAT};
use crate::window::Frequency;

/// A table entry as written in the configuration file.
///
/// Unknown keys are kept in [`options`](TableConfig::options) and handed to
/// the connector through [`Table::options`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub elt_type: Option<String>,
    #[serde(default)]
    pub historical_batch: bool,
    #[serde(default)]
    pub historical_frequency: Option<String>,
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub initial_timestamp: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

/// One extraction target, built once per run and immutable afterwards.
///
/// The bookmark identity of a table is `(source name, table.name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Normalized name: lower-case, spaces and hyphens replaced by `_`.
    pub name: String,
    /// Extraction mode passed through to the connector (`"full"`, `"delta"`, ...).
    pub elt_type: Option<String>,
    /// Split wide bookmark-to-now ranges into several windows.
    pub historical_batch: bool,
    /// Window granularity when batching; a day when unset.
    pub historical_frequency: Option<Frequency>,
    /// Output extension; `json` when unset.
    pub file_format: Option<String>,
    /// Starting bookmark used only when none has been persisted yet.
    pub initial_timestamp: Option<DateTime<Utc>>,
    /// Any extra keys from the table's configuration entry.
    pub options: BTreeMap<String, Value>,
}

impl Table {
    /// Create a table with default settings.
    ///
    /// Fails with [`BagelError::Config`] when the name is empty after
    /// normalization.
    pub fn new(name: &str) -> Result<Self, BagelError> {
        let normalized = format_table_name(name.trim());
        if normalized.is_empty() {
            return Err(BagelError::Config("table name must not be empty".into()));
        }
        Ok(Self {
            name: normalized,
            elt_type: None,
            historical_batch: false,
            historical_frequency: None,
            file_format: None,
            initial_timestamp: None,
            options: BTreeMap::new(),
        })
    }

    /// Build a table from its configuration entry.
    pub fn from_config(config: &TableConfig) -> Result<Self, BagelError> {
        let name = config
            .name
            .as_deref()
            .ok_or_else(|| BagelError::Config("missing name in table config".into()))?;

        let mut table = Self::new(name)?;
        table.elt_type = config.elt_type.clone();
        table.historical_batch = config.historical_batch;
        table.file_format = config.file_format.clone();
        table.options = config.options.clone();

        if let Some(freq) = &config.historical_frequency {
            let parsed = freq.parse::<Frequency>().map_err(|e| {
                BagelError::Config(format!("table '{}': {}", table.name, e))
            })?;
            table.historical_frequency = Some(parsed);
        }

        if let Some(ts) = &config.initial_timestamp {
            let parsed = parse_user_timestamp(ts).ok_or_else(|| {
                BagelError::Config(format!(
                    "table '{}': initial_timestamp {:?} is not a valid timestamp",
                    table.name, ts
                ))
            })?;
            table.initial_timestamp = Some(parsed);
        }

        Ok(table)
    }

    pub fn with_elt_type(mut self, elt_type: &str) -> Self {
        self.elt_type = Some(elt_type.to_string());
        self
    }

    /// Enable historical batching at the given frequency (a day when `None`).
    pub fn with_historical_batch(mut self, frequency: Option<Frequency>) -> Self {
        self.historical_batch = true;
        self.historical_frequency = frequency;
        self
    }

    pub fn with_file_format(mut self, format: &str) -> Self {
        self.file_format = Some(format.to_string());
        self
    }

    pub fn with_initial_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.initial_timestamp = Some(ts);
        self
    }

    /// Effective batching frequency.
    pub fn frequency(&self) -> Frequency {
        self.historical_frequency.unwrap_or_default()
    }

    /// Effective output format.
    pub fn output_format(&self) -> &str {
        self.file_format.as_deref().unwrap_or(DEFAULT_DATA_FORMAT)
    }

    /// Look up a string-valued extra option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::FrequencyUnit;

    fn config(toml_like: &[(&str, Value)]) -> TableConfig {
        let map: serde_json::Map<String, Value> = toml_like
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        serde_json::from_value(Value::Object(map)).unwrap()
    }

    #[test]
    fn test_name_is_normalized() {
        let table = Table::new("Doc Work-Closed").unwrap();
        assert_eq!(table.name, "doc_work_closed");
        assert_eq!(table.to_string(), "doc_work_closed");
    }

    #[test]
    fn test_empty_name_fails() {
        assert!(matches!(Table::new(""), Err(BagelError::Config(_))));
        assert!(matches!(Table::new("   "), Err(BagelError::Config(_))));
    }

    #[test]
    fn test_missing_name_in_config_fails() {
        let cfg = config(&[("elt_type", Value::from("delta"))]);
        let err = Table::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn test_defaults() {
        let table = Table::from_config(&config(&[("name", Value::from("foo"))])).unwrap();
        assert!(!table.historical_batch);
        assert_eq!(table.frequency(), Frequency::default());
        assert_eq!(table.frequency().unit, FrequencyUnit::Day);
        assert_eq!(table.output_format(), "json");
        assert!(table.initial_timestamp.is_none());
        assert!(table.elt_type.is_none());
    }

    #[test]
    fn test_full_config() {
        let cfg = config(&[
            ("name", Value::from("Docs")),
            ("elt_type", Value::from("delta")),
            ("historical_batch", Value::from(true)),
            ("historical_frequency", Value::from("H")),
            ("file_format", Value::from("pdf")),
            ("initial_timestamp", Value::from("2022-01-01T00:00:00.000000Z")),
            ("path", Value::from("datasources/docs")),
        ]);
        let table = Table::from_config(&cfg).unwrap();
        assert_eq!(table.name, "docs");
        assert_eq!(table.elt_type.as_deref(), Some("delta"));
        assert!(table.historical_batch);
        assert_eq!(table.frequency().unit, FrequencyUnit::Hour);
        assert_eq!(table.output_format(), "pdf");
        assert_eq!(
            table.initial_timestamp.map(|t| t.to_rfc3339()),
            Some("2022-01-01T00:00:00+00:00".to_string())
        );
        assert_eq!(table.option_str("path"), Some("datasources/docs"));
    }

    #[test]
    fn test_bad_frequency_fails() {
        let cfg = config(&[
            ("name", Value::from("docs")),
            ("historical_frequency", Value::from("fortnight")),
        ]);
        assert!(matches!(
            Table::from_config(&cfg),
            Err(BagelError::Config(_))
        ));
    }

    #[test]
    fn test_bad_initial_timestamp_fails() {
        let cfg = config(&[
            ("name", Value::from("docs")),
            ("initial_timestamp", Value::from("last tuesday")),
        ]);
        let err = Table::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("initial_timestamp"));
    }
}
