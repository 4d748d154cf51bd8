//! The unit of payload handed from a connector to the write path.
//!
//! A [`Bite`] is either an opaque byte blob (a PDF, a CSV export, ...) or a
//! flat list of records. A list of lists is rejected when the bite is built:
//! it means the connector returned several pages at once instead of yielding
//! them one by one through [`BitePages`](crate::connector::BitePages).

use serde_json::{Map, Value};

use crate::error::BagelError;

/// A single record: a JSON object.
pub type Record = Map<String, Value>;

/// What a bite carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    Records(Vec<Record>),
}

/// Record encodings understood by [`Bite::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordEncoding {
    JsonArray,
    JsonLines,
}

impl RecordEncoding {
    fn for_format(format: &str) -> Self {
        match format {
            "jsonl" | "ndjson" => RecordEncoding::JsonLines,
            _ => RecordEncoding::JsonArray,
        }
    }
}

/// Validated payload plus an optional file-name hint.
///
/// Equality is structural, so two bites built from the same payload compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bite {
    content: Content,
    file_name: Option<String>,
}

impl Bite {
    /// A bite holding raw bytes, written unchanged.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Content::Bytes(data.into()),
            file_name: None,
        }
    }

    /// A bite holding a flat list of records.
    pub fn records(records: Vec<Record>) -> Self {
        Self {
            content: Content::Records(records),
            file_name: None,
        }
    }

    /// Build a bite from loosely typed JSON, as returned by most APIs.
    ///
    /// Accepts an array whose elements are all objects (the empty array
    /// included). A nested array anywhere in the list is a validation error,
    /// as is any element or top-level value that is not an object.
    pub fn from_json(value: Value) -> Result<Self, BagelError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(BagelError::Validation(format!(
                    "bite content must be bytes or a list of records, not {}",
                    json_type_name(&other)
                )))
            }
        };

        if items.iter().any(Value::is_array) {
            return Err(BagelError::Validation(
                "cannot be list of lists; yield one page per bite instead".into(),
            ));
        }

        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(record) => records.push(record),
                other => {
                    return Err(BagelError::Validation(format!(
                        "element {} of bite content is {}, expected a record",
                        i,
                        json_type_name(&other)
                    )))
                }
            }
        }

        Ok(Self::records(records))
    }

    /// Attach a hint appended to the artifact file name (`..._{ts}-{hint}.ext`).
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Number of records, or `None` for a byte payload.
    pub fn record_count(&self) -> Option<usize> {
        match &self.content {
            Content::Records(records) => Some(records.len()),
            Content::Bytes(_) => None,
        }
    }

    /// Serialize the payload for the object store.
    ///
    /// Records become compact JSON (a single array, or one object per line
    /// for `jsonl`/`ndjson`); bytes are returned unchanged.
    pub fn encode(&self, format: &str) -> Result<Vec<u8>, BagelError> {
        match &self.content {
            Content::Bytes(data) => Ok(data.clone()),
            Content::Records(records) => match RecordEncoding::for_format(format) {
                RecordEncoding::JsonArray => serde_json::to_vec(records)
                    .map_err(|e| BagelError::Validation(format!("records not serializable: {}", e))),
                RecordEncoding::JsonLines => {
                    let mut out = Vec::new();
                    for record in records {
                        serde_json::to_writer(&mut out, record).map_err(|e| {
                            BagelError::Validation(format!("record not serializable: {}", e))
                        })?;
                        out.push(b'\n');
                    }
                    Ok(out)
                }
            },
        }
    }

    /// Consume the bite, returning its parts.
    pub fn into_parts(self) -> (Content, Option<String>) {
        (self.content, self.file_name)
    }
}

impl From<Vec<u8>> for Bite {
    fn from(data: Vec<u8>) -> Self {
        Bite::bytes(data)
    }
}

impl From<Vec<Record>> for Bite {
    fn from(records: Vec<Record>) -> Self {
        Bite::records(records)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a record",
    }
}
