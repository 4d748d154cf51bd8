//! Artifact paths and timestamp formats.
//!
//! The artifact layout is a compatibility boundary with everything that reads
//! the landing zone, so it is reproduced exactly:
//!
//! ```text
//! {source}/{data|log}/{table}/{YYYY}/{MM}/{DD}/{table}_{YYYY_MM_DDTHH_MM_SS_ffffffZ}[-{hint}].{format}
//! ```
//!
//! Bookmarks are persisted as `%Y-%m-%dT%H:%M:%S.%fZ` strings (six fractional
//! digits, UTC).

use chrono::{DateTime, NaiveDateTime, Utc};

/// chrono pattern used when writing bookmarks.
pub const BOOKMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// chrono pattern used when reading bookmarks back.
const BOOKMARK_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// chrono pattern for the timestamp embedded in artifact file names.
const FILE_TIMESTAMP_FORMAT: &str = "%Y_%m_%dT%H_%M_%S_%6fZ";

/// Default extension for data artifacts.
pub const DEFAULT_DATA_FORMAT: &str = "json";

/// Default extension for log artifacts.
pub const DEFAULT_LOG_FORMAT: &str = "log";

/// Which half of the landing layout an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Data,
    Log,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Data => "data",
            ArtifactKind::Log => "log",
        }
    }

    fn default_format(&self) -> &'static str {
        match self {
            ArtifactKind::Data => DEFAULT_DATA_FORMAT,
            ArtifactKind::Log => DEFAULT_LOG_FORMAT,
        }
    }
}

/// Normalize a configured table name: lower-case, spaces and hyphens become
/// underscores.
pub fn format_table_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

/// Render the timestamp that goes into artifact and log file names,
/// e.g. `2022_06_24T09_26_09_548513Z`.
pub fn format_file_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Build the object store path for an artifact.
///
/// `created_at` is the artifact's creation instant, not a window bound.
/// `file_format` overrides the extension (`json` for data, `log` for logs).
/// `hint` is appended after a `-` when present.
pub fn format_blob_name(
    source: &str,
    table: &str,
    created_at: &DateTime<Utc>,
    kind: ArtifactKind,
    file_format: Option<&str>,
    hint: Option<&str>,
) -> String {
    let format = file_format.unwrap_or_else(|| kind.default_format());

    let mut file_name = format!("{}_{}", table, format_file_timestamp(created_at));
    if let Some(hint) = hint {
        file_name.push('-');
        file_name.push_str(hint);
    }

    format!(
        "{}/{}/{}/{}/{}.{}",
        source,
        kind.as_str(),
        table,
        created_at.format("%Y/%m/%d"),
        file_name,
        format
    )
}

/// Serialize a bookmark timestamp for persistence.
pub fn format_bookmark(ts: &DateTime<Utc>) -> String {
    ts.format(BOOKMARK_FORMAT).to_string()
}

/// Parse a persisted bookmark.
///
/// Returns `None` for anything that does not match the bookmark pattern,
/// including values without a fractional-seconds part or with more than six
/// fractional digits.
pub fn parse_bookmark(value: &str) -> Option<DateTime<Utc>> {
    let (_, fraction) = value.strip_suffix('Z')?.rsplit_once('.')?;
    if fraction.is_empty()
        || fraction.len() > 6
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    NaiveDateTime::parse_from_str(value, BOOKMARK_PARSE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a user-supplied timestamp: the bookmark pattern first, then RFC 3339.
pub fn parse_user_timestamp(value: &str) -> Option<DateTime<Utc>> {
    parse_bookmark(value).or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn sample_ts() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2022, 6, 24)
            .unwrap()
            .and_hms_micro_opt(9, 26, 9, 548513)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_data_blob_name() {
        let name = format_blob_name("foo", "bar", &sample_ts(), ArtifactKind::Data, None, None);
        assert_eq!(
            name,
            "foo/data/bar/2022/06/24/bar_2022_06_24T09_26_09_548513Z.json"
        );
    }

    #[test]
    fn test_log_blob_name() {
        let name = format_blob_name("foo", "bar", &sample_ts(), ArtifactKind::Log, None, None);
        assert_eq!(
            name,
            "foo/log/bar/2022/06/24/bar_2022_06_24T09_26_09_548513Z.log"
        );
    }

    #[test]
    fn test_blob_name_with_hint() {
        let name = format_blob_name(
            "foo",
            "bar",
            &sample_ts(),
            ArtifactKind::Data,
            None,
            Some("baz"),
        );
        assert_eq!(
            name,
            "foo/data/bar/2022/06/24/bar_2022_06_24T09_26_09_548513Z-baz.json"
        );
    }

    #[test]
    fn test_blob_name_with_custom_format() {
        let name = format_blob_name(
            "foo",
            "bar",
            &sample_ts(),
            ArtifactKind::Data,
            Some("pdf"),
            None,
        );
        assert_eq!(
            name,
            "foo/data/bar/2022/06/24/bar_2022_06_24T09_26_09_548513Z.pdf"
        );
    }

    #[test]
    fn test_table_name_normalization() {
        assert_eq!(format_table_name("FOO"), "foo");
        assert_eq!(format_table_name("foo bar"), "foo_bar");
        assert_eq!(format_table_name("foo-bar"), "foo_bar");
        assert_eq!(format_table_name("Doc Work-Closed"), "doc_work_closed");
    }

    #[test]
    fn test_bookmark_format_and_parse() {
        let ts = sample_ts();
        let s = format_bookmark(&ts);
        assert_eq!(s, "2022-06-24T09:26:09.548513Z");
        assert_eq!(parse_bookmark(&s), Some(ts));
    }

    #[test]
    fn test_bookmark_whole_second_keeps_fraction() {
        let ts = sample_ts().with_nanosecond(0).unwrap();
        assert_eq!(format_bookmark(&ts), "2022-06-24T09:26:09.000000Z");
    }

    #[test]
    fn test_bookmark_rejects_other_patterns() {
        assert_eq!(parse_bookmark("2022-06-24T09:26:09Z"), None);
        assert_eq!(parse_bookmark("2022-06-24 09:26:09.5"), None);
        assert_eq!(parse_bookmark("2022-06-24T09:26:09.548513123Z"), None);
        assert_eq!(parse_bookmark("2022-06-24T09:26:09.5485130Z"), None);
        assert_eq!(parse_bookmark("2022-06-24T09:26:09.Z"), None);
        assert_eq!(parse_bookmark("yesterday"), None);
        assert_eq!(parse_bookmark(""), None);
    }

    #[test]
    fn test_user_timestamp_accepts_rfc3339() {
        let parsed = parse_user_timestamp("2022-06-24T11:26:09.548513+02:00").unwrap();
        assert_eq!(parsed, sample_ts());
    }
}
