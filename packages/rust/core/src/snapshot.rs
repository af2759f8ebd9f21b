//! Reading and writing batch snapshots in JSON and CSV.
//!
//! JSON is the canonical interchange format between passes; CSV is an
//! export format for spreadsheets. Loading detects the format from the
//! file extension.

use std::path::Path;

use serde_json::Value;
use tracing::info;

use stargazer_shared::{Result, StargazerError, UserRecord};

/// Write records as pretty-printed JSON.
pub fn write_json(path: &Path, records: &[UserRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| StargazerError::validation(format!("serialize records: {e}")))?;
    std::fs::write(path, json).map_err(|e| StargazerError::io(path, e))?;
    info!(path = %path.display(), records = records.len(), "wrote JSON snapshot");
    Ok(())
}

/// Write records as CSV. Embedded newlines are flattened to spaces so
/// each record stays on one row for spreadsheet consumers.
pub fn write_csv(path: &Path, records: &[UserRecord]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| StargazerError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);

    for record in records {
        let flat = flatten_newlines(record)?;
        writer
            .serialize(&flat)
            .map_err(|e| StargazerError::validation(format!("csv serialize: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| StargazerError::io(path, e))?;
    info!(path = %path.display(), records = records.len(), "wrote CSV snapshot");
    Ok(())
}

/// Write records in the format implied by the path's extension.
pub fn write_records(path: &Path, records: &[UserRecord]) -> Result<()> {
    if is_csv(path) {
        write_csv(path, records)
    } else {
        write_json(path, records)
    }
}

/// Load records from JSON or CSV, chosen by the path's extension.
pub fn load_records(path: &Path) -> Result<Vec<UserRecord>> {
    if is_csv(path) {
        let file = std::fs::File::open(path).map_err(|e| StargazerError::io(path, e))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: UserRecord = row.map_err(|e| {
                StargazerError::validation(format!("{}: bad csv row: {e}", path.display()))
            })?;
            records.push(record);
        }
        Ok(records)
    } else {
        let body = std::fs::read_to_string(path).map_err(|e| StargazerError::io(path, e))?;
        serde_json::from_str(&body).map_err(|e| {
            StargazerError::validation(format!("{}: bad record file: {e}", path.display()))
        })
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Fields that are omitted from JSON until a pass fills them. CSV rows
/// need every column present, so absent values become empty strings.
const OPTIONAL_COLUMNS: [&str; 5] = [
    "linkedin_url",
    "linkedin_url_guess",
    "linkedin_profile_text",
    "linkedin_connection_degree",
    "linkedin_url_openai",
];

/// Round-trip through JSON to rewrite every string field without embedded
/// line breaks and to pin a uniform column set. Keeps this future-proof
/// against new record fields.
fn flatten_newlines(record: &UserRecord) -> Result<UserRecord> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| StargazerError::validation(format!("serialize record: {e}")))?;
    if let Value::Object(obj) = &mut value {
        for field in obj.values_mut() {
            if let Value::String(s) = field {
                if s.contains(['\n', '\r']) {
                    // CR is stripped so CRLF collapses to a single space.
                    *field = Value::String(s.replace('\r', "").replace('\n', " "));
                }
            }
        }
        for column in OPTIONAL_COLUMNS {
            obj.entry(column).or_insert_with(|| Value::String(String::new()));
        }
    }
    serde_json::from_value(value)
        .map_err(|e| StargazerError::validation(format!("rebuild record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stargazer-snap-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn record(username: &str, bio: Option<&str>) -> UserRecord {
        UserRecord {
            username: username.into(),
            bio: bio.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn json_round_trip() {
        let dir = temp_dir("json");
        let path = dir.join("batch.json");
        let records = vec![record("alpha", None), record("beta", Some("hi"))];

        write_records(&path, &records).expect("write");
        let loaded = load_records(&path).expect("load");
        assert_eq!(loaded, records);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn csv_flattens_newlines() {
        let dir = temp_dir("csv");
        let path = dir.join("batch.csv");
        let records = vec![record("alpha", Some("line one\nline two\r\nline three"))];

        write_records(&path, &records).expect("write");
        let loaded = load_records(&path).expect("load");
        assert_eq!(
            loaded[0].bio.as_deref(),
            Some("line one line two line three")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_records(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(matches!(err, StargazerError::Io { .. }));
    }
}
