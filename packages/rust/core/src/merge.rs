//! Merging per-batch result files into one collection.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use stargazer_shared::{file_timestamp, Result, StargazerError, UserRecord};

use crate::snapshot;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Glob pattern selecting the batch files, e.g.
    /// `stargazers_enriched_batch_*.json`.
    pub pattern: String,
    /// Prefix for the merged output file.
    pub output_prefix: String,
    /// Plain concatenation instead of keyed de-duplication.
    pub concat: bool,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub output_path: PathBuf,
    pub files_merged: usize,
    pub records_in: usize,
    pub records_out: usize,
}

/// Merge every file matching the pattern into
/// `{output_prefix}_merged_{timestamp}.json`.
///
/// Files are processed in sorted path order. By default records are keyed
/// by username: a later file's record replaces an earlier one wholesale,
/// while the username keeps its first-seen position. With `concat` the
/// inputs are appended verbatim, duplicates included.
///
/// Returns `Ok(None)` when the pattern matches nothing; no output file is
/// created in that case.
pub fn merge_batches(opts: &MergeOptions) -> Result<Option<MergeOutcome>> {
    let mut paths: Vec<PathBuf> = glob::glob(&opts.pattern)
        .map_err(|e| StargazerError::validation(format!("bad glob pattern: {e}")))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "unreadable glob entry skipped");
                None
            }
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        info!(pattern = %opts.pattern, "no files matched, nothing to merge");
        return Ok(None);
    }

    let mut files_merged = 0usize;
    let mut records_in = 0usize;
    let mut merged: Vec<UserRecord> = Vec::new();
    // username -> position in `merged`
    let mut seen: HashMap<String, usize> = HashMap::new();

    for path in &paths {
        // One bad file must not sink the rest of the merge.
        let batch = match snapshot::load_records(path) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable batch file");
                continue;
            }
        };
        info!(path = %path.display(), records = batch.len(), "merging batch file");
        files_merged += 1;
        records_in += batch.len();

        for record in batch {
            if opts.concat {
                merged.push(record);
            } else if let Some(&idx) = seen.get(&record.username) {
                merged[idx] = record;
            } else {
                seen.insert(record.username.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    let output_path = PathBuf::from(format!(
        "{}_merged_{}.json",
        opts.output_prefix,
        file_timestamp()
    ));
    snapshot::write_json(&output_path, &merged)?;

    Ok(Some(MergeOutcome {
        output_path,
        files_merged,
        records_in,
        records_out: merged.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn temp_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("stargazer-merge-{name}-{}", std::process::id()));
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

    fn write_batch(dir: &Path, name: &str, records: &[UserRecord]) {
        snapshot::write_json(&dir.join(name), records).expect("write batch");
    }

    #[test]
    fn keyed_merge_last_file_wins() {
        let dir = temp_dir("keyed");
        write_batch(
            &dir,
            "out_batch_1.json",
            &[record("alpha", Some("old")), record("beta", None)],
        );
        write_batch(
            &dir,
            "out_batch_2.json",
            &[record("alpha", Some("new")), record("gamma", None)],
        );

        let opts = MergeOptions {
            pattern: dir.join("out_batch_*.json").to_string_lossy().into_owned(),
            output_prefix: dir.join("out").to_string_lossy().into_owned(),
            concat: false,
        };
        let outcome = merge_batches(&opts).expect("merge").expect("matched files");
        assert_eq!(outcome.files_merged, 2);
        assert_eq!(outcome.records_in, 4);
        assert_eq!(outcome.records_out, 3);

        let merged = snapshot::load_records(&outcome.output_path).expect("load merged");
        // alpha keeps its first-seen position but carries the later record.
        assert_eq!(merged[0].username, "alpha");
        assert_eq!(merged[0].bio.as_deref(), Some("new"));
        assert_eq!(merged[1].username, "beta");
        assert_eq!(merged[2].username, "gamma");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concat_keeps_duplicates_in_file_order() {
        let dir = temp_dir("concat");
        write_batch(&dir, "out_batch_1.json", &vec![record("alpha", None); 3]);
        write_batch(
            &dir,
            "out_batch_2.json",
            &(0..5).map(|i| record(&format!("u{i}"), None)).collect::<Vec<_>>(),
        );

        let opts = MergeOptions {
            pattern: dir.join("out_batch_*.json").to_string_lossy().into_owned(),
            output_prefix: dir.join("out").to_string_lossy().into_owned(),
            concat: true,
        };
        let outcome = merge_batches(&opts).expect("merge").expect("matched files");
        assert_eq!(outcome.records_out, 8);

        let merged = snapshot::load_records(&outcome.output_path).expect("load merged");
        assert_eq!(merged[0].username, "alpha");
        assert_eq!(merged[3].username, "u0");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_skipped_not_fatal() {
        let dir = temp_dir("corrupt");
        write_batch(&dir, "out_batch_1.json", &[record("alpha", None)]);
        std::fs::write(dir.join("out_batch_2.json"), "{ not json").expect("write corrupt file");
        write_batch(&dir, "out_batch_3.json", &[record("beta", None)]);

        let opts = MergeOptions {
            pattern: dir.join("out_batch_*.json").to_string_lossy().into_owned(),
            output_prefix: dir.join("out").to_string_lossy().into_owned(),
            concat: false,
        };
        let outcome = merge_batches(&opts).expect("merge").expect("matched files");
        assert_eq!(outcome.files_merged, 2);
        assert_eq!(outcome.records_out, 2);

        let merged = snapshot::load_records(&outcome.output_path).expect("load merged");
        assert_eq!(merged[0].username, "alpha");
        assert_eq!(merged[1].username, "beta");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_matches_writes_nothing() {
        let dir = temp_dir("empty");
        let opts = MergeOptions {
            pattern: dir.join("nope_*.json").to_string_lossy().into_owned(),
            output_prefix: dir.join("out").to_string_lossy().into_owned(),
            concat: false,
        };
        assert!(merge_batches(&opts).expect("merge").is_none());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
