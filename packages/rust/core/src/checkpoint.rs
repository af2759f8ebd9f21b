//! Periodic checkpoint snapshots during long-running passes.
//!
//! A checkpoint failure must never stop a pass: the batch lives in memory
//! and will be written again at the next interval or at the end.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use stargazer_shared::{file_timestamp, UserRecord};

/// Writes `{prefix}_temp{suffix}_{timestamp}.json` every `interval`
/// processed items.
pub struct CheckpointWriter {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    interval: usize,
}

impl CheckpointWriter {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        interval: usize,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            interval: interval.max(1),
        }
    }

    /// Write a checkpoint if `processed` has reached a multiple of the
    /// interval. Returns the written path when a file was produced.
    pub fn maybe_write(&self, records: &[UserRecord], processed: usize) -> Option<PathBuf> {
        if processed == 0 || processed % self.interval != 0 {
            return None;
        }
        self.write_now(records)
    }

    /// Write a checkpoint unconditionally. Failures are logged, not raised.
    pub fn write_now(&self, records: &[UserRecord]) -> Option<PathBuf> {
        let path = self.dir.join(format!(
            "{}_temp{}_{}.json",
            self.prefix,
            self.suffix,
            file_timestamp()
        ));
        match write_checkpoint_file(&path, records) {
            Ok(()) => {
                debug!(path = %path.display(), records = records.len(), "checkpoint written");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "checkpoint write failed, continuing");
                None
            }
        }
    }
}

fn write_checkpoint_file(path: &Path, records: &[UserRecord]) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
}
