//! LLM-assisted LinkedIn lookup pass.
//!
//! Runs after the cheaper passes and only touches records they left
//! unresolved. A lookup that comes back empty writes an empty-string
//! marker so a re-run with `skip_existing` does not pay for it again.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use stargazer_linkedin::LlmFinder;
use stargazer_shared::UserRecord;

use crate::checkpoint::CheckpointWriter;
use crate::progress::PassProgress;

#[derive(Debug, Clone)]
pub struct LlmPassOptions {
    /// Skip records that already carry a LinkedIn URL from any pass,
    /// including a previous LLM run's empty-string marker.
    pub skip_existing: bool,
    /// Delay between requests.
    pub request_delay: Duration,
    /// Backoff after a failed request before moving on.
    pub error_backoff: Duration,
    /// Stop after this many actual requests.
    pub limit: Option<usize>,
}

impl Default for LlmPassOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            request_delay: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
            limit: None,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct LlmPassStats {
    pub asked: usize,
    pub found: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Ask the model for a profile URL for every record still missing one,
/// filling `linkedin_url_openai` in place. Request failures are logged
/// and skipped; the pass always runs to the end of the slice.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn llm_find_profiles(
    finder: &LlmFinder,
    records: &mut [UserRecord],
    checkpoint: &CheckpointWriter,
    progress: &dyn PassProgress,
    opts: &LlmPassOptions,
) -> LlmPassStats {
    progress.phase("Looking up profiles with the LLM");
    let mut stats = LlmPassStats::default();
    let total = records.len();

    for i in 0..total {
        if opts.limit.is_some_and(|l| stats.asked >= l) {
            info!(limit = ?opts.limit, "reached request limit");
            break;
        }
        progress.item(i + 1, total, &records[i].username);

        let name = records[i].name.clone().unwrap_or_default();
        let already_answered =
            records[i].has_linkedin() || records[i].linkedin_url_openai.is_some();
        if name.trim().is_empty() || (opts.skip_existing && already_answered) {
            stats.skipped += 1;
            continue;
        }

        let company = records[i].company.clone().unwrap_or_default();
        stats.asked += 1;

        match finder.find_profile(&name, &company).await {
            Ok(Some(url)) => {
                stats.found += 1;
                records[i].linkedin_url_openai = Some(url);
            }
            Ok(None) => {
                // Empty-string marker: answered, nothing found.
                debug!(username = %records[i].username, "no profile per model");
                records[i].linkedin_url_openai = Some(String::new());
            }
            Err(e) => {
                stats.errors += 1;
                warn!(username = %records[i].username, error = %e, "LLM lookup failed, skipping");
                tokio::time::sleep(opts.error_backoff).await;
            }
        }

        checkpoint.maybe_write(&records[..=i], stats.asked);
        tokio::time::sleep(opts.request_delay).await;
    }

    info!(
        asked = stats.asked,
        found = stats.found,
        skipped = stats.skipped,
        errors = stats.errors,
        "LLM pass complete"
    );
    stats
}
