//! Pagination fetcher: stargazers endpoint → skip/limit-sliced [`StarEvent`]s.
//!
//! The fetcher pages through the endpoint one request at a time, honoring
//! the rate-limit headers and a fixed politeness delay. A snapshot mode
//! bypasses the network entirely by slicing a previously saved collection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use stargazer_shared::{Result, StarEvent, StargazerError};

use crate::client::{GithubClient, PER_PAGE, RepoRef};

/// Options for one fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Number of stargazers to skip from the start of the collection.
    pub skip: usize,
    /// Maximum number of stargazers to return. `None` means to the end.
    pub limit: Option<usize>,
    /// Path to a previously saved raw snapshot; when set, the network is
    /// bypassed and the same skip/limit slicing is applied in memory.
    pub use_existing: Option<PathBuf>,
    /// Fixed delay after every successful page fetch.
    pub politeness: Duration,
}

/// Progress callbacks for long fetches.
pub trait FetchProgress: Send + Sync {
    /// A page was fetched; `accumulated` counts events kept so far.
    fn page_fetched(&self, page: usize, accumulated: usize);
    /// The fetcher is sleeping out a rate-limit window.
    fn rate_limited(&self, wait: Duration);
}

/// No-op progress for headless/test usage.
pub struct SilentFetchProgress;

impl FetchProgress for SilentFetchProgress {
    fn page_fetched(&self, _page: usize, _accumulated: usize) {}
    fn rate_limited(&self, _wait: Duration) {}
}

/// Fetch the stargazers of `repo` covering exactly `[skip, skip+limit)`.
///
/// Stops on an empty upstream page or once `limit` events are accumulated.
/// Auth/not-found/unexpected statuses abort the run; a transport failure
/// returns whatever was accumulated so far.
pub async fn fetch_stargazers(
    client: &GithubClient,
    repo: &RepoRef,
    opts: &FetchOptions,
    progress: &dyn FetchProgress,
) -> Result<Vec<StarEvent>> {
    if let Some(path) = &opts.use_existing {
        match load_snapshot(path) {
            Ok(all) => {
                info!(path = %path.display(), total = all.len(), "loaded stargazers from snapshot");
                return Ok(slice_events(all, opts.skip, opts.limit));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot load failed, falling back to the API");
            }
        }
    }

    // Starting page and intra-page remainder from skip.
    let first_page = opts.skip / PER_PAGE + 1;
    let skip_remainder = opts.skip % PER_PAGE;

    let mut events: Vec<StarEvent> = Vec::new();
    let mut page = first_page;

    loop {
        if let Some(limit) = opts.limit {
            if events.len() >= limit {
                break;
            }
        }

        let (mut batch, rate) = match client.stargazers_page(repo, page).await {
            Ok(ok) => ok,
            Err(StargazerError::Network(e)) => {
                warn!(error = %e, accumulated = events.len(), "network error, keeping partial fetch");
                break;
            }
            Err(e) => return Err(e),
        };

        if batch.is_empty() {
            break;
        }

        // Trim the first fetched page by the intra-page remainder.
        if page == first_page && skip_remainder > 0 {
            batch.drain(..skip_remainder.min(batch.len()));
        }

        events.extend(batch);
        progress.page_fetched(page, events.len());
        page += 1;

        if let Some(limit) = opts.limit {
            if events.len() >= limit {
                info!(limit, "reached requested stargazer limit");
                break;
            }
        }

        if let Some(wait) = rate.sleep_duration(Utc::now()) {
            info!(wait_secs = wait.as_secs(), "rate limit exhausted, sleeping");
            progress.rate_limited(wait);
            tokio::time::sleep(wait).await;
        }

        // Be nice to the API between pages.
        if !opts.politeness.is_zero() {
            tokio::time::sleep(opts.politeness).await;
        }
    }

    if let Some(limit) = opts.limit {
        events.truncate(limit);
    }

    Ok(events)
}

/// Load a raw stargazer snapshot from disk.
fn load_snapshot(path: &Path) -> Result<Vec<StarEvent>> {
    let content = std::fs::read_to_string(path).map_err(|e| StargazerError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        StargazerError::validation(format!("malformed snapshot {}: {e}", path.display()))
    })
}

/// Apply the skip/limit window to an in-memory collection.
fn slice_events(all: Vec<StarEvent>, skip: usize, limit: Option<usize>) -> Vec<StarEvent> {
    let start = skip.min(all.len());
    let end = match limit {
        Some(l) => (start + l).min(all.len()),
        None => all.len(),
    };
    all.into_iter().take(end).skip(start).collect()
}
