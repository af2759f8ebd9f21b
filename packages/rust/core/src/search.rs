//! Browser-based LinkedIn search pass.
//!
//! Works through a [`ProfileSearcher`] so the pass logic is independent of
//! the live browser. Search engines throttle aggressively, so the pass
//! paces itself with randomized delays and escalates to the operator after
//! a run of consecutive failures instead of hammering on.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use stargazer_linkedin::{build_search_query, ProfileSearcher};
use stargazer_shared::{OperatorGate, UserRecord};

use crate::checkpoint::CheckpointWriter;
use crate::progress::PassProgress;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Randomized delay bounds between lookups, in seconds.
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Extra cool-off after a failed lookup.
    pub error_delay: Duration,
    /// Consecutive failures before asking the operator whether to go on.
    pub max_consecutive_errors: usize,
    /// Stop after this many actual lookups.
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_delay_secs: 2,
            max_delay_secs: 5,
            error_delay: Duration::from_secs(5),
            max_consecutive_errors: 5,
            limit: None,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SearchStats {
    pub searched: usize,
    pub found: usize,
    pub skipped: usize,
    pub errors: usize,
    /// True when the operator chose to stop after repeated failures.
    pub stopped_early: bool,
}

/// Search for a profile for every record that has a display name and no
/// LinkedIn URL yet, filling `linkedin_url_guess` (and, with a logged-in
/// session, profile text and connection degree) in place.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn search_profiles(
    searcher: &dyn ProfileSearcher,
    gate: &dyn OperatorGate,
    records: &mut [UserRecord],
    checkpoint: &CheckpointWriter,
    progress: &dyn PassProgress,
    opts: &SearchOptions,
) -> SearchStats {
    progress.phase("Searching for LinkedIn profiles");
    let mut stats = SearchStats::default();
    let mut consecutive_errors = 0usize;
    let total = records.len();

    for i in 0..total {
        if opts.limit.is_some_and(|l| stats.searched >= l) {
            info!(limit = ?opts.limit, "reached lookup limit");
            break;
        }
        {
            let record = &records[i];
            progress.item(i + 1, total, &record.username);

            let name = record.name.as_deref().unwrap_or("").trim();
            if record.has_linkedin() || name.is_empty() {
                stats.skipped += 1;
                continue;
            }
        }

        let (name, company) = {
            let record = &records[i];
            (
                record.name.clone().unwrap_or_default(),
                record.company.clone(),
            )
        };
        let query = build_search_query(&name, company.as_deref());
        stats.searched += 1;

        match searcher.find_profile_link(&query).await {
            Ok(Some(url)) => {
                consecutive_errors = 0;
                stats.found += 1;
                records[i].linkedin_url_guess = Some(url.clone());

                if searcher.is_logged_in() {
                    match searcher.extract_profile(&url).await {
                        Ok(profile) => {
                            records[i].linkedin_profile_text = profile.about;
                            records[i].linkedin_connection_degree = profile.degree;
                        }
                        Err(e) => {
                            warn!(username = %records[i].username, error = %e, "profile extraction failed");
                        }
                    }
                }
            }
            Ok(None) => {
                // An empty result page is also what a silent block looks
                // like, so it counts toward the escalation threshold.
                consecutive_errors += 1;
                debug!(username = %records[i].username, "no profile found");
            }
            Err(e) => {
                consecutive_errors += 1;
                stats.errors += 1;
                warn!(
                    username = %records[i].username,
                    error = %e,
                    consecutive = consecutive_errors,
                    "search failed"
                );
                // Keep the failure visible in the record itself.
                records[i].linkedin_profile_text = Some(format!("Error: {e}"));
                tokio::time::sleep(opts.error_delay).await;
            }
        }

        if consecutive_errors >= opts.max_consecutive_errors {
            progress.note("repeated search failures, asking operator");
            let keep_going = gate.confirm_continue(&format!(
                "{consecutive_errors} lookups in a row came back empty or failed. \
                 The search engine may be blocking this session. Continue anyway?"
            ));
            if !keep_going {
                stats.stopped_early = true;
                warn!(processed = i + 1, total, "search pass stopped by operator");
                break;
            }
            consecutive_errors = 0;
        }

        checkpoint.maybe_write(&records[..=i], stats.searched);

        let delay = rand::thread_rng().gen_range(opts.min_delay_secs..=opts.max_delay_secs);
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    info!(
        searched = stats.searched,
        found = stats.found,
        skipped = stats.skipped,
        errors = stats.errors,
        "search pass complete"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stargazer_linkedin::ProfileInfo;
    use stargazer_shared::{GateCommand, Result, StargazerError};

    use crate::progress::SilentProgress;

    /// Scripted searcher: pops one outcome per lookup.
    struct ScriptedSearcher {
        outcomes: Mutex<Vec<Result<Option<String>>>>,
        logged_in: bool,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedSearcher {
        fn new(outcomes: Vec<Result<Option<String>>>, logged_in: bool) -> Self {
            let mut outcomes = outcomes;
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                logged_in,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProfileSearcher for ScriptedSearcher {
        async fn find_profile_link(&self, query: &str) -> Result<Option<String>> {
            self.queries.lock().unwrap().push(query.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(None))
        }

        async fn extract_profile(&self, _url: &str) -> Result<ProfileInfo> {
            Ok(ProfileInfo {
                about: Some("builds things".into()),
                degree: Some("2nd".into()),
            })
        }

        fn is_logged_in(&self) -> bool {
            self.logged_in
        }
    }

    /// Gate that refuses to continue past repeated failures.
    struct RefusingGate;

    impl OperatorGate for RefusingGate {
        fn await_manual_step(&self, _instructions: &str) -> GateCommand {
            GateCommand::Abort
        }
        fn confirm_continue(&self, _warning: &str) -> bool {
            false
        }
    }

    fn record(username: &str, name: Option<&str>) -> UserRecord {
        UserRecord {
            username: username.into(),
            name: name.map(Into::into),
            ..Default::default()
        }
    }

    fn fast_opts() -> SearchOptions {
        SearchOptions {
            min_delay_secs: 0,
            max_delay_secs: 0,
            error_delay: Duration::ZERO,
            max_consecutive_errors: 2,
            limit: None,
        }
    }

    fn noop_checkpoint() -> CheckpointWriter {
        CheckpointWriter::new("/nonexistent-stargazer-dir", "test", "", usize::MAX)
    }

    #[tokio::test]
    async fn fills_guess_and_profile_when_logged_in() {
        let searcher = ScriptedSearcher::new(
            vec![Ok(Some("https://linkedin.com/in/alpha".into()))],
            true,
        );
        let mut records = vec![record("alpha", Some("Alpha One"))];

        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await;

        assert_eq!(stats.found, 1);
        assert_eq!(
            records[0].linkedin_url_guess.as_deref(),
            Some("https://linkedin.com/in/alpha")
        );
        assert_eq!(
            records[0].linkedin_profile_text.as_deref(),
            Some("builds things")
        );
        assert_eq!(records[0].linkedin_connection_degree.as_deref(), Some("2nd"));
    }

    #[tokio::test]
    async fn skips_named_and_already_matched_records() {
        let searcher = ScriptedSearcher::new(vec![Ok(None)], false);
        let mut records = vec![
            record("no-name", None),
            UserRecord {
                linkedin_url: Some("https://linkedin.com/in/done".into()),
                ..record("done", Some("Done Already"))
            },
            record("searched", Some("Search Me")),
        ];

        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await;

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.searched, 1);
        assert_eq!(searcher.queries.lock().unwrap().as_slice(), ["Search Me"]);
    }

    #[tokio::test]
    async fn company_is_part_of_the_query() {
        let searcher = ScriptedSearcher::new(vec![Ok(None)], false);
        let mut records = vec![UserRecord {
            company: Some("@AcmeCorp".into()),
            ..record("alpha", Some("Alpha One"))
        }];

        search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await;

        assert_eq!(
            searcher.queries.lock().unwrap().as_slice(),
            ["Alpha One AcmeCorp"]
        );
    }

    #[tokio::test]
    async fn repeated_errors_stop_the_pass_when_operator_refuses() {
        let fail = || Err(StargazerError::Browser("blocked".into()));
        let searcher = ScriptedSearcher::new(vec![fail(), fail(), fail(), fail()], false);
        let mut records = vec![
            record("a", Some("A")),
            record("b", Some("B")),
            record("c", Some("C")),
            record("d", Some("D")),
        ];

        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await;

        // max_consecutive_errors is 2, so the gate fires after the second
        // failure and the last two records are never attempted.
        assert!(stats.stopped_early);
        assert_eq!(stats.searched, 2);
        assert_eq!(stats.errors, 2);
        assert_eq!(searcher.outcomes.lock().unwrap().len(), 2);
        assert_eq!(
            records[0].linkedin_profile_text.as_deref(),
            Some("Error: browser error: blocked")
        );
    }

    #[tokio::test]
    async fn empty_results_escalate_to_the_operator() {
        // A blocked session shows up as zero-result pages, not errors.
        let searcher = ScriptedSearcher::new(vec![Ok(None), Ok(None), Ok(None)], false);
        let mut records = vec![
            record("a", Some("A")),
            record("b", Some("B")),
            record("c", Some("C")),
        ];

        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await;

        assert!(stats.stopped_early);
        assert_eq!(stats.searched, 2);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn checkpoints_follow_the_lookup_count() {
        let dir = std::env::temp_dir().join(format!("stargazer-search-ckpt-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");

        let found = |slug: &str| Ok(Some(format!("https://linkedin.com/in/{slug}")));
        let searcher = ScriptedSearcher::new(
            vec![found("a"), found("b"), found("c"), found("d"), found("e")],
            false,
        );
        // Two skips sit between the five real lookups; the checkpoint at
        // interval 5 must key off the lookup count, not the input index.
        let mut records = vec![
            record("a", Some("A")),
            record("b", Some("B")),
            record("skip-no-name", None),
            record("c", Some("C")),
            record("d", Some("D")),
            UserRecord {
                linkedin_url: Some("https://linkedin.com/in/done".into()),
                ..record("skip-done", Some("Done Already"))
            },
            record("e", Some("E")),
        ];

        let opts = SearchOptions {
            max_consecutive_errors: 10,
            ..fast_opts()
        };
        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &CheckpointWriter::new(&dir, "test", "", 5),
            &SilentProgress,
            &opts,
        )
        .await;

        assert_eq!(stats.searched, 5);
        assert_eq!(std::fs::read_dir(&dir).expect("read dir").count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn lookup_limit_stops_the_pass() {
        let searcher = ScriptedSearcher::new(vec![Ok(None), Ok(None), Ok(None)], false);
        let mut records = vec![
            record("a", Some("A")),
            record("b", Some("B")),
            record("c", Some("C")),
        ];

        let opts = SearchOptions {
            limit: Some(2),
            max_consecutive_errors: 10,
            ..fast_opts()
        };
        let stats = search_profiles(
            &searcher,
            &RefusingGate,
            &mut records,
            &noop_checkpoint(),
            &SilentProgress,
            &opts,
        )
        .await;

        assert_eq!(stats.searched, 2);
    }
}
