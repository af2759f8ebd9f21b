//! GitHub profile enrichment pass: star events → full user records.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use stargazer_github::{GithubClient, GithubUser};
use stargazer_shared::{Result, StarEvent, StargazerError, UserRecord};

use crate::checkpoint::CheckpointWriter;
use crate::progress::PassProgress;
use crate::SharedBatch;

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Fixed delay after each successful profile lookup.
    pub politeness: Duration,
    /// Backoff after a transport failure before moving on.
    pub item_backoff: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            politeness: Duration::from_millis(500),
            item_backoff: Duration::from_secs(1),
        }
    }
}

/// Build minimal records straight from star events, for runs that skip
/// the per-user profile lookups.
pub fn records_from_events(events: &[StarEvent]) -> Vec<UserRecord> {
    events
        .iter()
        .map(|event| UserRecord {
            username: event.user.login.clone(),
            starred_at: event.starred_at,
            avatar_url: event.user.avatar_url.clone(),
            html_url: event.user.html_url.clone(),
            ..Default::default()
        })
        .collect()
}

fn record_from_profile(user: GithubUser, event: &StarEvent) -> UserRecord {
    UserRecord {
        username: user.login,
        name: user.name,
        company: user.company,
        blog: user.blog,
        location: user.location,
        email: user.email,
        bio: user.bio,
        twitter_username: user.twitter_username,
        public_repos: user.public_repos,
        followers: user.followers,
        following: user.following,
        created_at: user.created_at,
        starred_at: event.starred_at,
        avatar_url: user.avatar_url,
        html_url: user.html_url,
        ..Default::default()
    }
}

/// Fetch the full profile for every star event, accumulating into the
/// shared batch so an interrupted run keeps its partial results.
///
/// Per-user failures degrade rather than abort: a missing or blocked
/// profile is skipped, a transport failure is skipped after a short
/// backoff. Only credential failures stop the pass.
#[instrument(skip_all, fields(events = events.len()))]
pub async fn enrich_profiles(
    client: &GithubClient,
    events: &[StarEvent],
    batch: &SharedBatch,
    checkpoint: &CheckpointWriter,
    progress: &dyn PassProgress,
    opts: &EnrichOptions,
) -> Result<()> {
    progress.phase("Enriching stargazer profiles");
    let total = events.len();

    for (i, event) in events.iter().enumerate() {
        let login = event.user.login.as_str();
        if login.is_empty() {
            warn!(index = i, "star event without a login, skipping");
            continue;
        }
        progress.item(i + 1, total, login);

        match client.user(login).await {
            Ok((user, rate)) => {
                push(batch, record_from_profile(user, event));
                // Checkpoint cadence follows the enriched record count, not
                // the input index, so skipped users never shift the interval.
                let snapshot = crate::drain_shared_batch(batch);
                checkpoint.maybe_write(&snapshot, snapshot.len());

                if let Some(wait) = rate.sleep_duration(Utc::now()) {
                    progress.note(&format!(
                        "rate limit reached, waiting {}s",
                        wait.as_secs()
                    ));
                    tokio::time::sleep(wait).await;
                }
                tokio::time::sleep(opts.politeness).await;
            }
            Err(e @ StargazerError::Auth(_)) => return Err(e),
            Err(e @ (StargazerError::NotFound(_) | StargazerError::Api { .. })) => {
                warn!(login, error = %e, "profile unavailable, skipping user");
            }
            Err(e) => {
                warn!(login, error = %e, "profile lookup failed, skipping user");
                tokio::time::sleep(opts.item_backoff).await;
            }
        }
    }

    info!(
        records = crate::drain_shared_batch(batch).len(),
        "profile enrichment complete"
    );
    Ok(())
}

fn push(batch: &SharedBatch, record: UserRecord) {
    if let Ok(mut guard) = batch.lock() {
        guard.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use serde_json::json;
    use stargazer_shared::StarUser;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(login: &str) -> StarEvent {
        StarEvent {
            starred_at: None,
            user: StarUser {
                login: login.into(),
                avatar_url: None,
                html_url: Some(format!("https://github.com/{login}")),
            },
        }
    }

    fn profile_body(login: &str, name: &str) -> serde_json::Value {
        json!({
            "login": login,
            "name": name,
            "company": "@acme",
            "blog": "",
            "location": null,
            "email": null,
            "bio": null,
            "twitter_username": null,
            "public_repos": 5,
            "followers": 10,
            "following": 2,
            "created_at": "2020-01-01T00:00:00Z",
            "avatar_url": format!("https://avatars.example/{login}"),
            "html_url": format!("https://github.com/{login}")
        })
    }

    fn fast_opts() -> EnrichOptions {
        EnrichOptions {
            politeness: Duration::ZERO,
            item_backoff: Duration::ZERO,
        }
    }

    fn noop_checkpoint() -> CheckpointWriter {
        CheckpointWriter::new("/nonexistent-stargazer-dir", "test", "", usize::MAX)
    }

    #[tokio::test]
    async fn unavailable_profiles_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("alpha", "Alpha")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/beta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("beta", "Beta")))
            .mount(&server)
            .await;

        let client = GithubClient::new(server.uri(), None).expect("client");
        let batch = crate::new_shared_batch();
        enrich_profiles(
            &client,
            &[event("alpha"), event("gone"), event("beta")],
            &batch,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await
        .expect("pass");

        let records = crate::drain_shared_batch(&batch);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].username, "alpha");
        assert_eq!(records[0].name.as_deref(), Some("Alpha"));
        assert_eq!(records[1].username, "beta");
    }

    #[tokio::test]
    async fn auth_failure_is_fatal_but_keeps_partials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("alpha", "Alpha")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/beta"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = GithubClient::new(server.uri(), None).expect("client");
        let batch = crate::new_shared_batch();
        let err = enrich_profiles(
            &client,
            &[event("alpha"), event("beta")],
            &batch,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StargazerError::Auth(_)));
        // The accumulator still holds everything processed before the failure.
        assert_eq!(crate::drain_shared_batch(&batch).len(), 1);
    }

    #[tokio::test]
    async fn transport_failures_leave_no_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("alpha", "Alpha")))
            .mount(&server)
            .await;
        // A 200 with an unparseable body surfaces as a transport failure.
        Mock::given(method("GET"))
            .and(path("/users/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/beta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("beta", "Beta")))
            .mount(&server)
            .await;

        let client = GithubClient::new(server.uri(), None).expect("client");
        let batch = crate::new_shared_batch();
        enrich_profiles(
            &client,
            &[event("alpha"), event("flaky"), event("beta")],
            &batch,
            &noop_checkpoint(),
            &SilentProgress,
            &fast_opts(),
        )
        .await
        .expect("pass");

        let records = crate::drain_shared_batch(&batch);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.username != "flaky"));
    }

    #[tokio::test]
    async fn checkpoints_follow_the_enriched_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("alpha", "Alpha")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/beta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("beta", "Beta")))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("stargazer-enrich-ckpt-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");

        let client = GithubClient::new(server.uri(), None).expect("client");
        let batch = crate::new_shared_batch();
        // The skipped 404 sits between the two successes; the checkpoint at
        // interval 2 must still fire once the second record lands.
        enrich_profiles(
            &client,
            &[event("alpha"), event("gone"), event("beta")],
            &batch,
            &CheckpointWriter::new(&dir, "test", "", 2),
            &SilentProgress,
            &fast_opts(),
        )
        .await
        .expect("pass");

        let checkpoints = std::fs::read_dir(&dir).expect("read dir").count();
        assert_eq!(checkpoints, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn skip_enrichment_records_carry_event_fields() {
        let records = records_from_events(&[event("alpha")]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alpha");
        assert_eq!(
            records[0].html_url.as_deref(),
            Some("https://github.com/alpha")
        );
        assert!(records[0].name.is_none());
    }
}
