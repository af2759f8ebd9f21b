//! HTTP client for the GitHub REST API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header::HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stargazer_shared::{Result, StarEvent, StargazerError};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("stargazer/", env!("CARGO_PKG_VERSION"));

/// Media type that makes the stargazers endpoint include starring timestamps.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.v3.star+json";

/// Stargazers page size. The endpoint caps at 100.
pub const PER_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// RepoRef
// ---------------------------------------------------------------------------

/// An `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse a repository reference from `owner/repo` or any GitHub URL form
    /// (including `…/stargazers` pages). An unparseable reference is fatal.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');

        let invalid = || {
            StargazerError::validation(format!(
                "invalid repository reference '{input}': use 'owner/repo' or a GitHub repository URL"
            ))
        };

        if trimmed.contains("github.com") {
            let mut parts: Vec<&str> = trimmed
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .split('/')
                .filter(|p| !p.is_empty() && *p != "stargazers")
                .collect();

            let host_idx = parts
                .iter()
                .position(|p| *p == "github.com" || p.ends_with(".github.com"))
                .ok_or_else(invalid)?;
            parts.drain(..=host_idx);

            match parts.as_slice() {
                [owner, name, ..] => Ok(Self {
                    owner: (*owner).to_string(),
                    name: (*name).to_string(),
                }),
                _ => Err(invalid()),
            }
        } else {
            match trimmed.split('/').collect::<Vec<_>>().as_slice() {
                [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                    owner: (*owner).to_string(),
                    name: (*name).to_string(),
                }),
                _ => Err(invalid()),
            }
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// RateLimit
// ---------------------------------------------------------------------------

/// Rate-limit state parsed from response headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimit {
    /// Remaining quota, if the header was present.
    pub remaining: Option<u64>,
    /// Unix timestamp when the quota resets.
    pub reset: Option<u64>,
}

impl RateLimit {
    /// Parse `X-RateLimit-Remaining` / `X-RateLimit-Reset` headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };
        Self {
            remaining: parse("x-ratelimit-remaining"),
            reset: parse("x-ratelimit-reset"),
        }
    }

    /// How long to sleep before the next request, given the current time.
    /// Zero remaining quota means `max(reset - now, 0) + 1` seconds;
    /// otherwise no sleep.
    pub fn sleep_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining? != 0 {
            return None;
        }
        let reset = self.reset.unwrap_or(0);
        let wait = reset.saturating_sub(now.timestamp().max(0) as u64);
        Some(Duration::from_secs(wait + 1))
    }
}

// ---------------------------------------------------------------------------
// GithubUser
// ---------------------------------------------------------------------------

/// The flat profile object from `GET /users/{login}`. Only the fields the
/// pipeline merges are kept; nulls stay nulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub twitter_username: Option<String>,
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

// ---------------------------------------------------------------------------
// GithubClient
// ---------------------------------------------------------------------------

/// GitHub REST client with optional token auth.
pub struct GithubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// Create a client against the given API base (normally
    /// `https://api.github.com`; tests point it at a mock server).
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StargazerError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("token {token}")),
            None => req,
        }
    }

    /// Fetch one page of stargazers with starring timestamps.
    ///
    /// 401, 404, and any other non-200 are fatal; a transport failure comes
    /// back as the recoverable [`StargazerError::Network`] so the caller can
    /// keep whatever it already accumulated.
    pub async fn stargazers_page(
        &self,
        repo: &RepoRef,
        page: usize,
    ) -> Result<(Vec<StarEvent>, RateLimit)> {
        let url = format!("{}/repos/{}/{}/stargazers", self.api_base, repo.owner, repo.name);
        debug!(%url, page, "fetching stargazers page");

        let response = self
            .authorize(
                self.client
                    .get(&url)
                    .header("Accept", STAR_MEDIA_TYPE)
                    .query(&[("page", page.to_string()), ("per_page", PER_PAGE.to_string())]),
            )
            .send()
            .await
            .map_err(|e| StargazerError::Network(format!("{url}: {e}")))?;

        let rate = RateLimit::from_headers(response.headers());

        match response.status() {
            StatusCode::OK => {
                let events: Vec<StarEvent> = response
                    .json()
                    .await
                    .map_err(|e| StargazerError::Network(format!("{url}: body parse: {e}")))?;
                Ok((events, rate))
            }
            StatusCode::UNAUTHORIZED => Err(StargazerError::Auth(
                "invalid token or unauthorized access".into(),
            )),
            StatusCode::NOT_FOUND => Err(StargazerError::NotFound(format!(
                "repository {repo} not found"
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StargazerError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Fetch a single user profile.
    ///
    /// 401 means the token is bad and the whole run should stop. A missing
    /// or blocked profile (404, other non-200) and transport failures are
    /// per-item recoverable for the enrichment pass.
    pub async fn user(&self, login: &str) -> Result<(GithubUser, RateLimit)> {
        let url = format!("{}/users/{login}", self.api_base);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StargazerError::Network(format!("{url}: {e}")))?;

        let rate = RateLimit::from_headers(response.headers());

        match response.status() {
            StatusCode::OK => {
                let user: GithubUser = response
                    .json()
                    .await
                    .map_err(|e| StargazerError::Network(format!("{url}: body parse: {e}")))?;
                Ok((user, rate))
            }
            StatusCode::UNAUTHORIZED => Err(StargazerError::Auth(
                "invalid token or unauthorized access".into(),
            )),
            StatusCode::NOT_FOUND => Err(StargazerError::NotFound(format!("user {login} not found"))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StargazerError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
