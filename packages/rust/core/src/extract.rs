//! LinkedIn URL extraction pass over already-enriched records.
//!
//! The cheap pass scans the record's own text fields. The optional deep
//! pass additionally fetches the user's GitHub profile page and profile
//! README and scans their HTML, catching links that only live in a
//! rendered README.

use tracing::{debug, info, instrument, warn};

use stargazer_linkedin::{extract_linkedin_url, find_in_text};
use stargazer_shared::UserRecord;

use crate::progress::PassProgress;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Also fetch and scan profile pages for records with no field match.
    pub deep: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct ExtractStats {
    pub scanned: usize,
    pub matched: usize,
    pub deep_matched: usize,
    pub already_present: usize,
}

/// Scan every record for LinkedIn URLs, filling `linkedin_url` in place.
/// Records that already carry a URL are left untouched.
#[instrument(skip_all, fields(records = records.len(), deep = opts.deep))]
pub async fn extract_urls(
    records: &mut [UserRecord],
    http: &reqwest::Client,
    opts: &ExtractOptions,
    progress: &dyn PassProgress,
) -> ExtractStats {
    progress.phase("Extracting LinkedIn URLs from profile fields");
    let mut stats = ExtractStats::default();
    let total = records.len();

    for (i, record) in records.iter_mut().enumerate() {
        progress.item(i + 1, total, &record.username);

        if record.has_linkedin() {
            stats.already_present += 1;
            continue;
        }
        stats.scanned += 1;

        if let Some(url) = extract_linkedin_url(
            record.bio.as_deref(),
            record.blog.as_deref(),
            record.company.as_deref(),
        ) {
            debug!(username = %record.username, %url, "field match");
            record.linkedin_url = Some(url);
            stats.matched += 1;
            continue;
        }

        if opts.deep {
            if let Some(url) = deep_scan(http, record).await {
                debug!(username = %record.username, %url, "deep match");
                record.linkedin_url = Some(url);
                stats.matched += 1;
                stats.deep_matched += 1;
            }
        }
    }

    info!(
        scanned = stats.scanned,
        matched = stats.matched,
        deep = stats.deep_matched,
        "extraction pass complete"
    );
    stats
}

/// Fetch the profile page, then the profile README repository, and scan
/// each body. Fetch failures are non-fatal; the record just stays unmatched.
async fn deep_scan(http: &reqwest::Client, record: &UserRecord) -> Option<String> {
    let mut urls = Vec::new();
    if let Some(html_url) = &record.html_url {
        urls.push(html_url.clone());
        urls.push(format!("{html_url}/{}", record.username));
    }

    for url in urls {
        match fetch_body(http, &url).await {
            Ok(Some(body)) => {
                if let Some(found) = find_in_text(&body) {
                    return Some(found);
                }
            }
            Ok(None) => debug!(%url, "page not available"),
            Err(e) => warn!(%url, error = %e, "deep scan fetch failed"),
        }
    }
    None
}

async fn fetch_body(http: &reqwest::Client, url: &str) -> reqwest::Result<Option<String>> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Ok(None);
    }
    response.text().await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(username: &str) -> UserRecord {
        UserRecord {
            username: username.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn field_matches_fill_linkedin_url() {
        let mut records = vec![
            UserRecord {
                bio: Some("reach me at linkedin.com/in/alpha".into()),
                ..record("alpha")
            },
            UserRecord {
                blog: Some("https://example.com".into()),
                ..record("beta")
            },
            UserRecord {
                linkedin_url: Some("https://linkedin.com/in/gamma".into()),
                ..record("gamma")
            },
        ];

        let http = reqwest::Client::new();
        let stats = extract_urls(
            &mut records,
            &http,
            &ExtractOptions::default(),
            &SilentProgress,
        )
        .await;

        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.already_present, 1);
        assert_eq!(
            records[0].linkedin_url.as_deref(),
            Some("https://linkedin.com/in/alpha")
        );
        assert!(records[1].linkedin_url.is_none());
        // Pre-existing URLs are never overwritten.
        assert_eq!(
            records[2].linkedin_url.as_deref(),
            Some("https://linkedin.com/in/gamma")
        );
    }

    #[tokio::test]
    async fn deep_scan_finds_url_in_profile_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><a href=\"https://linkedin.com/in/alpha-deep\">me</a></html>",
            ))
            .mount(&server)
            .await;

        let mut records = vec![UserRecord {
            html_url: Some(format!("{}/alpha", server.uri())),
            ..record("alpha")
        }];

        let http = reqwest::Client::new();
        let stats = extract_urls(
            &mut records,
            &http,
            &ExtractOptions { deep: true },
            &SilentProgress,
        )
        .await;

        assert_eq!(stats.matched, 1);
        assert_eq!(stats.deep_matched, 1);
        assert_eq!(
            records[0].linkedin_url.as_deref(),
            Some("https://linkedin.com/in/alpha-deep")
        );
    }

    #[tokio::test]
    async fn deep_scan_failure_is_non_fatal() {
        let mut records = vec![UserRecord {
            html_url: Some("http://127.0.0.1:1/alpha".into()),
            ..record("alpha")
        }];

        let http = reqwest::Client::new();
        let stats = extract_urls(
            &mut records,
            &http,
            &ExtractOptions { deep: true },
            &SilentProgress,
        )
        .await;

        assert_eq!(stats.matched, 0);
        assert!(records[0].linkedin_url.is_none());
    }
}
