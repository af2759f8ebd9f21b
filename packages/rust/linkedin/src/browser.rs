//! Browser-automation profile search via chromiumoxide.
//!
//! One [`BrowserSession`] per enrichment pass: a single Chromium instance
//! with two persistent pages — one for search-engine queries and one that
//! holds the logged-in LinkedIn session across lookups. The session is
//! created before the pass, reused for every record, and explicitly shut
//! down on both the normal and error paths.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stargazer_shared::{GateCommand, GateState, OperatorGate, Result, StargazerError};

/// Browser viewport and UA kept plain to look like a regular desktop session.
const VIEWPORT: (u32, u32) = (1920, 1080);

/// Settle time after navigations; LinkedIn and the search page both load
/// content dynamically after domcontentloaded.
const SETTLE: Duration = Duration::from_secs(2);

const MANUAL_LOGIN_INSTRUCTIONS: &str = "\
A browser window is open on linkedin.com. Please:
  1. Enter your credentials
  2. Complete any verification steps and CAPTCHA
  3. Wait until you can see your LinkedIn homepage/feed
Leave the window open for the entire run.";

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// "About" text and connection degree scraped from a profile page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileInfo {
    pub about: Option<String>,
    pub degree: Option<String>,
}

/// Narrow seam over the fragile scraping layer. The enrichment loop only
/// knows how to ask for a profile link and a profile body; the selector
/// details (and test fakes) live behind this trait.
#[async_trait]
pub trait ProfileSearcher: Send + Sync {
    /// Search for a personal-profile link matching `query`.
    /// `Ok(None)` means no result, which is a normal outcome.
    async fn find_profile_link(&self, query: &str) -> Result<Option<String>>;

    /// Visit a profile URL and extract what the session can see.
    async fn extract_profile(&self, url: &str) -> Result<ProfileInfo>;

    /// Whether the session holds an authenticated LinkedIn login.
    fn is_logged_in(&self) -> bool;
}

/// How to establish the LinkedIn session.
#[derive(Debug, Clone)]
pub enum LoginMethod {
    /// No login: profile links only, no about-text or degree.
    None,
    /// Operator drives the whole login in the visible browser window.
    Manual,
    /// Automated credential fill, with the operator handling verification.
    Credentials { username: String, password: String },
}

/// Options for launching a [`BrowserSession`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Allow the operator to resolve CAPTCHAs/verification interactively.
    pub interactive: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            interactive: true,
        }
    }
}

// ---------------------------------------------------------------------------
// BrowserSession
// ---------------------------------------------------------------------------

/// A live Chromium session implementing [`ProfileSearcher`].
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// Page used for search-engine queries.
    search_page: Page,
    /// Page that carries the LinkedIn session (login state, cookies).
    session_page: Page,
    logged_in: bool,
    interactive: bool,
}

impl BrowserSession {
    /// Launch Chromium and open the two persistent pages.
    pub async fn launch(opts: &BrowserOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .args(vec!["--disable-dev-shm-usage", "--disable-gpu"]);
        if !opts.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(StargazerError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| StargazerError::Browser(format!("failed to launch browser: {e}")))?;

        // The handler must be polled for the CDP connection to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let search_page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| StargazerError::Browser(format!("failed to open search page: {e}")))?;
        let session_page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| StargazerError::Browser(format!("failed to open session page: {e}")))?;

        info!(headless = opts.headless, "browser session started");

        Ok(Self {
            browser,
            handler_task,
            search_page,
            session_page,
            logged_in: false,
            interactive: opts.interactive,
        })
    }

    /// Establish the LinkedIn session per `method`, suspending on the
    /// operator gate for manual steps. Returns whether a login is active.
    pub async fn login(&mut self, method: &LoginMethod, gate: &dyn OperatorGate) -> Result<bool> {
        self.logged_in = match method {
            LoginMethod::None => {
                info!("no login method provided; profile text and degree will be unavailable");
                false
            }
            LoginMethod::Manual => self.manual_login(gate).await?,
            LoginMethod::Credentials { username, password } => {
                self.credential_login(username, password, gate).await?
            }
        };
        Ok(self.logged_in)
    }

    async fn manual_login(&self, gate: &dyn OperatorGate) -> Result<bool> {
        self.goto(&self.session_page, "https://www.linkedin.com/")
            .await?;
        self.run_login_gate(gate).await
    }

    async fn credential_login(
        &self,
        username: &str,
        password: &str,
        gate: &dyn OperatorGate,
    ) -> Result<bool> {
        self.goto(&self.session_page, "https://www.linkedin.com/login")
            .await?;

        self.type_into("input#username", username).await?;
        self.type_into("input#password", password).await?;
        self.session_page
            .find_element("button[type='submit']")
            .await
            .map_err(|e| StargazerError::Browser(format!("submit button: {e}")))?
            .click()
            .await
            .map_err(|e| StargazerError::Browser(e.to_string()))?;

        tokio::time::sleep(Duration::from_secs(3)).await;

        let captcha = self.element_present(&self.session_page, ".captcha-container").await;
        let pin = self.element_present(&self.session_page, "input#pin").await;

        if captcha || pin || self.interactive {
            debug!(captcha, pin, "verification step detected or interactive mode on");
            return self.run_login_gate(gate).await;
        }

        Ok(self.check_logged_in().await)
    }

    /// Drive the login gate state machine until it reaches a terminal state.
    async fn run_login_gate(&self, gate: &dyn OperatorGate) -> Result<bool> {
        let mut state = GateState::AwaitingManualStep;

        while !state.is_terminal() {
            state = match state {
                GateState::AwaitingManualStep => {
                    state.advance(gate.await_manual_step(MANUAL_LOGIN_INSTRUCTIONS))
                }
                GateState::Verifying => {
                    let verified = self.check_logged_in().await;
                    let next = state.advance(if verified {
                        GateCommand::VerifyOk
                    } else {
                        GateCommand::VerifyFailed
                    });
                    if next == GateState::AwaitingManualStep {
                        // Verification can fail on selector drift alone;
                        // let the operator decide.
                        if gate.confirm_continue(
                            "Could not verify the LinkedIn login. Proceed anyway?",
                        ) {
                            next.advance(GateCommand::Override)
                        } else {
                            next.advance(GateCommand::Abort)
                        }
                    } else {
                        next
                    }
                }
                terminal => terminal,
            };
        }

        match state {
            GateState::Ready => {
                info!("LinkedIn login confirmed");
                Ok(true)
            }
            _ => {
                warn!("LinkedIn login aborted by operator");
                Ok(false)
            }
        }
    }

    /// Look for any element that only renders in a logged-in state.
    async fn check_logged_in(&self) -> bool {
        for selector in [".global-nav", "div.feed-container", ".profile-rail-card"] {
            if self.element_present(&self.session_page, selector).await {
                return true;
            }
        }
        false
    }

    async fn element_present(&self, page: &Page, selector: &str) -> bool {
        page.find_element(selector).await.is_ok()
    }

    async fn type_into(&self, selector: &str, value: &str) -> Result<()> {
        self.session_page
            .find_element(selector)
            .await
            .map_err(|e| StargazerError::Browser(format!("{selector}: {e}")))?
            .click()
            .await
            .map_err(|e| StargazerError::Browser(e.to_string()))?
            .type_str(value)
            .await
            .map_err(|e| StargazerError::Browser(e.to_string()))?;
        Ok(())
    }

    async fn goto(&self, page: &Page, url: &str) -> Result<()> {
        page.goto(url)
            .await
            .map_err(|e| StargazerError::Browser(format!("{url}: {e}")))?;
        tokio::time::sleep(SETTLE).await;
        Ok(())
    }

    /// Shut the session down. Called on both completion and error paths.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "browser wait failed");
        }
        self.handler_task.abort();
        info!("browser session shut down");
    }
}

#[async_trait]
impl ProfileSearcher for BrowserSession {
    async fn find_profile_link(&self, query: &str) -> Result<Option<String>> {
        let url = search_url(query);
        self.goto(&self.search_page, &url).await?;

        let links = self
            .search_page
            .find_elements("a[href*='linkedin.com/in/']")
            .await
            .map_err(|e| StargazerError::Browser(format!("result links: {e}")))?;

        let Some(first) = links.first() else {
            debug!(query, "no profile link in search results");
            return Ok(None);
        };

        let href = first
            .attribute("href")
            .await
            .map_err(|e| StargazerError::Browser(format!("href attribute: {e}")))?;

        Ok(href.map(|h| strip_tracking(&h)))
    }

    async fn extract_profile(&self, url: &str) -> Result<ProfileInfo> {
        self.goto(&self.session_page, url).await?;

        // Primary selector with a documented fallback for both fields;
        // missing elements mean "not visible to this session", not an error.
        let about = self
            .first_text(&["div.text-body-medium.break-words", "section.about-section"])
            .await;
        let degree = self
            .first_text(&["span.dist-value", "[data-test-id='relationship-degree-text']"])
            .await
            .map(|t| t.trim().to_string());

        Ok(ProfileInfo { about, degree })
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in
    }
}

impl BrowserSession {
    async fn first_text(&self, selectors: &[&str]) -> Option<String> {
        for selector in selectors {
            if let Ok(element) = self.session_page.find_element(*selector).await {
                match element.inner_text().await {
                    Ok(Some(text)) if !text.is_empty() => return Some(text),
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(selector, error = %e, "inner_text failed");
                        continue;
                    }
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Strip the `@` handle marker and punctuation from a company field so it
/// works as search terms.
pub fn clean_company_name(company: &str) -> String {
    let cleaned: String = company
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the search query from a name and an optional company.
pub fn build_search_query(name: &str, company: Option<&str>) -> String {
    let mut parts = vec![name.trim().to_string()];
    if let Some(company) = company {
        let cleaned = clean_company_name(company);
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Search-engine URL with the site restriction to personal profiles.
fn search_url(query: &str) -> String {
    let escaped = query.replace(' ', "+");
    format!("https://www.google.com/search?q={escaped}+site:linkedin.com/in")
}

/// Drop UTM and other tracking parameters from a result link.
fn strip_tracking(url: &str) -> String {
    match url.find('?') {
        Some(idx) => url[..idx].to_string(),
        None => url.to_string(),
    }
}
