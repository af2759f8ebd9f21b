//! LinkedIn profile discovery: URL pattern matching, browser-automation
//! search, and LLM-based lookup.
//!
//! The scraping side is inherently brittle (selector drift on a third-party
//! site), so it sits behind the narrow [`ProfileSearcher`] capability trait;
//! the enrichment loops in `stargazer-core` never touch the browser directly.

pub mod browser;
pub mod llm;
pub mod pattern;

pub use browser::{
    build_search_query, clean_company_name, BrowserOptions, BrowserSession, LoginMethod,
    ProfileInfo, ProfileSearcher,
};
pub use llm::{LlmConfig, LlmFinder};
pub use pattern::{extract_linkedin_url, find_in_text};
