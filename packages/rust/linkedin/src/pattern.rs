//! Fixed-pattern LinkedIn URL extraction from free-text profile fields.

use std::sync::LazyLock;

use regex::Regex;

/// The four recognized URL shapes: scheme-qualified or bare, personal
/// (`/in/`) or organization (`/company/`) profile paths. Order matters —
/// scheme-qualified matches win so the match covers the full substring.
static LINKEDIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"https?://(?:www\.)?linkedin\.com/in/[a-zA-Z0-9_-]+/?",
        r"https?://(?:www\.)?linkedin\.com/company/[a-zA-Z0-9_-]+/?",
        r"linkedin\.com/in/[a-zA-Z0-9_-]+/?",
        r"linkedin\.com/company/[a-zA-Z0-9_-]+/?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("pattern is valid"))
    .collect()
});

/// Find the first LinkedIn URL in `text`, normalized to carry a scheme.
pub fn find_in_text(text: &str) -> Option<String> {
    for pattern in LINKEDIN_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            let url = m.as_str();
            return Some(if url.starts_with("http") {
                url.to_string()
            } else {
                format!("https://{url}")
            });
        }
    }
    None
}

/// Extract a LinkedIn URL from the bio, blog, and company fields, checked in
/// that priority order. Returns `None` when nothing matches — an absent
/// profile link is a normal outcome, not an error.
pub fn extract_linkedin_url(
    bio: Option<&str>,
    blog: Option<&str>,
    company: Option<&str>,
) -> Option<String> {
    [bio, blog, company]
        .into_iter()
        .flatten()
        .find_map(find_in_text)
}
