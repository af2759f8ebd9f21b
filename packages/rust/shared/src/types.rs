//! Core domain types for stargazer batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StarEvent
// ---------------------------------------------------------------------------

/// A raw stargazer entry as returned by the star+json media type:
/// who starred and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarEvent {
    /// When the star was placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred_at: Option<DateTime<Utc>>,
    /// The starring user.
    pub user: StarUser,
}

/// The minimal user object embedded in a [`StarEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarUser {
    /// GitHub login. Identity key for the whole pipeline.
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

// ---------------------------------------------------------------------------
// UserRecord
// ---------------------------------------------------------------------------

/// An enriched stargazer record.
///
/// Mutated additively across enrichment passes: the GitHub pass fills the
/// profile fields, the extraction/search/LLM passes fill the `linkedin_*`
/// fields. Passes add fields, never remove them, and must not overwrite an
/// earlier non-empty enrichment field unless explicitly requested.
/// Profile fields round-trip `null` as `null` — absent upstream values are
/// preserved, not coerced to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// GitHub login — unique within one batch.
    pub username: String,
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
    pub starred_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,

    /// LinkedIn URL found by the regex extraction pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    /// LinkedIn URL guessed by the browser search pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url_guess: Option<String>,
    /// "About" text scraped from the profile page (search pass, logged in).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_profile_text: Option<String>,
    /// Connection degree label from the profile page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_connection_degree: Option<String>,
    /// LinkedIn URL found by the LLM lookup pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url_openai: Option<String>,
}

impl UserRecord {
    /// Whether any earlier pass already attached a LinkedIn URL.
    /// Empty strings (written by a failed lookup) do not count.
    pub fn has_linkedin(&self) -> bool {
        let non_empty = |f: &Option<String>| f.as_deref().is_some_and(|s| !s.is_empty());
        non_empty(&self.linkedin_url) || non_empty(&self.linkedin_url_guess)
    }
}

// ---------------------------------------------------------------------------
// BatchLabel
// ---------------------------------------------------------------------------

/// Identifies one skip/limit-bounded batch for file naming and progress lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchLabel {
    /// No batching — the whole collection.
    Whole,
    /// Explicit 1-based batch number (`--batch-number`).
    Numbered(usize),
    /// Ad hoc skip/limit window.
    Window {
        skip: usize,
        limit: Option<usize>,
    },
}

impl BatchLabel {
    /// Derive a label from CLI-style arguments. `batch_number` takes
    /// precedence and computes its own window.
    pub fn from_args(skip: usize, limit: Option<usize>, batch_number: Option<usize>) -> Self {
        match batch_number {
            Some(n) => Self::Numbered(n.max(1)),
            None if skip > 0 || limit.is_some() => Self::Window { skip, limit },
            None => Self::Whole,
        }
    }

    /// Short name used in progress output, e.g. `batch_3`.
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Whole => None,
            Self::Numbered(n) => Some(format!("batch_{n}")),
            Self::Window { skip, limit } => Some(format!(
                "skip_{skip}_limit_{}",
                limit.map_or_else(|| "none".into(), |l| l.to_string())
            )),
        }
    }

    /// File-name suffix, e.g. `_batch_3`. Empty for the whole collection
    /// and for ad hoc windows, matching the output naming convention.
    pub fn file_suffix(&self) -> String {
        match self {
            Self::Numbered(n) => format!("_batch_{n}"),
            _ => String::new(),
        }
    }
}

/// Timestamp fragment used in snapshot/checkpoint file names.
pub fn file_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
