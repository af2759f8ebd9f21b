//! Error types for the stargazer toolkit.
//!
//! Library crates use [`StargazerError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.
//!
//! The variants follow the pipeline's failure taxonomy: `Auth`, `NotFound`,
//! `Api`, `Config`, and `Validation` abort a run; `Network`, `Browser`, and
//! `Llm` are recoverable per item inside a batch loop.

use std::path::PathBuf;

/// Top-level error type for all stargazer operations.
#[derive(Debug, thiserror::Error)]
pub enum StargazerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Invalid token or unauthorized access. Fatal.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// Repository or resource not found. Fatal.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected API status code. Fatal.
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// Transport-level network error. Recoverable per item.
    #[error("network error: {0}")]
    Network(String),

    /// Browser-automation error (launch, navigation, selector).
    #[error("browser error: {0}")]
    Browser(String),

    /// LLM completion endpoint error.
    #[error("llm error: {0}")]
    Llm(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad repo reference, malformed snapshot, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StargazerError>;

impl StargazerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort the whole run rather than one item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth(_)
                | Self::NotFound(_)
                | Self::Api { .. }
                | Self::Config { .. }
                | Self::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StargazerError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = StargazerError::Api {
            status: 403,
            body: "rate limited".into(),
        };
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn fatal_taxonomy() {
        assert!(StargazerError::Auth("bad token".into()).is_fatal());
        assert!(StargazerError::NotFound("owner/repo".into()).is_fatal());
        assert!(!StargazerError::Network("timeout".into()).is_fatal());
        assert!(!StargazerError::Browser("selector missing".into()).is_fatal());
    }
}
