//! Application configuration for the stargazer toolkit.
//!
//! User config lives at `~/.stargazer/stargazer.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file — each section names the
//! environment variable that holds the secret.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StargazerError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stargazer.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stargazer";

// ---------------------------------------------------------------------------
// Config structs (matching stargazer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// GitHub API settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// LLM lookup settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Rate-limit and politeness-delay policy.
    #[serde(default)]
    pub rates: RatesConfig,

    /// Batch-merge behavior.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL (overridable for tests).
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            token_env: default_github_token_env(),
        }
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Chat-completions endpoint.
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Model to use for profile lookup.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Path to the prompt template with `{{name}}`/`{{company}}` placeholders.
    #[serde(default = "default_prompt_file")]
    pub prompt_file: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_openai_endpoint(),
            api_key_env: default_openai_key_env(),
            model: default_openai_model(),
            prompt_file: default_prompt_file(),
        }
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-4.1-2025-04-14".into()
}
fn default_prompt_file() -> String {
    "linkedin_prompt.txt".into()
}

/// `[rates]` section.
///
/// Lookups are issued strictly one at a time; these delays are the whole
/// politeness story, so they are configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Fixed delay after every successful API lookup, in milliseconds.
    #[serde(default = "default_politeness_ms")]
    pub politeness_ms: u64,

    /// Backoff after a per-item transport error, in seconds.
    #[serde(default = "default_item_backoff_secs")]
    pub item_backoff_secs: u64,

    /// Consecutive per-item failures before escalating to the operator.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: usize,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            politeness_ms: default_politeness_ms(),
            item_backoff_secs: default_item_backoff_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

fn default_politeness_ms() -> u64 {
    500
}
fn default_item_backoff_secs() -> u64 {
    1
}
fn default_max_consecutive_errors() -> usize {
    5
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Default glob pattern for enriched batch files.
    #[serde(default = "default_merge_pattern")]
    pub pattern: String,

    /// When true, concatenate records without dedup (legacy behavior).
    /// The default keyed merge dedups by username; when two files carry the
    /// same username, the record from the later file wins wholesale.
    #[serde(default)]
    pub concat: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            pattern: default_merge_pattern(),
            concat: false,
        }
    }
}

fn default_merge_pattern() -> String {
    "stargazers_enriched_batch_*.json".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stargazer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StargazerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stargazer/stargazer.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StargazerError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StargazerError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StargazerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StargazerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StargazerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve a credential from the named env var. Errors with a pointer to the
/// variable name so the operator knows what to set.
pub fn resolve_credential(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(StargazerError::config(format!(
            "credential not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("api.github.com"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("politeness_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.rates.politeness_ms, 500);
        assert_eq!(parsed.rates.max_consecutive_errors, 5);
        assert_eq!(parsed.github.token_env, "GITHUB_TOKEN");
        assert!(!parsed.merge.concat);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[openai]
model = "gpt-4o-mini"

[merge]
concat = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.api_key_env, "OPENAI_API_KEY");
        assert!(config.merge.concat);
        assert_eq!(config.rates.item_backoff_secs, 1);
    }

    #[test]
    fn credential_resolution() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_credential("STARGAZER_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("STARGAZER_TEST_NONEXISTENT_KEY_12345")
        );
    }
}
