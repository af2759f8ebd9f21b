//! Shared types, error model, and configuration for the stargazer toolkit.
//!
//! This crate is the foundation depended on by all other stargazer crates.
//! It provides:
//! - [`StargazerError`] — the unified error type
//! - Domain types ([`StarEvent`], [`UserRecord`], [`BatchLabel`])
//! - Configuration ([`AppConfig`], config loading)
//! - The operator gate ([`OperatorGate`], [`GateState`])

pub mod config;
pub mod error;
pub mod gate;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GithubConfig, MergeConfig, OpenAiConfig, RatesConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_credential,
};
pub use error::{Result, StargazerError};
pub use gate::{GateCommand, GateState, NonInteractiveGate, OperatorGate};
pub use types::{BatchLabel, StarEvent, StarUser, UserRecord, file_timestamp};
