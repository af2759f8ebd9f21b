//! GitHub REST adapter: stargazer pagination and per-user profile lookup.
//!
//! All requests go through [`GithubClient`], which owns the token, the
//! star-timestamp media type, and the rate-limit header handling. The
//! pagination fetcher in [`fetch`] turns the paged endpoint into a
//! skip/limit-sliced sequence of [`stargazer_shared::StarEvent`]s.

pub mod client;
pub mod fetch;

pub use client::{GithubClient, GithubUser, RateLimit, RepoRef};
pub use fetch::{FetchOptions, FetchProgress, fetch_stargazers};
