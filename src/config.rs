//! Application configuration and environment variable parsing.
//!
//! Settings come from the environment (optionally seeded from a `.env` file).
//! Nothing here is required: every field has a default, and the GitHub token is
//! only needed by commands that talk to the API.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

/// Repositories processed at once when nothing else is configured.
pub const DEFAULT_FETCH_CONCURRENCY_LIMIT: usize = 4;

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Directory holding the `pulls/` tree of raw, statistics and results documents.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Maximum number of repositories fetched at the same time.
    /// GitHub starts throttling quickly past a handful of parallel paginations.
    #[serde(default = "default_concurrency_limit")]
    pub fetch_concurrency_limit: usize,

    /// How many times a rate-limited or failed request is retried. Zero disables retries.
    #[serde(default = "default_max_retries")]
    pub fetch_max_retries: u32,

    /// Delay before the first retry; doubled on each further attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,

    /// GitHub personal access token.
    pub github_token: Option<String>,

    /// JSON catalog replacing the built-in list of organizations and repositories.
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_concurrency_limit() -> usize {
    DEFAULT_FETCH_CONCURRENCY_LIMIT
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            fetch_concurrency_limit: default_concurrency_limit(),
            fetch_max_retries: default_max_retries(),
            fetch_retry_delay_ms: default_retry_delay_ms(),
            github_token: None,
            catalog_path: None,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Concurrency limit, never below one.
    pub fn concurrency_limit(&self) -> usize {
        self.fetch_concurrency_limit.max(1)
    }

    pub fn retry_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.fetch_retry_delay_ms)
    }

    /// The GitHub token, ignoring an empty value.
    pub fn github_token(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }
}
