use crate::types::RepoId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures at the boundary with the GitHub API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub authentication failed: {0}")]
    Auth(String),

    #[error("GitHub rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("network failure talking to GitHub: {0}")]
    TransientNetwork(String),

    #[error("repository {0} not found")]
    NotFound(RepoId),

    #[error("GitHub rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode pull requests: {0}")]
    Decode(String),

    #[error("stored pull requests unavailable: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Whether waiting and asking again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::TransientNetwork(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_throttling_and_network_failures_retry() {
        assert!(FetchError::RateLimit("slow down".to_string()).is_retryable());
        assert!(FetchError::TransientNetwork("bad gateway".to_string()).is_retryable());
        assert!(!FetchError::Auth("bad credentials".to_string()).is_retryable());
        assert!(!FetchError::NotFound(RepoId::new("orgA", "repo1")).is_retryable());
        assert!(!FetchError::Rejected {
            status: 422,
            message: "Validation Failed".to_string()
        }
        .is_retryable());
    }
}

/// Failures reading or writing documents under the data root.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path:?} does not exist")]
    NotFound { path: PathBuf },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid statistics pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("organization '{0}' is not in the catalog")]
    UnknownOrganization(String),

    #[error("failed to load catalog from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Why a single repository could not produce statistics.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
