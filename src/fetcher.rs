use crate::error::FetchError;
use crate::store::DataStore;
use crate::types::{PullRequestRecord, RepoId};
use async_trait::async_trait;

/// A source of every pull request for a repository.
///
/// The pipeline only depends on this trait, so the GitHub client can be swapped
/// for the raw store (recomputing statistics offline) or an in-memory fake.
#[async_trait]
pub trait PullFetcher: Send + Sync {
    /// Returns all pull requests, open and closed, in the order the source lists them.
    async fn fetch_all_pulls(&self, repo_id: &RepoId) -> Result<Vec<PullRequestRecord>, FetchError>;

    /// Whether fetched records should be written back to the raw store.
    fn persists_raw(&self) -> bool {
        true
    }
}

/// Reads pull requests previously saved to the raw store.
#[derive(Clone, Debug)]
pub struct StoredPulls {
    store: DataStore,
}

impl StoredPulls {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PullFetcher for StoredPulls {
    async fn fetch_all_pulls(&self, repo_id: &RepoId) -> Result<Vec<PullRequestRecord>, FetchError> {
        Ok(self.store.read_raw(repo_id)?)
    }

    fn persists_raw(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stored_pulls_reads_raw_store() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path());
        let repo_id = RepoId::new("emberjs", "data");
        let records: Vec<PullRequestRecord> = serde_json::from_value(json!([{
            "state": "open",
            "created_at": "2024-01-01T00:00:00Z",
            "user": { "login": "alice" }
        }]))
        .unwrap();
        store.write_raw(&repo_id, &records).unwrap();

        let source = StoredPulls::new(store);
        assert_eq!(source.fetch_all_pulls(&repo_id).await.unwrap(), records);
        assert!(!source.persists_raw());
    }

    #[tokio::test]
    async fn test_stored_pulls_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = StoredPulls::new(DataStore::new(dir.path()));

        let err = source
            .fetch_all_pulls(&RepoId::new("emberjs", "data"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Store(StoreError::NotFound { .. })));
    }
}
