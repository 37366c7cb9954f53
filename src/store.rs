//! JSON documents under the data root.
//!
//! Layout:
//! - `pulls/raw/<org>--<repo>.json`: pull requests exactly as fetched
//! - `pulls/statistics/<org>--<repo>.json`: one repository's summary
//! - `pulls/results.json`: every summary found under `pulls/statistics`
//!
//! Each file is `{ "data": <payload> }` and every write overwrites.

use crate::error::StoreError;
use crate::statistics::PullRequestStatistics;
use crate::types::{PullRequestRecord, RepoId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PULLS_DIR: &str = "pulls";
const RAW_DIR: &str = "raw";
const STATISTICS_DIR: &str = "statistics";
const RESULTS_FILE: &str = "results.json";

#[derive(Serialize, Deserialize)]
struct DataDocument<T> {
    data: T,
}

/// A statistics file the aggregation could not use.
#[derive(Debug)]
pub struct AggregateFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// What one aggregation pass collected and where it wrote it.
#[derive(Debug)]
pub struct AggregateReport {
    pub results_path: PathBuf,
    pub statistics: Vec<PullRequestStatistics>,
    pub failures: Vec<AggregateFailure>,
}

#[derive(Clone, Debug)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_path(&self, repo_id: &RepoId) -> PathBuf {
        self.pulls_dir()
            .join(RAW_DIR)
            .join(format!("{}.json", repo_id.file_stem()))
    }

    pub fn statistics_path(&self, repo_id: &RepoId) -> PathBuf {
        self.statistics_dir()
            .join(format!("{}.json", repo_id.file_stem()))
    }

    pub fn results_path(&self) -> PathBuf {
        self.pulls_dir().join(RESULTS_FILE)
    }

    fn pulls_dir(&self) -> PathBuf {
        self.root.join(PULLS_DIR)
    }

    fn statistics_dir(&self) -> PathBuf {
        self.pulls_dir().join(STATISTICS_DIR)
    }

    pub fn write_raw(
        &self,
        repo_id: &RepoId,
        records: &[PullRequestRecord],
    ) -> Result<PathBuf, StoreError> {
        let path = self.raw_path(repo_id);
        write_document(&path, records)?;
        Ok(path)
    }

    pub fn read_raw(&self, repo_id: &RepoId) -> Result<Vec<PullRequestRecord>, StoreError> {
        read_document(&self.raw_path(repo_id))
    }

    pub fn write_statistics(&self, stats: &PullRequestStatistics) -> Result<PathBuf, StoreError> {
        let path = self.statistics_path(&stats.repo_id());
        write_document(&path, stats)?;
        Ok(path)
    }

    pub fn read_statistics(&self, repo_id: &RepoId) -> Result<PullRequestStatistics, StoreError> {
        read_document(&self.statistics_path(repo_id))
    }

    /// Collects every statistics document into `results.json`.
    ///
    /// Files that cannot be read or parsed are skipped and listed in the report.
    /// Only failing to write the results document is an error.
    pub fn aggregate_all(&self) -> Result<AggregateReport, StoreError> {
        let pattern = format!(
            "{}/*--*.json",
            glob::Pattern::escape(&self.statistics_dir().to_string_lossy())
        );

        let mut statistics = Vec::new();
        let mut failures = Vec::new();

        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping unreadable statistics entry: {}", e);
                    failures.push(AggregateFailure {
                        path: e.path().to_path_buf(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match read_document::<PullRequestStatistics>(&path) {
                Ok(stats) => statistics.push(stats),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping statistics file: {}", e);
                    failures.push(AggregateFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let results_path = self.results_path();
        write_document(&results_path, &statistics)?;
        tracing::info!(
            collected = statistics.len(),
            skipped = failures.len(),
            "Wrote {}",
            results_path.display()
        );

        Ok(AggregateReport {
            results_path,
            statistics,
            failures,
        })
    }
}

fn write_document<T: Serialize>(path: &Path, data: T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let bytes = serde_json::to_vec(&DataDocument { data }).map_err(|source| {
        StoreError::Serialize {
            path: path.to_path_buf(),
            source,
        }
    })?;

    fs::write(path, bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Wrote document");
    Ok(())
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StoreError::NotFound {
            path: path.to_path_buf(),
        },
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let document: DataDocument<T> =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(document.data)
}
