pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod pipeline;
pub mod report;
pub mod statistics;
pub mod store;
pub mod types;

pub use catalog::{Catalog, OrgRepoCatalogEntry};
pub use config::AppConfig;
pub use fetcher::{PullFetcher, StoredPulls};
pub use github::GitHubFetcher;
pub use pipeline::{Pipeline, Scope};
pub use report::{RepoOutcome, RunReport};
pub use statistics::{compute_statistics, PullRequestStatistics};
pub use store::{AggregateReport, DataStore};
pub use types::{PullRequestRecord, RepoId};
