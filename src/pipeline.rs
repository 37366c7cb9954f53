//! Sequencing of fetch, persistence and statistics for the catalog.
//!
//! `Pipeline` is the main entry point. For each repository it:
//! 1. Fetches every pull request from its `PullFetcher`.
//! 2. Saves the raw records (a failure here is only a warning).
//! 3. Computes the statistics from the records in memory.
//! 4. Saves the statistics document.
//!
//! Repositories of one organization run concurrently up to the configured limit,
//! organizations one after another. A full run ends by rebuilding `results.json`.

use crate::catalog::Catalog;
use crate::config::DEFAULT_FETCH_CONCURRENCY_LIMIT;
use crate::error::{CatalogError, UnitError};
use crate::fetcher::PullFetcher;
use crate::report::{OrganizationFailure, RepoOutcome, RunReport};
use crate::statistics;
use crate::store::DataStore;
use crate::types::RepoId;
use futures::stream::{self, StreamExt};

/// How much of the catalog a run covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Organization(String),
    Repository(RepoId),
}

pub struct Pipeline<F> {
    fetcher: F,
    store: DataStore,
    catalog: Catalog,
    concurrency_limit: usize,
}

impl<F: PullFetcher> Pipeline<F> {
    pub fn new(fetcher: F, store: DataStore, catalog: Catalog) -> Self {
        Self {
            fetcher,
            store,
            catalog,
            concurrency_limit: DEFAULT_FETCH_CONCURRENCY_LIMIT,
        }
    }

    /// Caps how many repositories are processed at once. One means strictly sequential.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub async fn run(&self, scope: &Scope) -> RunReport {
        match scope {
            Scope::All => self.run_all().await,
            Scope::Organization(organization_name) => {
                let mut report = RunReport::default();
                self.run_organization_into(organization_name, &mut report)
                    .await;
                report
            }
            Scope::Repository(repo_id) => RunReport {
                outcomes: vec![self.run_repository(repo_id).await],
                ..RunReport::default()
            },
        }
    }

    /// Runs every organization in catalog order, then aggregates all statistics.
    pub async fn run_all(&self) -> RunReport {
        let mut report = RunReport::default();

        for organization_name in self.catalog.list_organizations() {
            self.run_organization_into(organization_name, &mut report)
                .await;
        }

        let aggregate = self.store.aggregate_all();
        if let Err(e) = &aggregate {
            tracing::error!("Failed to aggregate statistics: {}", e);
        }
        report.aggregate = Some(aggregate);

        report
    }

    /// Runs every repository of one organization.
    ///
    /// A failing repository does not stop the others. Outcomes come back in catalog
    /// order whatever order the repositories finish in.
    pub async fn run_organization(
        &self,
        organization_name: &str,
    ) -> Result<Vec<RepoOutcome>, CatalogError> {
        let repositories = self.catalog.list_repositories(organization_name)?;
        tracing::info!(
            organization = organization_name,
            repositories = repositories.len(),
            "Processing organization"
        );

        let outcomes = stream::iter(repositories)
            .map(|repo| {
                let repo_id = RepoId::new(organization_name, repo);
                async move { self.run_repository(&repo_id).await }
            })
            .buffered(self.concurrency_limit)
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    async fn run_organization_into(&self, organization_name: &str, report: &mut RunReport) {
        match self.run_organization(organization_name).await {
            Ok(outcomes) => report.outcomes.extend(outcomes),
            Err(error) => {
                tracing::error!("Skipping organization {}: {}", organization_name, error);
                report.organization_failures.push(OrganizationFailure {
                    organization_name: organization_name.to_string(),
                    error,
                });
            }
        }
    }

    /// Fetches, saves and summarizes a single repository.
    pub async fn run_repository(&self, repo_id: &RepoId) -> RepoOutcome {
        let mut warnings = Vec::new();
        let result = self.process_repository(repo_id, &mut warnings).await;

        match &result {
            Ok(stats) => tracing::info!(
                repo_id = %repo_id,
                open = stats.open_pulls_count,
                closed = stats.closed_pulls_count,
                "Computed statistics"
            ),
            Err(e) => tracing::error!("Failed to process {}: {}", repo_id, e),
        }

        RepoOutcome {
            repo_id: repo_id.clone(),
            result,
            warnings,
        }
    }

    async fn process_repository(
        &self,
        repo_id: &RepoId,
        warnings: &mut Vec<String>,
    ) -> Result<statistics::PullRequestStatistics, UnitError> {
        let records = self.fetcher.fetch_all_pulls(repo_id).await?;
        tracing::debug!(repo_id = %repo_id, records = records.len(), "Fetched records");

        if self.fetcher.persists_raw() {
            if let Err(e) = self.store.write_raw(repo_id, &records) {
                tracing::warn!("Failed to save raw records for {}: {}", repo_id, e);
                warnings.push(format!("raw records not saved: {}", e));
            }
        }

        let stats = statistics::compute_statistics(repo_id, &records);
        self.store.write_statistics(&stats)?;

        Ok(stats)
    }
}
