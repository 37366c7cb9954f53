use crate::error::{CatalogError, StoreError, UnitError};
use crate::statistics::PullRequestStatistics;
use crate::store::AggregateReport;
use crate::types::RepoId;
use std::fmt;

/// Result of running the pipeline for one repository.
#[derive(Debug)]
pub struct RepoOutcome {
    pub repo_id: RepoId,
    pub result: Result<PullRequestStatistics, UnitError>,
    /// Problems that did not stop the unit, such as failing to save raw records.
    pub warnings: Vec<String>,
}

impl RepoOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct OrganizationFailure {
    pub organization_name: String,
    pub error: CatalogError,
}

/// Everything a run did, collected so failures can be reported at the end.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<RepoOutcome>,
    pub organization_failures: Vec<OrganizationFailure>,
    pub aggregate: Option<Result<AggregateReport, StoreError>>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PullRequestStatistics> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RepoId, &UnitError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.repo_id, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
            || !self.organization_failures.is_empty()
            || matches!(self.aggregate, Some(Err(_)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let succeeded = self.succeeded().count();
        let failed = self.failed().count();
        let noun = if succeeded == 1 { "repository" } else { "repositories" };
        writeln!(f, "{} {} succeeded, {} failed", succeeded, noun, failed)?;

        for stats in self.succeeded() {
            write!(
                f,
                "  ok    {}/{}: {} open, {} closed ({} merged, {} unmerged)",
                stats.organization_name,
                stats.repository_name,
                stats.open_pulls_count,
                stats.closed_pulls_count,
                stats.closed_merged_count,
                stats.closed_unmerged_count
            )?;
            match stats.average_time_to_resolution {
                Some(days) => writeln!(f, ", {:.2} days to resolution", days)?,
                None => writeln!(f)?,
            }
        }

        for outcome in &self.outcomes {
            for warning in &outcome.warnings {
                writeln!(f, "  warn  {}: {}", outcome.repo_id, warning)?;
            }
        }

        for (repo_id, error) in self.failed() {
            writeln!(f, "  FAIL  {}: {}", repo_id, error)?;
        }

        for failure in &self.organization_failures {
            writeln!(f, "  FAIL  {}: {}", failure.organization_name, failure.error)?;
        }

        match &self.aggregate {
            Some(Ok(aggregate)) => {
                writeln!(
                    f,
                    "Aggregated {} statistics into {}",
                    aggregate.statistics.len(),
                    aggregate.results_path.display()
                )?;
                for skipped in &aggregate.failures {
                    writeln!(f, "  skip  {}: {}", skipped.path.display(), skipped.reason)?;
                }
            }
            Some(Err(e)) => writeln!(f, "Aggregation failed: {}", e)?,
            None => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn stats(org: &str, repo: &str, average: Option<f64>) -> PullRequestStatistics {
        PullRequestStatistics {
            organization_name: org.to_string(),
            repository_name: repo.to_string(),
            open_pulls_count: 3,
            closed_pulls_count: 2,
            closed_merged_count: 1,
            closed_unmerged_count: 1,
            average_time_to_resolution: average,
        }
    }

    #[test]
    fn test_report_lists_failures() {
        let report = RunReport {
            outcomes: vec![
                RepoOutcome {
                    repo_id: RepoId::new("emberjs", "data"),
                    result: Ok(stats("emberjs", "data", Some(1.25))),
                    warnings: vec![],
                },
                RepoOutcome {
                    repo_id: RepoId::new("emberjs", "ember.js"),
                    result: Err(FetchError::RateLimit("API rate limit exceeded".to_string()).into()),
                    warnings: vec![],
                },
            ],
            organization_failures: vec![OrganizationFailure {
                organization_name: "rust-lang".to_string(),
                error: CatalogError::UnknownOrganization("rust-lang".to_string()),
            }],
            aggregate: None,
        };

        assert!(report.has_failures());
        let text = report.to_string();
        assert!(text.starts_with("1 repository succeeded, 1 failed"));
        assert!(text.contains("emberjs/data: 3 open, 2 closed (1 merged, 1 unmerged), 1.25 days"));
        assert!(text.contains("FAIL  emberjs/ember.js: GitHub rate limit exceeded"));
        assert!(text.contains("FAIL  rust-lang: organization 'rust-lang' is not in the catalog"));
    }

    #[test]
    fn test_report_without_failures() {
        let report = RunReport {
            outcomes: vec![RepoOutcome {
                repo_id: RepoId::new("glimmerjs", "glimmer-vm"),
                result: Ok(stats("glimmerjs", "glimmer-vm", None)),
                warnings: vec!["failed to save raw records".to_string()],
            }],
            ..RunReport::default()
        };

        assert!(!report.has_failures());
        let text = report.to_string();
        assert!(text.starts_with("1 repository succeeded, 0 failed"));
        assert!(text.contains("(1 merged, 1 unmerged)\n"));
        assert!(text.contains("warn  glimmerjs/glimmer-vm: failed to save raw records"));
    }

    #[test]
    fn test_report_counts_use_plural() {
        assert!(RunReport::default()
            .to_string()
            .starts_with("0 repositories succeeded, 0 failed"));

        let report = RunReport {
            outcomes: vec![
                RepoOutcome {
                    repo_id: RepoId::new("emberjs", "data"),
                    result: Ok(stats("emberjs", "data", None)),
                    warnings: vec![],
                },
                RepoOutcome {
                    repo_id: RepoId::new("emberjs", "ember.js"),
                    result: Ok(stats("emberjs", "ember.js", None)),
                    warnings: vec![],
                },
            ],
            ..RunReport::default()
        };
        assert!(report.to_string().starts_with("2 repositories succeeded, 0 failed"));
    }
}
