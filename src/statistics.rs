//! Turns a repository's pull requests into a resolution summary.

use crate::types::{PullRequestRecord, RepoId};
use serde::{Deserialize, Serialize};

/// Logins containing this marker belong to automation accounts.
pub const BOT_LOGIN_MARKER: &str = "[bot]";

/// Summary of how a repository's pull requests were resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestStatistics {
    pub organization_name: String,
    pub repository_name: String,
    pub open_pulls_count: usize,
    pub closed_pulls_count: usize,
    /// Closed by merging.
    pub closed_merged_count: usize,
    /// Closed without merging.
    pub closed_unmerged_count: usize,
    /// Mean days from creation to closure. Absent when nothing has been closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_time_to_resolution: Option<f64>,
}

impl PullRequestStatistics {
    pub fn repo_id(&self) -> RepoId {
        RepoId::new(&self.organization_name, &self.repository_name)
    }
}

/// Pull requests bucketed by state, and closed ones by how they were closed.
#[derive(Debug, Default)]
pub struct PartitionedPulls<'a> {
    pub open: Vec<&'a PullRequestRecord>,
    pub closed_merged: Vec<&'a PullRequestRecord>,
    pub closed_unmerged: Vec<&'a PullRequestRecord>,
}

impl<'a> PartitionedPulls<'a> {
    pub fn closed(&self) -> impl Iterator<Item = &'a PullRequestRecord> + '_ {
        self.closed_merged
            .iter()
            .chain(self.closed_unmerged.iter())
            .copied()
    }

    pub fn closed_count(&self) -> usize {
        self.closed_merged.len() + self.closed_unmerged.len()
    }
}

pub fn is_bot_login(login: &str) -> bool {
    login.contains(BOT_LOGIN_MARKER)
}

/// Drops pull requests authored by bot accounts.
pub fn filter_bots<'a, I>(records: I) -> Vec<&'a PullRequestRecord>
where
    I: IntoIterator<Item = &'a PullRequestRecord>,
{
    records
        .into_iter()
        .filter(|record| !is_bot_login(&record.user.login))
        .collect()
}

/// Buckets pull requests. Records in states other than open or closed are dropped.
pub fn partition<'a>(records: &[&'a PullRequestRecord]) -> PartitionedPulls<'a> {
    let mut pulls = PartitionedPulls::default();

    for &record in records {
        if record.is_open() {
            pulls.open.push(record);
        } else if record.is_closed() {
            if record.is_merged() {
                pulls.closed_merged.push(record);
            } else {
                pulls.closed_unmerged.push(record);
            }
        }
    }

    pulls
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Computes the resolution summary for one repository.
///
/// # Arguments
/// * `repo_id` - The repository the records belong to.
/// * `records` - Every pull request fetched for it, bots and all.
pub fn compute_statistics(repo_id: &RepoId, records: &[PullRequestRecord]) -> PullRequestStatistics {
    let humans = filter_bots(records);
    let pulls = partition(&humans);

    let open_times: Vec<f64> = pulls
        .closed()
        .filter_map(PullRequestRecord::open_time_days)
        .collect();

    PullRequestStatistics {
        organization_name: repo_id.org.clone(),
        repository_name: repo_id.repo.clone(),
        open_pulls_count: pulls.open.len(),
        closed_pulls_count: pulls.closed_count(),
        closed_merged_count: pulls.closed_merged.len(),
        closed_unmerged_count: pulls.closed_unmerged.len(),
        average_time_to_resolution: mean(&open_times),
    }
}
