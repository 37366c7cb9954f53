use crate::config::AppConfig;
use crate::error::FetchError;
use crate::fetcher::PullFetcher;
use crate::types::{PullRequestRecord, RepoId};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryFutureExt;
use octocrab::{Octocrab, Page};
use serde::Serialize;
use std::future::Future;
use std::time::Duration as StdDuration;

const PER_PAGE: u8 = 100;

#[derive(Serialize)]
struct ListPullsParams {
    state: &'static str,
    per_page: u8,
}

/// Lists pull requests through the GitHub REST API.
#[derive(Clone)]
pub struct GitHubFetcher {
    octocrab: Octocrab,
    retry: RetryPolicy,
}

impl GitHubFetcher {
    /// Builds an authenticated client. A token is required.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let token = config.github_token().ok_or_else(|| {
            FetchError::Auth("no token configured; set GITHUB_TOKEN".to_string())
        })?;

        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()?;

        Ok(Self {
            octocrab,
            retry: RetryPolicy {
                max_retries: config.fetch_max_retries,
                base_delay: config.retry_delay(),
            },
        })
    }
}

#[async_trait]
impl PullFetcher for GitHubFetcher {
    async fn fetch_all_pulls(&self, repo_id: &RepoId) -> Result<Vec<PullRequestRecord>, FetchError> {
        let route = format!("/repos/{}/{}/pulls", repo_id.org, repo_id.repo);
        let params = ListPullsParams {
            state: "all",
            per_page: PER_PAGE,
        };

        let mut page = self
            .retry
            .run(repo_id, || {
                self.octocrab
                    .get::<Page<PullRequestRecord>, _, _>(&route, Some(&params))
                    .map_err(move |e| classify_error(repo_id, e))
            })
            .await?;
        let mut records = Vec::new();
        let mut page_count = 1;

        loop {
            let next = page.next.clone();
            records.extend(page.items);

            if next.is_none() {
                break;
            }

            let next_page = self
                .retry
                .run(repo_id, || {
                    self.octocrab
                        .get_page::<PullRequestRecord>(&next)
                        .map_err(move |e| classify_error(repo_id, e))
                })
                .await?;

            match next_page {
                Some(next_page) => {
                    page = next_page;
                    page_count += 1;
                }
                None => break,
            }
        }

        tracing::debug!(
            repo_id = %repo_id,
            pages = page_count,
            records = records.len(),
            "Fetched pull requests"
        );

        Ok(records)
    }
}

/// How often and how patiently a failed request is repeated.
#[derive(Clone, Copy, Debug)]
struct RetryPolicy {
    max_retries: u32,
    base_delay: StdDuration,
}

impl RetryPolicy {
    /// Runs `request`, retrying rate limits and network failures with exponential backoff.
    ///
    /// `request` is called at most `max_retries + 1` times. Errors that are not
    /// retryable come back after the first attempt.
    async fn run<T, F, Fut>(&self, repo_id: &RepoId, mut request: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match request().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                return Err(error);
            }

            attempt += 1;
            let delay = backoff(self.base_delay, attempt);
            tracing::warn!(
                repo_id = %repo_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying GitHub request: {}",
                error
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn backoff(base: StdDuration, attempt: u32) -> StdDuration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Maps an octocrab error onto the fetch error taxonomy.
fn classify_error(repo_id: &RepoId, error: octocrab::Error) -> FetchError {
    match &error {
        octocrab::Error::GitHub { source, .. } => {
            classify_status(repo_id, source.status_code.as_u16(), &source.message)
        }
        octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => {
            FetchError::Decode(error.to_string())
        }
        _ => FetchError::TransientNetwork(error.to_string()),
    }
}

/// Maps an HTTP error status from GitHub onto the fetch error taxonomy.
///
/// GitHub answers both a primary and a secondary rate limit with 403 or 429,
/// so a 403 only counts as throttling when its message says so.
fn classify_status(repo_id: &RepoId, status: u16, message: &str) -> FetchError {
    match status {
        401 => FetchError::Auth(message.to_string()),
        429 => FetchError::RateLimit(message.to_string()),
        403 if message.to_lowercase().contains("rate limit") => {
            FetchError::RateLimit(message.to_string())
        }
        403 => FetchError::Auth(message.to_string()),
        404 => FetchError::NotFound(repo_id.clone()),
        500..=599 => FetchError::TransientNetwork(format!("{status}: {message}")),
        _ => FetchError::Rejected {
            status,
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_backoff_doubles() {
        let base = StdDuration::from_millis(100);
        assert_eq!(backoff(base, 1), StdDuration::from_millis(100));
        assert_eq!(backoff(base, 2), StdDuration::from_millis(200));
        assert_eq!(backoff(base, 4), StdDuration::from_millis(800));
    }

    fn repo_id() -> RepoId {
        RepoId::new("orgA", "repo1")
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: StdDuration::from_millis(100),
        }
    }

    #[test]
    fn test_classify_status_by_code() {
        let id = repo_id();
        assert!(matches!(classify_status(&id, 401, "Bad credentials"), FetchError::Auth(_)));
        assert!(matches!(
            classify_status(&id, 403, "Resource not accessible by integration"),
            FetchError::Auth(_)
        ));
        assert!(matches!(
            classify_status(&id, 404, "Not Found"),
            FetchError::NotFound(found) if found == id
        ));
        assert!(matches!(
            classify_status(&id, 502, "Server Error"),
            FetchError::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_status(&id, 422, "Validation Failed"),
            FetchError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn test_classify_status_rate_limits() {
        let id = repo_id();
        assert!(matches!(
            classify_status(&id, 403, "API rate limit exceeded for user ID 1."),
            FetchError::RateLimit(_)
        ));
        assert!(matches!(
            classify_status(&id, 403, "You have exceeded a secondary rate limit."),
            FetchError::RateLimit(_)
        ));
        assert!(matches!(
            classify_status(&id, 429, "Too Many Requests"),
            FetchError::RateLimit(_)
        ));
    }

    #[test]
    fn test_classify_status_ignores_misleading_text() {
        // Only the status decides; a 500 mentioning credentials is still transient.
        let id = repo_id();
        assert!(matches!(
            classify_status(&id, 500, "bad credentials cache unavailable"),
            FetchError::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_status(&id, 401, "rate limit"),
            FetchError::Auth(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result = policy(3)
            .run(&repo_id(), || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(FetchError::RateLimit("API rate limit exceeded".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= StdDuration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), FetchError> = policy(2)
            .run(&repo_id(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::TransientNetwork("connection reset".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::TransientNetwork(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_makes_one_attempt() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), FetchError> = policy(0)
            .run(&repo_id(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::RateLimit("API rate limit exceeded".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::RateLimit(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), FetchError> = policy(3)
            .run(&repo_id(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Auth("Bad credentials".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), StdDuration::ZERO);
    }

    #[test]
    fn test_new_requires_token() {
        let config = AppConfig::default();
        let err = GitHubFetcher::new(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Auth(_))
        ));
    }
}
