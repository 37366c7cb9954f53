//! Pull request records as returned by the GitHub REST API.
//!
//! Only the fields the statistics need are typed. Everything else the API sends
//! is kept in `extra` so a record written to the raw store reads back unchanged.

use crate::error::CatalogError;
use chrono::{DateTime, FixedOffset};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The organization owning the repository (e.g., "emberjs").
    pub org: String,
    /// The name of the repository (e.g., "ember.js").
    pub repo: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    /// Builds an id from user input, rejecting names that are not plain GitHub names.
    pub fn parse(org: &str, repo: &str) -> Result<Self, CatalogError> {
        validate_name("organization", org)?;
        validate_name("repository", repo)?;
        Ok(Self::new(org, repo))
    }

    /// File stem shared by the raw and statistics documents: `<org>--<repo>`.
    pub fn file_stem(&self) -> String {
        format!("{}--{}", self.org, self.repo)
    }
}

/// Checks that `name` uses only the characters GitHub allows in owner and
/// repository names. Names end up in file paths, so `..` is refused too.
pub fn validate_name(kind: &str, name: &str) -> Result<(), CatalogError> {
    let valid = !name.is_empty()
        && name != "."
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CatalogError::Invalid(format!(
            "{kind} name '{name}' is not a valid GitHub name"
        )))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// An ISO-8601 timestamp that remembers the exact string it was decoded from.
///
/// Equality compares the raw strings, matching how GitHub reports `closed_at`
/// and `merged_at` with the same value when a pull request is merged.
#[derive(Clone, Debug)]
pub struct Timestamp {
    raw: String,
    parsed: DateTime<FixedOffset>,
}

impl Timestamp {
    pub fn parse(raw: impl Into<String>) -> Result<Self, chrono::ParseError> {
        let raw = raw.into();
        let parsed = DateTime::parse_from_rfc3339(&raw)?;
        Ok(Self { raw, parsed })
    }

    pub fn as_datetime(&self) -> DateTime<FixedOffset> {
        self.parsed
    }

    /// Elapsed time from `earlier` to `self` in fractional days, at millisecond precision.
    pub fn days_since(&self, earlier: &Timestamp) -> f64 {
        (self.parsed - earlier.parsed).num_milliseconds() as f64 / MILLIS_PER_DAY
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Timestamp {}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(raw.as_str())
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}

/// The author of a pull request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A pull request as listed by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// "open" or "closed"; any other value is ignored by the statistics.
    pub state: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub merged_at: Option<Timestamp>,
    pub user: Author,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PullRequestRecord {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }

    /// A closed pull request counts as merged when it was closed by the merge itself.
    pub fn is_merged(&self) -> bool {
        self.closed_at == self.merged_at
    }

    /// Days between creation and closure, if the record has been closed.
    pub fn open_time_days(&self) -> Option<f64> {
        self.closed_at
            .as_ref()
            .map(|closed_at| closed_at.days_since(&self.created_at))
    }
}
