//! The organizations and repositories to analyze.
//!
//! The built-in table is maintained by hand. A JSON file with the same shape can
//! replace it through `CATALOG_PATH`.

use crate::error::CatalogError;
use crate::types::{validate_name, RepoId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CATALOG: &[(&str, &[&str])] = &[
    (
        "emberjs",
        &[
            "data",
            "ember.js",
            "ember-test-helpers",
            "ember-qunit",
            "ember-render-modifiers",
            "ember-test-waiters",
            "ember-inspector",
        ],
    ),
    (
        "ember-cli",
        &[
            "ember-cli",
            "eslint-plugin-ember",
            "ember-try",
            "ember-page-title",
        ],
    ),
    ("glimmerjs", &["glimmer.js", "glimmer-vm"]),
];

/// One organization and the repositories to fetch from it, in fetch order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRepoCatalogEntry {
    pub organization_name: String,
    pub repository_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<OrgRepoCatalogEntry>,
}

impl Catalog {
    /// Builds a catalog, rejecting names GitHub would not accept and duplicate organizations.
    pub fn new(entries: Vec<OrgRepoCatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            validate_name("organization", &entry.organization_name)?;
            if !seen.insert(entry.organization_name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "organization '{}' is listed more than once",
                    entry.organization_name
                )));
            }
            for repo in &entry.repository_names {
                validate_name("repository", repo)?;
            }
        }
        Ok(Self { entries })
    }

    /// The hand-maintained default catalog.
    pub fn builtin() -> Self {
        let entries = BUILTIN_CATALOG
            .iter()
            .map(|(org, repos)| OrgRepoCatalogEntry {
                organization_name: org.to_string(),
                repository_names: repos.iter().map(|r| r.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }

    /// Reads a JSON array of catalog entries.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let load_error = |reason: String| CatalogError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let entries: Vec<OrgRepoCatalogEntry> =
            serde_json::from_str(&contents).map_err(|e| load_error(e.to_string()))?;
        Self::new(entries)
    }

    /// Loads the catalog from `path` when given, otherwise the built-in table.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn entries(&self) -> &[OrgRepoCatalogEntry] {
        &self.entries
    }

    pub fn list_organizations(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.organization_name.as_str())
            .collect()
    }

    pub fn list_repositories(&self, organization_name: &str) -> Result<&[String], CatalogError> {
        self.entries
            .iter()
            .find(|entry| entry.organization_name == organization_name)
            .map(|entry| entry.repository_names.as_slice())
            .ok_or_else(|| CatalogError::UnknownOrganization(organization_name.to_string()))
    }

    /// Every (organization, repository) pair, in catalog order.
    pub fn list_all_pairs(&self) -> Vec<RepoId> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .repository_names
                    .iter()
                    .map(|repo| RepoId::new(&entry.organization_name, repo))
            })
            .collect()
    }
}
