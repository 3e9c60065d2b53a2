use std::fmt;

use serde::{Deserialize, Serialize};

// ── Repository ───────────────────────────────────────────────────────────

/// One reconciliation target as seen on the platform during this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub organization: String,
    pub name: String,
    pub default_branch: String,
    /// Head of `default_branch`, fetched live every cycle. Never cached as-is.
    pub latest_commit_id: String,
}

impl RepositoryRef {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.organization, &self.name)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }
}

/// Identifies a fingerprint slot. Only GitHub is supported as a source today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub organization: String,
    pub repository: String,
}

impl CacheKey {
    pub fn new(organization: &str, repository: &str) -> Self {
        Self {
            organization: organization.to_string(),
            repository: repository.to_string(),
        }
    }

    /// Storage path, e.g. `github/acme/widgets`.
    pub fn path(&self) -> String {
        format!("github/{}/{}", self.organization, self.repository)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// ── Fingerprint ──────────────────────────────────────────────────────────

/// The last successfully reconciled (commit, tool version) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub commit_id: String,
    pub tool_version: String,
}

impl Fingerprint {
    pub fn new(commit_id: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            commit_id: commit_id.into(),
            tool_version: tool_version.into(),
        }
    }
}

// ── Pull requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head_branch: String,
    pub base_branch: String,
    pub title: String,
    pub body: String,
    pub is_open: bool,
}

/// Payload for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub maintainer_can_modify: bool,
}

// ── Bot identity ─────────────────────────────────────────────────────────

/// Author and committer of every reconciliation commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub name: String,
    pub email: String,
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            name: "Stylelia".into(),
            email: "stylelia@users.noreply.github.com".into(),
        }
    }
}

// ── Naming ───────────────────────────────────────────────────────────────

/// Branch that carries the fixes for one tool version: `<prefix>/<tool>_<version>`.
///
/// Same version, same branch. Branch creation and PR lookup rely on this.
pub fn reconciliation_branch(prefix: &str, tool: &str, version: &str) -> String {
    format!("{prefix}/{tool}_{version}")
}

/// Commit and pull request title: `<tool>: <version> updates`.
pub fn update_title(tool: &str, version: &str) -> String {
    format!("{tool}: {version} updates")
}
