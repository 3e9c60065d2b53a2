//! Code-hosting platform operations the pipeline depends on.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    error::{ReconcileError, Result},
    types::{NewPullRequest, PullRequest},
};

#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn default_branch(&self, org: &str, repo: &str) -> Result<String>;

    async fn latest_commit(&self, org: &str, repo: &str, branch: &str) -> Result<String>;

    /// Open pull requests whose head is `head` in this repository.
    async fn list_open_pull_requests(
        &self,
        org: &str,
        repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>>;

    async fn create_pull_request(
        &self,
        org: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest>;

    /// Replace the body of pull request `number`; nothing else changes.
    async fn edit_pull_request_body(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<PullRequest>;
}

// ── In-memory host ────────────────────────────────────────────────────────

#[derive(Default)]
struct HostState {
    /// "org/repo" → (default branch, head commit)
    repos: HashMap<String, (String, String)>,
    pulls: Vec<PullRequest>,
    fail_create: Option<String>,
    create_calls: usize,
    edit_calls: usize,
}

/// A platform held in memory. Pull request numbers start at 1.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

fn slug(org: &str, repo: &str) -> String {
    format!("{org}/{repo}")
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_repo(self, org: &str, repo: &str, default_branch: &str, head: &str) -> Self {
        self.state()
            .repos
            .insert(slug(org, repo), (default_branch.to_string(), head.to_string()));
        self
    }

    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        self.state().pulls.push(pr);
        self
    }

    /// Move the default branch head, as a push to it would.
    pub fn set_head(&self, org: &str, repo: &str, head: &str) {
        if let Some(entry) = self.state().repos.get_mut(&slug(org, repo)) {
            entry.1 = head.to_string();
        }
    }

    /// Make every subsequent create call fail with a transport error.
    pub fn fail_creates(&self, message: &str) {
        self.state().fail_create = Some(message.to_string());
    }

    pub fn restore_creates(&self) {
        self.state().fail_create = None;
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.state().pulls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn edit_calls(&self) -> usize {
        self.state().edit_calls
    }
}

#[async_trait]
impl CodeHost for MemoryHost {
    async fn default_branch(&self, org: &str, repo: &str) -> Result<String> {
        self.state()
            .repos
            .get(&slug(org, repo))
            .map(|(branch, _)| branch.clone())
            .ok_or_else(|| ReconcileError::Transport(format!("404 Not Found: {org}/{repo}")))
    }

    async fn latest_commit(&self, org: &str, repo: &str, branch: &str) -> Result<String> {
        let state = self.state();
        match state.repos.get(&slug(org, repo)) {
            Some((default, head)) if default == branch => Ok(head.clone()),
            _ => Err(ReconcileError::Transport(format!(
                "404 Not Found: {org}/{repo}@{branch}"
            ))),
        }
    }

    async fn list_open_pull_requests(
        &self,
        _org: &str,
        _repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>> {
        Ok(self
            .state()
            .pulls
            .iter()
            .filter(|pr| pr.is_open && pr.head_branch == head)
            .cloned()
            .collect())
    }

    async fn create_pull_request(
        &self,
        _org: &str,
        _repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest> {
        let mut state = self.state();
        state.create_calls += 1;
        if let Some(message) = &state.fail_create {
            return Err(ReconcileError::Transport(message.clone()));
        }
        let number = state.pulls.iter().map(|p| p.number).max().unwrap_or(0) + 1;
        let created = PullRequest {
            number,
            head_branch: pr.head.clone(),
            base_branch: pr.base.clone(),
            title: pr.title.clone(),
            body: pr.body.clone(),
            is_open: true,
        };
        state.pulls.push(created.clone());
        Ok(created)
    }

    async fn edit_pull_request_body(
        &self,
        _org: &str,
        _repo: &str,
        number: u64,
        body: &str,
    ) -> Result<PullRequest> {
        let mut state = self.state();
        state.edit_calls += 1;
        let pr = state
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| ReconcileError::Transport(format!("404 Not Found: pull {number}")))?;
        pr.body = body.to_string();
        Ok(pr.clone())
    }
}
