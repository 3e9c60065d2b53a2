use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    cache::FingerprintCache,
    config::Config,
    detector::{detect, Decision},
    error::{ReconcileError, Result},
    git::{CommandRunner, Git},
    lint::{LintTool, ToolRegistry},
    platform::CodeHost,
    pull_request::{upsert_pull_request, PullRequestAction},
    sequencer::MutationPlan,
    types::{reconciliation_branch, update_title, Fingerprint, RepositoryRef},
};

// ── States ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Init,
    Detecting,
    /// Terminal: nothing changed since the last reconciled fingerprint.
    Skipped,
    Fetching,
    Linting,
    NoFindings,
    HasFindings,
    Mutating,
    Reconciling,
    /// Terminal: the only state that writes the cache.
    Finalizing,
    /// Terminal: the cycle aborted and the cache was left untouched.
    Failed,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Finalizing | Self::Failed)
    }

    pub fn can_advance_to(self, next: CycleState) -> bool {
        use CycleState::*;
        match (self, next) {
            // A failed cache write is the one way out of Finalizing.
            (Finalizing, Failed) => true,
            (from, Failed) => !from.is_terminal(),
            (Init, Detecting)
            | (Detecting, Skipped)
            | (Detecting, Fetching)
            | (Fetching, Linting)
            | (Linting, NoFindings)
            | (Linting, HasFindings)
            | (NoFindings, Finalizing)
            | (HasFindings, Mutating)
            | (Mutating, Reconciling)
            | (Reconciling, Finalizing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Detecting => "detecting",
            Self::Skipped => "skipped",
            Self::Fetching => "fetching",
            Self::Linting => "linting",
            Self::NoFindings => "no_findings",
            Self::HasFindings => "has_findings",
            Self::Mutating => "mutating",
            Self::Reconciling => "reconciling",
            Self::Finalizing => "finalizing",
            Self::Failed => "failed",
        })
    }
}

struct Trail {
    label: String,
    states: Vec<CycleState>,
}

impl Trail {
    fn new(label: String) -> Self {
        Self {
            label,
            states: vec![CycleState::Init],
        }
    }

    fn current(&self) -> CycleState {
        self.states.last().copied().unwrap_or(CycleState::Init)
    }

    fn advance(&mut self, next: CycleState) {
        let from = self.current();
        debug_assert!(from.can_advance_to(next), "illegal transition {from} -> {next}");
        info!("{}: {from} -> {next}", self.label);
        self.states.push(next);
    }
}

// ── Results ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub repository: String,
    /// Terminal state reached: `skipped` or `finalizing`.
    pub outcome: CycleState,
    pub trail: Vec<CycleState>,
    /// Live fingerprint observed this cycle; written to the cache unless skipped.
    pub fingerprint: Option<Fingerprint>,
    pub offense_count: Option<u64>,
    pub branch: Option<String>,
    pub pull_request: Option<PullRequestAction>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("reconciliation failed while {failed_in}: {source}")]
pub struct CycleError {
    pub failed_in: CycleState,
    pub trail: Vec<CycleState>,
    pub source: ReconcileError,
}

#[derive(Default)]
struct Progress {
    fingerprint: Option<Fingerprint>,
    offense_count: Option<u64>,
    branch: Option<String>,
    pull_request: Option<PullRequestAction>,
}

// ── Pipeline ──────────────────────────────────────────────────────────────

/// One reconciliation cycle for the configured repository and lint tool.
pub struct Pipeline {
    config: Arc<Config>,
    host: Arc<dyn CodeHost>,
    registry: Arc<dyn ToolRegistry>,
    cache: Arc<dyn FingerprintCache>,
    runner: Arc<dyn CommandRunner>,
    tool: LintTool,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        host: Arc<dyn CodeHost>,
        registry: Arc<dyn ToolRegistry>,
        cache: Arc<dyn FingerprintCache>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let tool = LintTool::new(&config.lint_tool);
        Self {
            config,
            host,
            registry,
            cache,
            runner,
            tool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn slug(&self) -> String {
        format!("{}/{}", self.config.organization, self.config.repository)
    }

    /// Run one cycle to a terminal state.
    ///
    /// On error nothing has been written to the cache, so the next trigger
    /// redoes the whole cycle.
    pub async fn run_cycle(&self) -> std::result::Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let mut trail = Trail::new(self.slug());
        let mut progress = Progress::default();

        if let Err(source) = self.drive(&mut trail, &mut progress).await {
            let failed_in = trail.current();
            trail.advance(CycleState::Failed);
            error!("{}: cycle failed while {failed_in}: {source}", self.slug());
            return Err(CycleError {
                failed_in,
                trail: trail.states,
                source,
            });
        }

        Ok(CycleReport {
            repository: self.slug(),
            outcome: trail.current(),
            trail: trail.states,
            fingerprint: progress.fingerprint,
            offense_count: progress.offense_count,
            branch: progress.branch,
            pull_request: progress.pull_request,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn drive(&self, trail: &mut Trail, progress: &mut Progress) -> Result<()> {
        let org = self.config.organization.as_str();
        let name = self.config.repository.as_str();

        // ── Detecting
        trail.advance(CycleState::Detecting);
        let default_branch = self.host.default_branch(org, name).await?;
        let latest_commit_id = self
            .host
            .latest_commit(org, name, &default_branch)
            .await?;
        let repo = RepositoryRef {
            organization: org.to_string(),
            name: name.to_string(),
            default_branch,
            latest_commit_id,
        };
        let tool_version = self.registry.latest_version(&self.tool.name).await?;
        let live = Fingerprint::new(repo.latest_commit_id.clone(), tool_version.clone());
        let key = repo.cache_key();
        progress.fingerprint = Some(live.clone());

        if detect(self.cache.as_ref(), &key, &live).await == Decision::Skip {
            trail.advance(CycleState::Skipped);
            return Ok(());
        }

        // ── Fetching
        trail.advance(CycleState::Fetching);
        let scratch = self.scratch_dir()?;
        let git = Git::new(scratch.path().join(&repo.name)).with_token(&self.config.platform_token);
        let clone = git.clone_from(&self.config.clone_url());
        self.runner.run(&clone).await?.ensure_success(&clone)?;

        // ── Linting
        trail.advance(CycleState::Linting);
        let report = self.tool.run(self.runner.as_ref(), &git.repo_path).await?;
        progress.offense_count = Some(report.summary.offense_count);

        if report.has_findings() {
            trail.advance(CycleState::HasFindings);
            let branch =
                reconciliation_branch(&self.config.branch_prefix, &self.tool.name, &tool_version);
            let title = update_title(&self.tool.name, &tool_version);
            let body = report.render_message(&self.tool.display_name, &tool_version);
            progress.branch = Some(branch.clone());
            if report.corrected_count() == 0 {
                warn!(
                    "{}: {} offense(s) reported but none were auto-corrected; \
                     commit will have nothing to stage",
                    self.slug(),
                    report.summary.offense_count
                );
            }

            // ── Mutating
            trail.advance(CycleState::Mutating);
            MutationPlan::new(&git, &branch, &self.config.bot_identity, &title, &body)
                .execute(self.runner.as_ref())
                .await?;

            // ── Reconciling
            trail.advance(CycleState::Reconciling);
            let action =
                upsert_pull_request(self.host.as_ref(), &repo, &branch, &title, &body).await?;
            progress.pull_request = Some(action);
        } else {
            trail.advance(CycleState::NoFindings);
        }

        // ── Finalizing
        trail.advance(CycleState::Finalizing);
        self.cache.put(&key, &live).await?;
        info!(
            "{key}: recorded fingerprint {} / {}",
            live.commit_id, live.tool_version
        );
        Ok(())
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let parent = self
            .config
            .workspace_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tempfile::Builder::new()
            .prefix("stylelia-")
            .tempdir_in(&parent)
            .map_err(|e| ReconcileError::Execution {
                command: format!("create scratch workspace in {}", parent.display()),
                exit_code: -1,
                output: e.to_string(),
            })
    }
}
