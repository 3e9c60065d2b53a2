//! Publishes the lint fixes: branch, stage, commit, force-push.
//!
//! The plan is built as plain [`CommandSpec`] values and executed strictly in
//! order. The first failing step aborts the rest. Force-push makes a rerun for
//! the same tool version replace the branch tip instead of stacking commits.
//!
//! The commit message goes through a file next to the working copy. A large
//! cookbook can produce a summary bigger than a single argv entry allows.

use std::path::PathBuf;

use tracing::info;

use crate::{
    error::{ReconcileError, Result},
    git::{CommandRunner, CommandSpec, Git},
    types::BotIdentity,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub branch: String,
    /// Written to `message_path` before the first step runs.
    pub message: String,
    pub message_path: PathBuf,
    pub steps: Vec<CommandSpec>,
}

impl MutationPlan {
    pub fn new(git: &Git, branch: &str, identity: &BotIdentity, title: &str, body: &str) -> Self {
        let message_path = git.message_path();
        Self {
            branch: branch.to_string(),
            message: format!("{title}\n\n{body}"),
            steps: vec![
                git.checkout_new_branch(branch),
                git.add_all(),
                git.commit(identity, &message_path),
                git.push_force(branch),
            ],
            message_path,
        }
    }

    pub async fn execute(&self, runner: &dyn CommandRunner) -> Result<()> {
        tokio::fs::write(&self.message_path, &self.message)
            .await
            .map_err(|e| ReconcileError::Execution {
                command: format!("write commit message to {}", self.message_path.display()),
                exit_code: -1,
                output: e.to_string(),
            })?;

        for (i, step) in self.steps.iter().enumerate() {
            runner.run(step).await?.ensure_success(step)?;
            info!(
                "{}: step {}/{} done: {}",
                self.branch,
                i + 1,
                self.steps.len(),
                step.label()
            );
        }
        Ok(())
    }
}
