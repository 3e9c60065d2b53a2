use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Mutex,
};

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::{
    error::{ReconcileError, Result},
    types::BotIdentity,
};

// ── Commands ──────────────────────────────────────────────────────────────

/// A prepared external command. Nothing runs until a [`CommandRunner`] takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Extra environment. Never rendered by `Display`, so credentials may live here.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: &str, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend(env.iter().cloned());
        self
    }

    /// Program and subcommand only, e.g. `git commit`. Leading options and
    /// `-c key=value` pairs are skipped.
    pub fn label(&self) -> String {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "-c" {
                args.next();
            } else if !arg.starts_with('-') {
                return format!("{} {arg}", self.program);
            }
        }
        self.program.clone()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Turn a nonzero exit into [`ReconcileError::Execution`].
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(ReconcileError::Execution {
            command: spec.to_string(),
            exit_code: self.exit_code,
            output: self.combined_output().trim().to_string(),
        })
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion and capture its output. A nonzero exit is an
    /// `Ok` result; only a failure to spawn is an error.
    async fn run(&self, spec: &CommandSpec) -> Result<ExecResult>;
}

/// Spawns real processes.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecResult> {
        debug!("exec in {}: {spec}", spec.working_dir.display());
        let output = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ReconcileError::Execution {
                command: spec.to_string(),
                exit_code: -1,
                output: format!("failed to spawn: {e}"),
            })?;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(1),
        })
    }
}

/// Records every command and answers from a script instead of spawning.
///
/// Rules match on the rendered command line prefix (`"git push"`,
/// `"cookstyle"`); the first match wins and unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub struct RecordingRunner {
    rules: Mutex<Vec<(String, ExecResult)>>,
    recorded: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, prefix: &str, result: ExecResult) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prefix.to_string(), result));
        self
    }

    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rendered command lines, in execution order.
    pub fn command_lines(&self) -> Vec<String> {
        self.recorded().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecResult> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());
        let line = spec.to_string();
        let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}

// ── Git ───────────────────────────────────────────────────────────────────

/// Builds git commands for one working copy.
#[derive(Debug, Clone)]
pub struct Git {
    pub repo_path: PathBuf,
    env: Vec<(String, String)>,
}

impl Git {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            env: vec![("GIT_TERMINAL_PROMPT".into(), "0".into())],
        }
    }

    /// Authenticate HTTPS remotes with `token` through `GIT_CONFIG_*`
    /// variables, keeping it out of argv and logs.
    pub fn with_token(mut self, token: &str) -> Self {
        if token.is_empty() {
            return self;
        }
        let basic = base64::engine::general_purpose::STANDARD.encode(format!("x-access-token:{token}"));
        self.env.extend([
            ("GIT_CONFIG_COUNT".to_string(), "1".to_string()),
            ("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string()),
            (
                "GIT_CONFIG_VALUE_0".to_string(),
                format!("Authorization: Basic {basic}"),
            ),
        ]);
        self
    }

    fn git(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new("git", dir).envs(&self.env)
    }

    /// `git clone <url> <repo_path>`, run from the parent directory.
    pub fn clone_from(&self, url: &str) -> CommandSpec {
        let parent = self
            .repo_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.git(&parent)
            .args(["clone", "--quiet", url])
            .arg(self.repo_path.to_string_lossy())
    }

    /// Create or reset `branch` at HEAD and switch to it.
    pub fn checkout_new_branch(&self, branch: &str) -> CommandSpec {
        self.git(&self.repo_path).args(["checkout", "-B", branch])
    }

    pub fn add_all(&self) -> CommandSpec {
        self.git(&self.repo_path).args(["add", "-A"])
    }

    /// Where the commit message is written before committing. Sits next to
    /// the working copy so `add -A` never stages it.
    pub fn message_path(&self) -> PathBuf {
        self.repo_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stylelia-commit-msg")
    }

    /// Commit with the message read from `message_file`, keeping argv small
    /// however long the summary gets.
    pub fn commit(&self, identity: &BotIdentity, message_file: &Path) -> CommandSpec {
        self.git(&self.repo_path)
            .arg("-c")
            .arg(format!("user.name={}", identity.name))
            .arg("-c")
            .arg(format!("user.email={}", identity.email))
            .args(["commit", "--signoff", "-F"])
            .arg(message_file.to_string_lossy())
    }

    pub fn push_force(&self, branch: &str) -> CommandSpec {
        self.git(&self.repo_path)
            .args(["push", "--force", "origin", branch])
    }
}
