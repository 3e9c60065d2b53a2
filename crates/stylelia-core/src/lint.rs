//! The lint tool: how to invoke it and where its latest version comes from.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{ReconcileError, Result},
    git::{CommandRunner, CommandSpec},
    report::LintReport,
};

/// Exit codes that still carry a report: 0 clean, 1 offenses found.
const REPORTING_EXIT_CODES: [i32; 2] = [0, 1];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintTool {
    /// Binary and gem name, e.g. `cookstyle`.
    pub name: String,
    /// Name used in the summary message, e.g. `Cookstyle`.
    pub display_name: String,
}

impl LintTool {
    pub fn new(name: &str) -> Self {
        let mut chars = name.chars();
        let display_name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            name: name.to_string(),
            display_name,
        }
    }

    pub fn cookstyle() -> Self {
        Self::new("cookstyle")
    }

    /// Auto-correct with JSON output.
    pub fn command(&self, working_copy: &Path) -> CommandSpec {
        CommandSpec::new(&self.name, working_copy).args(["-a", "--format", "json"])
    }

    /// Run against `working_copy` and parse the report from stdout.
    pub async fn run(&self, runner: &dyn CommandRunner, working_copy: &Path) -> Result<LintReport> {
        let spec = self.command(working_copy);
        let result = runner.run(&spec).await?;
        if !REPORTING_EXIT_CODES.contains(&result.exit_code) {
            return Err(ReconcileError::Execution {
                command: spec.to_string(),
                exit_code: result.exit_code,
                output: result.combined_output().trim().to_string(),
            });
        }
        let report = LintReport::parse(result.stdout.as_bytes())?;
        info!(
            "{}: {} offense(s) in {} inspected file(s)",
            self.name, report.summary.offense_count, report.summary.inspected_file_count
        );
        Ok(report)
    }
}

/// Where the tool's latest published version is looked up.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn latest_version(&self, tool: &str) -> Result<String>;
}

/// Answers with a fixed version.
pub struct StaticRegistry {
    pub version: String,
}

impl StaticRegistry {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }
}

#[async_trait]
impl ToolRegistry for StaticRegistry {
    async fn latest_version(&self, _tool: &str) -> Result<String> {
        Ok(self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{ExecResult, RecordingRunner};

    const CLEAN: &str = r#"{"metadata":{},"files":[],"summary":{"offense_count":0,"target_file_count":0,"inspected_file_count":4}}"#;

    #[test]
    fn display_name_is_capitalized() {
        assert_eq!(LintTool::cookstyle().display_name, "Cookstyle");
        assert_eq!(LintTool::new("rubocop").display_name, "Rubocop");
        assert_eq!(LintTool::new("").display_name, "");
    }

    #[test]
    fn command_requests_autocorrect_json() {
        let spec = LintTool::cookstyle().command(Path::new("/scratch/widgets"));
        assert_eq!(spec.to_string(), "cookstyle -a --format json");
        assert_eq!(spec.working_dir, Path::new("/scratch/widgets"));
    }

    #[tokio::test]
    async fn offenses_exit_code_still_parses() {
        let payload = r#"{"files":[{"path":"a.rb","offenses":[{"severity":"convention","message":"m"}]}],"summary":{"offense_count":1}}"#;
        let runner = RecordingRunner::new().respond(
            "cookstyle",
            ExecResult {
                stdout: payload.into(),
                stderr: String::new(),
                exit_code: 1,
            },
        );
        let report = LintTool::cookstyle().run(&runner, Path::new("/w")).await.unwrap();
        assert!(report.has_findings());
    }

    #[tokio::test]
    async fn clean_run_parses() {
        let runner = RecordingRunner::new().respond("cookstyle", ExecResult::ok(CLEAN));
        let report = LintTool::cookstyle().run(&runner, Path::new("/w")).await.unwrap();
        assert!(!report.has_findings());
        assert_eq!(report.summary.inspected_file_count, 4);
    }

    #[tokio::test]
    async fn crash_exit_code_is_an_execution_error() {
        let runner =
            RecordingRunner::new().respond("cookstyle", ExecResult::failed(2, "invalid option"));
        let err = LintTool::cookstyle().run(&runner, Path::new("/w")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Execution { exit_code: 2, .. }));
    }

    #[tokio::test]
    async fn garbage_stdout_is_malformed() {
        let runner = RecordingRunner::new().respond("cookstyle", ExecResult::ok("Inspecting..."));
        let err = LintTool::cookstyle().run(&runner, Path::new("/w")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Decode { .. }));
    }

    #[tokio::test]
    async fn static_registry_returns_its_version() {
        let registry = StaticRegistry::new("7.32.1");
        assert_eq!(registry.latest_version("cookstyle").await.unwrap(), "7.32.1");
    }
}
