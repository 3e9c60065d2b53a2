//! Lint report parsing and the summary message built from it.
//!
//! The tool's `--format json` output is decoded into [`LintReport`]. The same
//! report renders the commit body and the pull request body, so rendering is
//! a pure function of the report and the tool version.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(default)]
    pub rubocop_version: Option<String>,
    #[serde(default)]
    pub ruby_engine: Option<String>,
    #[serde(default)]
    pub ruby_version: Option<String>,
    #[serde(default)]
    pub ruby_patchlevel: Option<String>,
    #[serde(default)]
    pub ruby_platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offense {
    pub severity: String,
    pub message: String,
    #[serde(rename = "cop_name", default)]
    pub rule_id: String,
    #[serde(rename = "corrected", default)]
    pub was_auto_corrected: bool,
    #[serde(rename = "correctable", default)]
    pub is_auto_correctable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFinding {
    pub path: String,
    #[serde(default)]
    pub offenses: Vec<Offense>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub offense_count: u64,
    #[serde(default)]
    pub target_file_count: u64,
    #[serde(default)]
    pub inspected_file_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    #[serde(default)]
    pub metadata: ToolMetadata,
    /// Findings per file, in the order the tool reported them.
    pub files: Vec<FileFinding>,
    pub summary: Summary,
}

impl LintReport {
    /// Decode the tool's stdout.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(ReconcileError::malformed_report)
    }

    /// Whether the cycle has anything to commit.
    pub fn has_findings(&self) -> bool {
        self.summary.offense_count > 0
    }

    /// Offenses the tool fixed in place. Zero means the working tree is untouched.
    pub fn corrected_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.offenses)
            .filter(|o| o.was_auto_corrected)
            .count()
    }

    pub fn files_with_findings(&self) -> impl Iterator<Item = &FileFinding> {
        self.files.iter().filter(|f| !f.offenses.is_empty())
    }

    /// Render the commit/PR body.
    ///
    /// A header naming the tool version and offense count, then one block per
    /// file with findings listing its messages in tool order.
    pub fn render_message(&self, tool_display_name: &str, tool_version: &str) -> String {
        let mut out = format!(
            "Hi!\n\nI ran {tool_display_name} {tool_version} against this repo and here are the results.\n\n\
             Summary:\nOffence Count: {}\n\nChanges:",
            self.summary.offense_count
        );
        for file in self.files_with_findings() {
            let _ = write!(out, "\nIssue found and resolved with {}\n\n", file.path);
            for offense in &file.offenses {
                let _ = writeln!(out, "- {}", offense.message);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = r#"{
        "metadata": {
            "rubocop_version": "1.25.1",
            "ruby_engine": "ruby",
            "ruby_version": "3.0.3",
            "ruby_patchlevel": "157",
            "ruby_platform": "x86_64-linux"
        },
        "files": [
            {
                "path": "/tmp/path",
                "offenses": [
                    {"severity": "convention", "message": "First message", "cop_name": "Chef/Style/Foo", "corrected": true, "correctable": true}
                ]
            },
            {"path": "recipes/clean.rb", "offenses": []},
            {
                "path": "/tmp/another",
                "offenses": [
                    {"severity": "warning", "message": "Second message", "cop_name": "Chef/Correctness/Bar", "corrected": true, "correctable": true}
                ]
            }
        ],
        "summary": {"offense_count": 2, "target_file_count": 3, "inspected_file_count": 3}
    }"#;

    #[test]
    fn parse_cookstyle_output() {
        let report = LintReport::parse(TWO_FILES.as_bytes()).unwrap();
        assert_eq!(report.metadata.rubocop_version.as_deref(), Some("1.25.1"));
        assert_eq!(report.files.len(), 3);
        let offense = &report.files[0].offenses[0];
        assert_eq!(offense.rule_id, "Chef/Style/Foo");
        assert!(offense.was_auto_corrected);
        assert!(offense.is_auto_correctable);
        assert_eq!(report.summary.offense_count, 2);
        assert_eq!(report.summary.inspected_file_count, 3);
        assert!(report.has_findings());
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = LintReport::parse(b"Inspecting 3 files\n...").unwrap_err();
        assert!(matches!(err, ReconcileError::Decode { what: "lint report", .. }));
    }

    #[test]
    fn parse_rejects_missing_summary() {
        let err = LintReport::parse(br#"{"files": []}"#).unwrap_err();
        assert!(matches!(err, ReconcileError::Decode { .. }));
    }

    #[test]
    fn parse_tolerates_missing_metadata() {
        let report =
            LintReport::parse(br#"{"files": [], "summary": {"offense_count": 0}}"#).unwrap();
        assert_eq!(report.metadata, ToolMetadata::default());
        assert!(!report.has_findings());
    }

    #[test]
    fn render_lists_each_file_with_findings() {
        let report = LintReport::parse(TWO_FILES.as_bytes()).unwrap();
        let expected = "Hi!\n\nI ran Cookstyle v10.2.10 against this repo and here are the results.\n\n\
                        Summary:\nOffence Count: 2\n\nChanges:\
                        \nIssue found and resolved with /tmp/path\n\n- First message\n\
                        \nIssue found and resolved with /tmp/another\n\n- Second message\n";
        assert_eq!(report.render_message("Cookstyle", "v10.2.10"), expected);
    }

    #[test]
    fn render_without_findings_is_header_only() {
        let report =
            LintReport::parse(br#"{"files": [{"path": "a.rb", "offenses": []}], "summary": {"offense_count": 0}}"#)
                .unwrap();
        let msg = report.render_message("Cookstyle", "7.32.1");
        assert!(msg.contains("Offence Count: 0"));
        assert!(msg.ends_with("Changes:"));
        assert!(!msg.contains("Issue found"));
    }

    #[test]
    fn render_keeps_tool_order_within_a_file() {
        let report = LintReport {
            metadata: ToolMetadata::default(),
            files: vec![FileFinding {
                path: "metadata.rb".into(),
                offenses: ["zeta", "alpha", "mid"]
                    .iter()
                    .map(|m| Offense {
                        severity: "convention".into(),
                        message: (*m).into(),
                        rule_id: String::new(),
                        was_auto_corrected: true,
                        is_auto_correctable: true,
                    })
                    .collect(),
            }],
            summary: Summary {
                offense_count: 3,
                ..Summary::default()
            },
        };
        let msg = report.render_message("Cookstyle", "1.0");
        assert!(msg.ends_with("- zeta\n- alpha\n- mid\n"));
        assert_eq!(msg, report.render_message("Cookstyle", "1.0"));
    }

    #[test]
    fn corrected_count_ignores_uncorrectable_offenses() {
        let report = LintReport::parse(TWO_FILES.as_bytes()).unwrap();
        assert_eq!(report.corrected_count(), 2);

        let manual = LintReport::parse(
            br#"{"files": [{"path": "metadata.rb", "offenses": [
                {"severity": "warning", "message": "Avoid this", "cop_name": "Chef/Foo", "corrected": false, "correctable": false}
            ]}], "summary": {"offense_count": 1}}"#,
        )
        .unwrap();
        assert!(manual.has_findings());
        assert_eq!(manual.corrected_count(), 0);
    }
}
