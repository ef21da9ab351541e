//! Check command for Sieve.
//!
//! Runs the lexical gates over a draft file without recording anything.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::{read_draft, to_json};
use crate::gates::{GateRef, QualityGateResult};
use crate::pipeline::{runner, RunMode};

/// Options for the check command.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the check command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutput {
    /// Whether the command ran.
    pub success: bool,
    /// Whether every gate passed.
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub failed_gates: Vec<String>,
    pub results: Vec<QualityGateResult>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckOutput {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            passed: false,
            item_id: None,
            failed_gates: Vec::new(),
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The check command implementation.
pub struct CheckCommand {
    gates: Vec<GateRef>,
    mode: RunMode,
}

impl CheckCommand {
    pub fn new(gates: Vec<GateRef>, mode: RunMode) -> Self {
        Self { gates, mode }
    }

    /// Run the check command.
    pub async fn run(&self, draft_path: &Path, _options: &CheckOptions) -> CheckOutput {
        let draft = match read_draft(draft_path) {
            Ok(d) => d,
            Err(e) => return CheckOutput::failure(e.to_string()),
        };

        let outcome = runner::run(self.mode, &self.gates, &draft.input).await;
        CheckOutput {
            success: true,
            passed: outcome.passed,
            item_id: Some(draft.item_id),
            failed_gates: outcome.failed_gates,
            results: outcome.results,
            error: None,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CheckOutput, options: &CheckOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            to_json(output)
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &CheckOutput) -> String {
        if !output.success {
            return format!(
                "Check failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        let id = output.item_id.as_deref().unwrap_or("item");
        if output.passed {
            lines.push(format!("{}: all {} gate(s) passed", id, output.results.len()));
        } else {
            lines.push(format!("{}: rejected by {}", id, output.failed_gates.join(", ")));
        }

        for result in &output.results {
            let mark = if result.passed { "ok  " } else { "FAIL" };
            match (&result.reason, result.passed) {
                (Some(reason), false) => {
                    lines.push(format!("  {} {}: {}", mark, result.gate_name, reason))
                }
                _ => lines.push(format!("  {} {}", mark, result.gate_name)),
            }
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing::write_draft;
    use crate::gates::{fast_gates, names};
    use serde_json::json;
    use tempfile::TempDir;

    fn command() -> CheckCommand {
        CheckCommand::new(fast_gates(), RunMode::Tiered)
    }

    #[tokio::test]
    async fn test_check_passing_draft() {
        let dir = TempDir::new().unwrap();
        let path = write_draft(
            dir.path(),
            json!({"itemId": "g-1", "itemType": "grammar_rule", "text": "Definite articles", "language": "es", "level": "A1"}),
        );

        let output = command().run(&path, &CheckOptions::default()).await;

        assert!(output.success);
        assert!(output.passed);
        assert_eq!(output.results.len(), 5);
        assert!(output.failed_gates.is_empty());
    }

    #[tokio::test]
    async fn test_check_reports_cefr_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_draft(
            dir.path(),
            json!({"itemId": "g-2", "itemType": "grammar_rule", "text": "Subjunctive mood usage", "language": "es", "level": "A1"}),
        );

        let cmd = command();
        let output = cmd.run(&path, &CheckOptions::default()).await;

        assert!(output.success);
        assert!(!output.passed);
        assert!(output.failed_gates.contains(&names::CEFR.to_string()));

        let text = cmd.format_output(&output, &CheckOptions::default());
        assert!(text.contains("rejected by"));
        assert!(text.contains("FAIL"));
    }

    #[tokio::test]
    async fn test_check_malformed_draft_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_draft(dir.path(), json!({"itemId": "", "itemType": "word"}));

        let output = command().run(&path, &CheckOptions::default()).await;

        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[tokio::test]
    async fn test_check_quiet_and_json() {
        let dir = TempDir::new().unwrap();
        let path = write_draft(
            dir.path(),
            json!({"itemId": "w-1", "itemType": "word", "text": "el gato negro", "language": "es"}),
        );
        let cmd = command();
        let output = cmd.run(&path, &CheckOptions::default()).await;

        let quiet = CheckOptions { quiet: true, ..Default::default() };
        assert!(cmd.format_output(&output, &quiet).is_empty());

        let json = CheckOptions { json: true, ..Default::default() };
        let parsed: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &json)).unwrap();
        assert_eq!(parsed["itemId"], "w-1");
    }
}
