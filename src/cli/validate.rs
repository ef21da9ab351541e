//! Validate command for Sieve.
//!
//! Runs a draft through the retry controller and records every attempt, so
//! later `status` and `validate --manual` calls see the history.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::{read_draft, to_json};
use crate::gates::QualityGateResult;
use crate::pipeline::RetryController;

/// Options for the validate command.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Make exactly one operator-triggered attempt.
    pub manual: bool,
}

/// Output format for the validate command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOutput {
    /// Whether the command ran.
    pub success: bool,
    /// Whether the last attempt passed every gate.
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub attempt_number: u32,
    pub failed_gates: Vec<String>,
    pub can_retry: bool,
    pub results: Vec<QualityGateResult>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateOutput {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            passed: false,
            entity_type: None,
            entity_id: None,
            attempt_number: 0,
            failed_gates: Vec::new(),
            can_retry: false,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The validate command implementation.
pub struct ValidateCommand {
    controller: RetryController,
}

impl ValidateCommand {
    pub fn new(controller: RetryController) -> Self {
        Self { controller }
    }

    /// Run the validate command.
    pub async fn run(&self, draft_path: &Path, options: &ValidateOptions) -> ValidateOutput {
        let draft = match read_draft(draft_path) {
            Ok(d) => d,
            Err(e) => return ValidateOutput::failure(e.to_string()),
        };
        let entity_type = draft.item_type.as_str();

        let result = if options.manual {
            self.controller
                .manual_retry(entity_type, &draft.item_id, &draft.input)
                .await
        } else {
            self.controller
                .validate_with_retry(entity_type, &draft.item_id, &draft.input)
                .await
        };

        match result {
            Ok(outcome) => ValidateOutput {
                success: true,
                passed: outcome.success,
                entity_type: Some(entity_type.to_string()),
                entity_id: Some(draft.item_id),
                attempt_number: outcome.attempt_number,
                failed_gates: outcome.failed_gates,
                can_retry: outcome.can_retry,
                results: outcome.results,
                error: None,
            },
            Err(e) => ValidateOutput {
                entity_type: Some(entity_type.to_string()),
                entity_id: Some(draft.item_id),
                ..ValidateOutput::failure(e.to_string())
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ValidateOutput, options: &ValidateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            to_json(output)
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ValidateOutput) -> String {
        if !output.success {
            return format!(
                "Validate failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let id = output.entity_id.as_deref().unwrap_or("item");
        let mut lines = Vec::new();
        if output.passed {
            lines.push(format!("{}: passed on attempt {}", id, output.attempt_number));
        } else {
            lines.push(format!(
                "{}: attempt {} failed ({})",
                id,
                output.attempt_number,
                output.failed_gates.join(", ")
            ));
            for result in output.results.iter().filter(|r| !r.passed) {
                if let Some(reason) = &result.reason {
                    lines.push(format!("  {}: {}", result.gate_name, reason));
                }
            }
            if output.can_retry {
                lines.push("Retry with: sieve validate --manual".to_string());
            }
        }

        lines.join("\n") + "\n"
    }
}
