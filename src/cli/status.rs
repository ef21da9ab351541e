//! Status command for Sieve.
//!
//! Shows the validation status derived from an entity's recorded attempts.

use serde::{Deserialize, Serialize};

use crate::cli::to_json;
use crate::pipeline::{FailureRecorder, ValidationState, ValidationStatus};

/// Options for the status command.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the status command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub success: bool,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ValidationStatus>,
    /// Failed gate results across all attempts.
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The status command implementation.
pub struct StatusCommand {
    recorder: FailureRecorder,
}

impl StatusCommand {
    pub fn new(recorder: FailureRecorder) -> Self {
        Self { recorder }
    }

    /// Run the status command.
    pub async fn run(&self, entity_type: &str, entity_id: &str, _options: &StatusOptions) -> StatusOutput {
        let mut output = StatusOutput {
            success: false,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            status: None,
            failure_count: 0,
            error: None,
        };

        let status = match self.recorder.get_validation_status(entity_type, entity_id).await {
            Ok(s) => s,
            Err(e) => {
                output.error = Some(e.to_string());
                return output;
            }
        };
        match self.recorder.get_failure_count(entity_type, entity_id).await {
            Ok(count) => output.failure_count = count,
            Err(e) => {
                output.error = Some(e.to_string());
                return output;
            }
        }

        output.success = true;
        output.status = Some(status);
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatusOutput, options: &StatusOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            to_json(output)
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StatusOutput) -> String {
        let status = match (&output.status, output.success) {
            (Some(s), true) => s,
            _ => {
                return format!(
                    "Status failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                )
            }
        };

        let label = format!("{} {}", output.entity_type, output.entity_id);
        let mut lines = Vec::new();
        match status.status {
            ValidationState::NotValidated => lines.push(format!("{}: not validated", label)),
            ValidationState::Passed => lines.push(format!(
                "{}: passed (attempt {})",
                label, status.attempt_number
            )),
            ValidationState::Failed => {
                lines.push(format!(
                    "{}: failed (attempt {}/{})",
                    label,
                    status.attempt_number,
                    self.recorder.max_attempts()
                ));
                lines.push(format!("  Failed gates: {}", status.failed_gates.join(", ")));
                lines.push(format!(
                    "  Can retry: {}",
                    if status.can_retry { "yes" } else { "no" }
                ));
            }
        }
        if output.failure_count > 0 {
            lines.push(format!("  Total failures recorded: {}", output.failure_count));
        }

        lines.join("\n") + "\n"
    }
}
