//! Prune command for Sieve.
//!
//! Deletes recorded gate results older than the retention window.

use serde::{Deserialize, Serialize};

use crate::cli::to_json;
use crate::config::MIN_DAYS_TO_KEEP;
use crate::pipeline::FailureRecorder;

/// Options for the prune command.
#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Override the configured retention window.
    pub days: Option<u32>,
}

/// Output format for the prune command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneOutput {
    pub success: bool,
    pub days_to_keep: u32,
    /// Number of gate results deleted.
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The prune command implementation.
pub struct PruneCommand {
    recorder: FailureRecorder,
    days_to_keep: u32,
}

impl PruneCommand {
    pub fn new(recorder: FailureRecorder, days_to_keep: u32) -> Self {
        Self {
            recorder,
            days_to_keep,
        }
    }

    /// Run the prune command.
    pub async fn run(&self, options: &PruneOptions) -> PruneOutput {
        let days_to_keep = options.days.unwrap_or(self.days_to_keep);
        if days_to_keep < MIN_DAYS_TO_KEEP {
            return PruneOutput {
                success: false,
                days_to_keep,
                removed: 0,
                error: Some(format!("--days must be at least {}", MIN_DAYS_TO_KEEP)),
            };
        }

        match self.recorder.clear_old_results(days_to_keep).await {
            Ok(removed) => PruneOutput {
                success: true,
                days_to_keep,
                removed,
                error: None,
            },
            Err(e) => PruneOutput {
                success: false,
                days_to_keep,
                removed: 0,
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &PruneOutput, options: &PruneOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return to_json(output);
        }

        if !output.success {
            return format!(
                "Prune failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }
        if output.removed == 0 {
            return format!("No gate results older than {} day(s).\n", output.days_to_keep);
        }
        format!(
            "Removed {} gate result(s) older than {} day(s).\n",
            output.removed, output.days_to_keep
        )
    }
}
