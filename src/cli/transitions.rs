//! Transitions command for Sieve.
//!
//! Prints the lifecycle states reachable from a given state.

use serde::{Deserialize, Serialize};

use crate::cli::to_json;
use crate::core::{is_terminal_state, next_valid_states, LifecycleState};

/// Options for the transitions command.
#[derive(Debug, Clone, Default)]
pub struct TransitionsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the transitions command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionsOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
    pub next_states: Vec<LifecycleState>,
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The transitions command implementation.
#[derive(Debug, Default)]
pub struct TransitionsCommand;

impl TransitionsCommand {
    pub fn new() -> Self {
        Self
    }

    /// Run the transitions command.
    pub fn run(&self, state: &str, _options: &TransitionsOptions) -> TransitionsOutput {
        match state.parse::<LifecycleState>() {
            Ok(state) => TransitionsOutput {
                success: true,
                state: Some(state),
                next_states: next_valid_states(state),
                terminal: is_terminal_state(state),
                error: None,
            },
            Err(e) => TransitionsOutput {
                success: false,
                state: None,
                next_states: Vec::new(),
                terminal: false,
                error: Some(e),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &TransitionsOutput, options: &TransitionsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return to_json(output);
        }

        match output.state {
            Some(state) if output.terminal => format!("{} is terminal.\n", state),
            Some(state) => {
                let next: Vec<&str> = output.next_states.iter().map(|s| s.as_str()).collect();
                format!("{} -> {}\n", state, next.join(", "))
            }
            None => format!(
                "Transitions failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_from_candidate() {
        let cmd = TransitionsCommand::new();
        let output = cmd.run("candidate", &TransitionsOptions::default());

        assert!(output.success);
        assert_eq!(output.next_states, vec![LifecycleState::Validated]);
        assert_eq!(
            cmd.format_output(&output, &TransitionsOptions::default()),
            "CANDIDATE -> VALIDATED\n"
        );
    }

    #[test]
    fn test_approved_is_terminal() {
        let cmd = TransitionsCommand::new();
        let output = cmd.run("APPROVED", &TransitionsOptions::default());

        assert!(output.terminal);
        assert!(output.next_states.is_empty());
        assert!(cmd
            .format_output(&output, &TransitionsOptions::default())
            .contains("terminal"));
    }

    #[test]
    fn test_unknown_state() {
        let output = TransitionsCommand::new().run("published", &TransitionsOptions::default());
        assert!(!output.success);
        assert!(output.error.unwrap().to_lowercase().contains("published"));
    }
}
