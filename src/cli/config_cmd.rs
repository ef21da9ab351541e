//! Config command for Sieve.
//!
//! Shows the effective configuration, or writes it as the project config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Config;

/// Options for the config command.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Write the effective config to `.sieve/config.toml`.
    pub init: bool,
    /// Overwrite an existing project config.
    pub force: bool,
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOutput {
    pub success: bool,
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Path written by `--init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
    cwd: PathBuf,
}

impl ConfigCommand {
    pub fn new(config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cwd: cwd.into(),
        }
    }

    /// Run the config command.
    pub fn run(&self, options: &ConfigOptions) -> ConfigOutput {
        let mut output = ConfigOutput {
            success: true,
            config: self.config.clone(),
            data_dir: self.config.data_dir(),
            saved_to: None,
            error: None,
        };

        if options.init {
            let target = self.cwd.join(".sieve").join("config.toml");
            if target.exists() && !options.force {
                output.success = false;
                output.error = Some(format!(
                    "{} already exists (use --force to overwrite)",
                    target.display()
                ));
                return output;
            }
            match self.config.save_project(&self.cwd) {
                Ok(path) => output.saved_to = Some(path),
                Err(e) => {
                    output.success = false;
                    output.error = Some(e.to_string());
                }
            }
        }

        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ConfigOutput, options: &ConfigOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Config failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut text = String::new();
        if let Some(path) = &output.saved_to {
            text.push_str(&format!("Wrote {}\n\n", path.display()));
        }
        if let Some(dir) = &output.data_dir {
            text.push_str(&format!("# data dir: {}\n", dir.display()));
        }
        text.push_str(&toml::to_string_pretty(&output.config).unwrap_or_default());
        text
    }
}
