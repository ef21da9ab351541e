//! Sieve - lifecycle and quality-gate engine for language-learning content
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sieve::config::{sieve_home, Config};
use sieve::core::ItemType;
use sieve::error::exit_codes;
use sieve::gates::fast_gates;
use sieve::pipeline::{FailureRecorder, RetryController};
use sieve::storage::FileGateResultStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Sieve - lifecycle and quality-gate engine for language-learning content
#[derive(Parser)]
#[command(name = "sieve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lexical gates over a draft JSON file without recording
    Check {
        /// Path to the draft JSON file
        draft: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Validate a draft with bounded retries, recording every attempt
    Validate {
        /// Path to the draft JSON file
        draft: PathBuf,
        /// Make exactly one operator-triggered attempt
        #[arg(long)]
        manual: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the validation status of an item
    Status {
        /// Item type (word, grammar_rule, exercise)
        item_type: String,
        /// Item identifier
        item_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Delete recorded gate results older than the retention window
    Prune {
        /// Days of results to keep (defaults to retention.days_to_keep)
        #[arg(long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// List the lifecycle states reachable from a state
    Transitions {
        /// Lifecycle state (DRAFT, CANDIDATE, VALIDATED, APPROVED)
        state: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write it to .sieve/config.toml
        #[arg(long)]
        init: bool,
        /// Overwrite an existing project config
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("sieve error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr, filtered by `SIEVE_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SIEVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.sieve/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("sieve panic: {}", info);

        if let Some(home) = sieve_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Run the CLI and return the exit code.
fn run() -> CliResult {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = Config::load_from_cwd(&cwd);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Check { draft, json, quiet } => {
            runtime.block_on(run_check(&draft, json, quiet, &config))
        }
        Commands::Validate {
            draft,
            manual,
            json,
            quiet,
        } => runtime.block_on(run_validate(&draft, manual, json, quiet, &config)),
        Commands::Status {
            item_type,
            item_id,
            json,
            quiet,
        } => runtime.block_on(run_status(&item_type, &item_id, json, quiet, &config)),
        Commands::Prune { days, json, quiet } => {
            runtime.block_on(run_prune(days, json, quiet, &config))
        }
        Commands::Transitions { state, json, quiet } => run_transitions(&state, json, quiet),
        Commands::Config {
            init,
            force,
            json,
            quiet,
        } => run_config(init, force, json, quiet, config, &cwd),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

/// Exit code for a gate run: error, rejected, or success.
fn gate_exit_code(success: bool, passed: bool) -> ExitCode {
    match (success, passed) {
        (false, _) => ExitCode::from(exit_codes::ERROR as u8),
        (true, false) => ExitCode::from(exit_codes::REJECTED as u8),
        (true, true) => ExitCode::from(exit_codes::SUCCESS as u8),
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
        if !formatted.ends_with('\n') {
            println!();
        }
    }
}

/// Failure recorder over the file store in the configured data directory.
fn open_recorder(config: &Config) -> Result<FailureRecorder, Box<dyn std::error::Error>> {
    let store = match config.data_dir() {
        Some(dir) => FileGateResultStore::with_dir(dir)?,
        None => FileGateResultStore::new()?,
    };
    Ok(FailureRecorder::new(
        Arc::new(store),
        config.retry.max_attempts,
    ))
}

async fn run_check(draft: &Path, json: bool, quiet: bool, config: &Config) -> CliResult {
    use sieve::cli::check::{CheckCommand, CheckOptions};

    let cmd = CheckCommand::new(fast_gates(), config.retry.mode);
    let options = CheckOptions { json, quiet };

    let output = cmd.run(draft, &options).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(gate_exit_code(output.success, output.passed))
}

async fn run_validate(
    draft: &Path,
    manual: bool,
    json: bool,
    quiet: bool,
    config: &Config,
) -> CliResult {
    use sieve::cli::validate::{ValidateCommand, ValidateOptions};

    let recorder = open_recorder(config)?;
    // Repository-backed gates need a populated corpus, which the CLI does
    // not have; it runs the lexical tier only.
    let controller = RetryController::new(fast_gates(), recorder, config.retry.to_policy())
        .with_mode(config.retry.mode);

    let cmd = ValidateCommand::new(controller);
    let options = ValidateOptions {
        json,
        quiet,
        manual,
    };

    let output = cmd.run(draft, &options).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(gate_exit_code(output.success, output.passed))
}

async fn run_status(
    item_type: &str,
    item_id: &str,
    json: bool,
    quiet: bool,
    config: &Config,
) -> CliResult {
    use sieve::cli::status::{StatusCommand, StatusOptions};

    let item_type: ItemType = item_type.parse()?;
    let cmd = StatusCommand::new(open_recorder(config)?);
    let options = StatusOptions { json, quiet };

    let output = cmd.run(item_type.as_str(), item_id, &options).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

async fn run_prune(days: Option<u32>, json: bool, quiet: bool, config: &Config) -> CliResult {
    use sieve::cli::prune::{PruneCommand, PruneOptions};

    let cmd = PruneCommand::new(open_recorder(config)?, config.retention.days_to_keep);
    let options = PruneOptions { json, quiet, days };

    let output = cmd.run(&options).await;
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_transitions(state: &str, json: bool, quiet: bool) -> CliResult {
    use sieve::cli::transitions::{TransitionsCommand, TransitionsOptions};

    let cmd = TransitionsCommand::new();
    let options = TransitionsOptions { json, quiet };

    let output = cmd.run(state, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_config(
    init: bool,
    force: bool,
    json: bool,
    quiet: bool,
    config: Config,
    cwd: &Path,
) -> CliResult {
    use sieve::cli::config_cmd::{ConfigCommand, ConfigOptions};

    let cmd = ConfigCommand::new(config, cwd);
    let options = ConfigOptions {
        json,
        quiet,
        init,
        force,
    };

    let output = cmd.run(&options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_to_exit_code() {
        assert_eq!(
            success_to_exit_code(true),
            ExitCode::from(exit_codes::SUCCESS as u8)
        );
        assert_eq!(
            success_to_exit_code(false),
            ExitCode::from(exit_codes::ERROR as u8)
        );
    }

    #[test]
    fn test_gate_exit_code() {
        assert_eq!(gate_exit_code(true, true), ExitCode::from(exit_codes::SUCCESS as u8));
        assert_eq!(gate_exit_code(true, false), ExitCode::from(exit_codes::REJECTED as u8));
        assert_eq!(gate_exit_code(false, false), ExitCode::from(exit_codes::ERROR as u8));
    }

    #[test]
    fn test_cli_parse_validate_manual() {
        let cli = Cli::parse_from(["sieve", "validate", "draft.json", "--manual", "--json"]);
        match cli.command {
            Commands::Validate {
                draft,
                manual,
                json,
                quiet,
            } => {
                assert_eq!(draft, PathBuf::from("draft.json"));
                assert!(manual);
                assert!(json);
                assert!(!quiet);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["sieve", "status", "word", "w-1"]);
        match cli.command {
            Commands::Status {
                item_type, item_id, ..
            } => {
                assert_eq!(item_type, "word");
                assert_eq!(item_id, "w-1");
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_prune_days() {
        let cli = Cli::parse_from(["sieve", "prune", "--days", "30"]);
        match cli.command {
            Commands::Prune { days, .. } => assert_eq!(days, Some(30)),
            _ => panic!("Expected Prune command"),
        }
    }
}
