//! Validation pipeline for Sieve.
//!
//! - [`runner`]: executes a gate list sequentially or tier by tier
//! - [`recorder`]: persists gate results per attempt and derives status
//! - [`retry`]: bounded automatic and manual re-validation
//! - [`executor`]: applies lifecycle transitions and records approvals
//! - [`curation`]: the end-to-end operations built from the above

pub mod curation;
pub mod executor;
pub mod recorder;
pub mod retry;
pub mod runner;

pub use curation::{CurationPipeline, PipelineRepositories};
pub use executor::{location_for, TransitionExecutor};
pub use recorder::{FailureRecorder, GateResultRecord, ValidationState, ValidationStatus};
pub use retry::{
    RetryController, RetryOutcome, RetryPolicy, DEFAULT_DELAYS_MS, DEFAULT_MAX_ATTEMPTS,
    NON_RETRYABLE_GATES,
};
pub use runner::{run, run_gates, run_gates_by_tier, GateRunOutcome, RunMode};
