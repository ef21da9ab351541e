//! Sieve - lifecycle and quality-gate engine for language-learning content
//!
//! Sieve moves corpus items through a fixed lifecycle (Draft, Candidate,
//! Validated, Approved), runs tiered quality gates with bounded retries,
//! records every gate result, and keeps approved items immutable behind an
//! approval and deprecation ledger.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod gates;
pub mod ledger;
pub mod pipeline;
pub mod storage;

pub use config::Config;
pub use core::{
    assert_valid_transition, is_terminal_state, is_valid_transition, next_valid_states,
    normalize_draft, CefrLevel, ContentType, DraftPayload, GateInput, ItemType, LifecycleState,
    NormalizedDraft, StateTransition,
};
pub use error::{Result, SieveError};
pub use gates::{fast_gates, standard_gates, GateRef, QualityGate, QualityGateResult, Tier};
pub use ledger::{
    assert_mutable, ApprovalEventRecord, ApprovalLedger, ApprovalType, DeprecationLedger,
    DeprecationRecord, MutationOperation,
};
pub use pipeline::{
    CurationPipeline, FailureRecorder, GateResultRecord, PipelineRepositories, RetryController,
    RetryOutcome, RetryPolicy, RunMode, TransitionExecutor, ValidationState, ValidationStatus,
};
pub use storage::FileGateResultStore;

// CLI commands
pub use cli::{
    CheckCommand, ConfigCommand, PruneCommand, StatusCommand, TransitionsCommand,
    ValidateCommand,
};
