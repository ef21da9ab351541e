//! Unified error types for Sieve.
//!
//! Gate failures are not errors: a failing quality check is reported as a
//! [`QualityGateResult`](crate::gates::QualityGateResult) with `passed = false`
//! and is the expected, retryable case. The variants here represent protocol
//! violations (illegal transitions, re-deprecation, missing operator) and
//! infrastructure failures. They always propagate to the caller.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::LifecycleState;

/// A single field-level problem found while validating a payload's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Name of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldIssue {
    /// Create a new field issue.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The main error type for Sieve operations.
#[derive(Error, Debug)]
pub enum SieveError {
    /// A state transition outside the fixed lifecycle graph was attempted.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// An UPDATE or DELETE was attempted against an approved item.
    #[error(
        "cannot {operation} approved item {item_id}: approved items are immutable, \
         deprecate it and supply a replacement instead"
    )]
    ImmutabilityViolation { item_id: String, operation: String },

    /// An approval event could not be recorded.
    #[error("approval error: {message}")]
    Approval { message: String },

    /// A deprecation could not be recorded.
    #[error("deprecation error: {message}")]
    Deprecation { message: String },

    /// A manual retry was requested after the attempt budget was spent.
    #[error(
        "maximum retries reached for {entity_type} {entity_id} ({max_attempts} attempts); \
         manual intervention required"
    )]
    MaxRetriesReached {
        entity_type: String,
        entity_id: String,
        max_attempts: u32,
    },

    /// A payload failed structural validation before gating.
    #[error("schema validation failed: {}", join_issues(.issues))]
    SchemaValidation { issues: Vec<FieldIssue> },

    /// I/O errors from file-backed repositories.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A repository implementation failed.
    #[error("repository error: {message}")]
    Repository { message: String },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized Result type for Sieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;

impl SieveError {
    /// Create an invalid transition error.
    pub fn invalid_transition(from: LifecycleState, to: LifecycleState) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Create an immutability violation error.
    pub fn immutability_violation(
        item_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::ImmutabilityViolation {
            item_id: item_id.into(),
            operation: operation.into(),
        }
    }

    /// Create an approval error.
    pub fn approval(message: impl Into<String>) -> Self {
        Self::Approval {
            message: message.into(),
        }
    }

    /// Create a deprecation error.
    pub fn deprecation(message: impl Into<String>) -> Self {
        Self::Deprecation {
            message: message.into(),
        }
    }

    /// Create a max retries reached error.
    pub fn max_retries_reached(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self::MaxRetriesReached {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            max_attempts,
        }
    }

    /// Create a schema validation error from a list of field issues.
    pub fn schema_validation(issues: Vec<FieldIssue>) -> Self {
        Self::SchemaValidation { issues }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a lifecycle protocol violation rather than an
    /// infrastructure failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::ImmutabilityViolation { .. }
                | Self::Approval { .. }
                | Self::Deprecation { .. }
                | Self::MaxRetriesReached { .. }
                | Self::SchemaValidation { .. }
        )
    }
}

impl From<io::Error> for SieveError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SieveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the Sieve CLI.
pub mod exit_codes {
    /// Command succeeded and every gate passed.
    pub const SUCCESS: i32 = 0;

    /// Command ran but the content was rejected by one or more gates.
    pub const REJECTED: i32 = 1;

    /// Command could not run (protocol violation or infrastructure failure).
    pub const ERROR: i32 = 2;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
