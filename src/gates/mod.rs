//! Quality gates for Sieve.
//!
//! A gate is an independent automated check over a [`GateInput`]. Gates are
//! grouped into tiers so cheap lexical checks reject bad input before any
//! database or external call is made:
//!
//! - **FAST**: schema, CEFR consistency, orthography, language standard,
//!   content safety
//! - **DATABASE**: duplication, prerequisite validation
//! - **EXTERNAL**: reserved for gates that call outside services
//!
//! Gate failures are data, not errors. A gate never mutates persisted state.

pub mod cefr;
pub mod content_safety;
pub mod duplication;
pub mod language_standard;
pub mod orthography;
pub mod prerequisite;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::GateInput;
use crate::error::SieveError;
use crate::storage::{DuplicationRepository, PrerequisiteRepository};

pub use cefr::CefrConsistencyGate;
pub use content_safety::ContentSafetyGate;
pub use duplication::DuplicationGate;
pub use language_standard::LanguageStandardGate;
pub use orthography::OrthographyGate;
pub use prerequisite::PrerequisiteGate;
pub use schema::SchemaGate;

/// Gate names as recorded in results and referenced by retry policy.
pub mod names {
    pub const SCHEMA: &str = "schema-validation";
    pub const CEFR: &str = "cefr-consistency";
    pub const ORTHOGRAPHY: &str = "orthography-consistency";
    pub const LANGUAGE_STANDARD: &str = "language-standard";
    pub const CONTENT_SAFETY: &str = "content-safety";
    pub const DUPLICATION: &str = "duplication-detection";
    pub const PREREQUISITE: &str = "prerequisite-validation";
}

/// Execution tier of a gate. Lower tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Pure computation.
    Fast = 1,
    /// Repository reads.
    Database = 2,
    /// Outside services.
    External = 3,
}

impl Tier {
    /// Numeric tier value.
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "FAST"),
            Tier::Database => write!(f, "DATABASE"),
            Tier::External => write!(f, "EXTERNAL"),
        }
    }
}

/// Outcome of one gate check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Name of the gate that produced this result.
    pub gate_name: String,
    /// Human-readable reason for failure (or a note on pass).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Structured failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Wall-clock time spent in the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    /// The failure came from infrastructure, not from the content.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
}

impl QualityGateResult {
    /// A passing result.
    pub fn pass(gate_name: impl Into<String>) -> Self {
        Self {
            passed: true,
            gate_name: gate_name.into(),
            reason: None,
            details: None,
            execution_time_ms: None,
            transient: false,
        }
    }

    /// A failing result with a reason.
    pub fn fail(gate_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            gate_name: gate_name.into(),
            reason: Some(reason.into()),
            details: None,
            execution_time_ms: None,
            transient: false,
        }
    }

    /// A failing result caused by a repository or service error.
    pub fn infrastructure_error(gate_name: impl Into<String>, err: &SieveError) -> Self {
        Self {
            transient: true,
            ..Self::fail(gate_name, format!("gate could not complete: {}", err))
        }
    }

    /// Attach a note to a passing result (or replace a failure reason).
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach an execution time.
    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    /// A failure listing every issue under `details.issues`.
    pub fn from_issues(gate_name: &str, summary: &str, issues: Vec<String>) -> Self {
        if issues.is_empty() {
            return Self::pass(gate_name);
        }
        Self::fail(gate_name, format!("{}: {}", summary, issues.join("; ")))
            .with_details(serde_json::json!({ "issues": issues }))
    }
}

/// An automated quality check.
#[async_trait]
pub trait QualityGate: Send + Sync {
    /// Stable gate name.
    fn name(&self) -> &str;

    /// Execution tier.
    fn tier(&self) -> Tier;

    /// Run the check.
    async fn check(&self, input: &GateInput) -> QualityGateResult;
}

/// Shared handle to a gate.
pub type GateRef = Arc<dyn QualityGate>;

/// The lexical gates that need no repository.
pub fn fast_gates() -> Vec<GateRef> {
    vec![
        Arc::new(SchemaGate::new()),
        Arc::new(CefrConsistencyGate::new()),
        Arc::new(OrthographyGate::new()),
        Arc::new(LanguageStandardGate::new()),
        Arc::new(ContentSafetyGate::new()),
    ]
}

/// Every built-in gate, the repository-backed ones included.
pub fn standard_gates(
    duplicates: Arc<dyn DuplicationRepository>,
    prerequisites: Arc<dyn PrerequisiteRepository>,
    similarity_threshold: f64,
) -> Vec<GateRef> {
    let mut gates = fast_gates();
    gates.push(Arc::new(
        DuplicationGate::new(duplicates).with_threshold(similarity_threshold),
    ));
    gates.push(Arc::new(PrerequisiteGate::new(prerequisites)));
    gates
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering_and_values() {
        assert!(Tier::Fast < Tier::Database);
        assert!(Tier::Database < Tier::External);
        assert_eq!(Tier::Fast.value(), 1);
        assert_eq!(Tier::External.value(), 3);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = QualityGateResult::fail(names::CEFR, "too advanced").with_execution_time(3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["gateName"], "cefr-consistency");
        assert_eq!(json["executionTimeMs"], 3);
        assert!(json.get("transient").is_none());
    }

    #[test]
    fn test_infrastructure_error_is_transient() {
        let err = SieveError::repository("timeout");
        let result = QualityGateResult::infrastructure_error(names::DUPLICATION, &err);
        assert!(!result.passed);
        assert!(result.transient);
        assert!(result.reason.unwrap().contains("timeout"));
    }

    #[test]
    fn test_from_issues() {
        assert!(QualityGateResult::from_issues("g", "bad", vec![]).passed);

        let result = QualityGateResult::from_issues("g", "bad", vec!["a".into(), "b".into()]);
        assert!(!result.passed);
        assert_eq!(result.reason.as_deref(), Some("bad: a; b"));
        assert_eq!(result.details.unwrap()["issues"][1], "b");
    }

    #[test]
    fn test_fast_gates_are_all_fast_tier() {
        let gates = fast_gates();
        assert_eq!(gates.len(), 5);
        assert!(gates.iter().all(|g| g.tier() == Tier::Fast));
    }

    #[test]
    fn test_standard_gates_names_are_unique() {
        use crate::storage::{MemoryDuplicationRepository, MemoryPrerequisiteRepository};

        let gates = standard_gates(
            Arc::new(MemoryDuplicationRepository::new()),
            Arc::new(MemoryPrerequisiteRepository::new()),
            0.85,
        );
        let mut names: Vec<&str> = gates.iter().map(|g| g.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 7);
        assert_eq!(gates.iter().filter(|g| g.tier() == Tier::Database).count(), 2);
    }
}
