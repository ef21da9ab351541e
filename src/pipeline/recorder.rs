//! Failure recorder.
//!
//! Every gate outcome is persisted per entity per attempt. Validation status
//! and retry eligibility are derived from that history on demand; nothing is
//! cached between calls.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gates::QualityGateResult;
use crate::storage::FailureRecorderRepository;

/// Persisted form of one gate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResultRecord {
    pub entity_type: String,
    pub entity_id: String,
    /// Starts at 1 and increases by one per attempt.
    pub attempt_number: u32,
    pub gate_name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
    pub created_at: DateTime<Utc>,
}

impl GateResultRecord {
    /// Stamp a gate result with its entity and attempt.
    pub fn from_result(
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
        result: &QualityGateResult,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            attempt_number,
            gate_name: result.gate_name.clone(),
            passed: result.passed,
            reason: result.reason.clone(),
            details: result.details.clone(),
            execution_time_ms: result.execution_time_ms,
            transient: result.transient,
            created_at: Utc::now(),
        }
    }

    /// Back to the in-memory result shape.
    pub fn to_result(&self) -> QualityGateResult {
        QualityGateResult {
            passed: self.passed,
            gate_name: self.gate_name.clone(),
            reason: self.reason.clone(),
            details: self.details.clone(),
            execution_time_ms: self.execution_time_ms,
            transient: self.transient,
        }
    }
}

/// Three-way validation status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// No attempt has been recorded.
    NotValidated,
    /// The latest attempt had no failures.
    Passed,
    /// The latest attempt had at least one failure.
    Failed,
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationState::NotValidated => write!(f, "not_validated"),
            ValidationState::Passed => write!(f, "passed"),
            ValidationState::Failed => write!(f, "failed"),
        }
    }
}

/// Status derived from the latest recorded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub status: ValidationState,
    pub attempt_number: u32,
    pub failed_gates: Vec<String>,
    pub can_retry: bool,
}

/// Records gate results and answers questions about an entity's history.
#[derive(Clone)]
pub struct FailureRecorder {
    repository: Arc<dyn FailureRecorderRepository>,
    max_attempts: u32,
}

impl FailureRecorder {
    pub fn new(repository: Arc<dyn FailureRecorderRepository>, max_attempts: u32) -> Self {
        Self {
            repository,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Persist one result.
    pub async fn record_result(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
        result: &QualityGateResult,
    ) -> Result<GateResultRecord> {
        let record = GateResultRecord::from_result(entity_type, entity_id, attempt_number, result);
        self.repository.insert(&record).await?;
        Ok(record)
    }

    /// Persist every result of one attempt. Writes are issued concurrently.
    pub async fn record_validation_run(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
        results: &[QualityGateResult],
    ) -> Result<Vec<GateResultRecord>> {
        let writes = results
            .iter()
            .map(|result| self.record_result(entity_type, entity_id, attempt_number, result));
        let records = join_all(writes)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            entity_type,
            entity_id,
            attempt_number,
            count = records.len(),
            "validation run recorded"
        );
        Ok(records)
    }

    /// Highest attempt number recorded, or 0 when never validated.
    pub async fn get_latest_attempt_number(&self, entity_type: &str, entity_id: &str) -> Result<u32> {
        self.repository.latest_attempt_number(entity_type, entity_id).await
    }

    /// Total failed gate results across all attempts.
    pub async fn get_failure_count(&self, entity_type: &str, entity_id: &str) -> Result<usize> {
        Ok(self.repository.failures(entity_type, entity_id).await?.len())
    }

    /// Every failed gate result across all attempts, oldest first.
    pub async fn get_entity_failures(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<GateResultRecord>> {
        self.repository.failures(entity_type, entity_id).await
    }

    /// Results of one attempt.
    pub async fn get_attempt_results(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
    ) -> Result<Vec<GateResultRecord>> {
        self.repository
            .attempt_results(entity_type, entity_id, attempt_number)
            .await
    }

    pub async fn has_failed_on_latest_attempt(&self, entity_type: &str, entity_id: &str) -> Result<bool> {
        let latest = self.get_latest_attempt_number(entity_type, entity_id).await?;
        if latest == 0 {
            return Ok(false);
        }
        let results = self.get_attempt_results(entity_type, entity_id, latest).await?;
        Ok(results.iter().any(|r| !r.passed))
    }

    /// Delete results older than `days_to_keep` days.
    pub async fn clear_old_results(&self, days_to_keep: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_to_keep));
        let removed = self.repository.delete_older_than(cutoff).await?;
        tracing::info!(days_to_keep, removed, "old gate results cleared");
        Ok(removed)
    }

    /// Status of the latest attempt.
    ///
    /// `can_retry` is true only when that attempt failed and fewer than
    /// `max_attempts` attempts have been made.
    pub async fn get_validation_status(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<ValidationStatus> {
        let latest = self.get_latest_attempt_number(entity_type, entity_id).await?;
        if latest == 0 {
            return Ok(ValidationStatus {
                status: ValidationState::NotValidated,
                attempt_number: 0,
                failed_gates: Vec::new(),
                can_retry: false,
            });
        }

        let results = self.get_attempt_results(entity_type, entity_id, latest).await?;
        let failed_gates: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.gate_name.clone())
            .collect();
        let failed = !failed_gates.is_empty();

        Ok(ValidationStatus {
            status: if failed {
                ValidationState::Failed
            } else {
                ValidationState::Passed
            },
            attempt_number: latest,
            can_retry: failed && latest < self.max_attempts,
            failed_gates,
        })
    }
}
