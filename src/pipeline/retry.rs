//! Retry controller.
//!
//! Bounded re-validation of one entity. Attempt numbers come from the failure
//! recorder (latest + 1) and are read, run and recorded while holding a
//! per-entity lock, so two retries of the same entity never share a number.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::core::GateInput;
use crate::error::{Result, SieveError};
use crate::gates::{names, GateRef, QualityGateResult};
use crate::pipeline::recorder::FailureRecorder;
use crate::pipeline::runner::{self, RunMode};

/// Gates whose failure re-running cannot fix.
pub const NON_RETRYABLE_GATES: &[&str] = &[
    names::SCHEMA,
    names::CONTENT_SAFETY,
    names::DUPLICATION,
    names::ORTHOGRAPHY,
];

/// Default per-attempt delays, in milliseconds.
pub const DEFAULT_DELAYS_MS: &[u64] = &[0, 2000, 5000];

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Attempt budget, delay schedule and failure taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n` is `delays[n - 1]`; the last entry is reused.
    pub delays: Vec<Duration>,
    pub non_retryable: HashSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays: DEFAULT_DELAYS_MS.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            non_retryable: NON_RETRYABLE_GATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RetryPolicy {
    /// Scheduled delay before `attempt_number`.
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        let index = attempt_number.saturating_sub(1) as usize;
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a failed result justifies another attempt.
    ///
    /// Transient infrastructure failures are always retryable.
    pub fn is_retryable(&self, result: &QualityGateResult) -> bool {
        result.passed || result.transient || !self.non_retryable.contains(&result.gate_name)
    }

    /// Whether every failure in `results` is retryable.
    pub fn all_retryable(&self, results: &[QualityGateResult]) -> bool {
        results.iter().all(|r| self.is_retryable(r))
    }
}

/// Result of a retry entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOutcome {
    pub success: bool,
    /// Number of the last attempt made.
    pub attempt_number: u32,
    pub failed_gates: Vec<String>,
    /// Results of the last attempt.
    pub results: Vec<QualityGateResult>,
    pub can_retry: bool,
}

type EntityKey = (String, String);

/// A claim on one entity's lock. Dropping it evicts the map entry once no
/// other claim remains, including when the owning future is cancelled while
/// still waiting for the lock.
struct EntitySlot<'a> {
    locks: &'a DashMap<EntityKey, Arc<Mutex<()>>>,
    key: EntityKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for EntitySlot<'_> {
    fn drop(&mut self) {
        drop(std::mem::take(&mut self.lock));
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Runs gates for an entity with bounded retries.
pub struct RetryController {
    gates: Vec<GateRef>,
    mode: RunMode,
    policy: RetryPolicy,
    recorder: FailureRecorder,
    locks: DashMap<EntityKey, Arc<Mutex<()>>>,
}

impl RetryController {
    pub fn new(gates: Vec<GateRef>, recorder: FailureRecorder, policy: RetryPolicy) -> Self {
        Self {
            gates,
            mode: RunMode::default(),
            policy,
            recorder,
            locks: DashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn recorder(&self) -> &FailureRecorder {
        &self.recorder
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    fn entity_slot(&self, entity_type: &str, entity_id: &str) -> EntitySlot<'_> {
        let key = (entity_type.to_string(), entity_id.to_string());
        let lock = self.locks.entry(key.clone()).or_default().clone();
        EntitySlot {
            locks: &self.locks,
            key,
            lock,
        }
    }

    /// Run the gates once as `attempt_number` and record every result.
    async fn run_attempt(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
        input: &GateInput,
    ) -> Result<RetryOutcome> {
        let outcome = runner::run(self.mode, &self.gates, input).await;
        self.recorder
            .record_validation_run(entity_type, entity_id, attempt_number, &outcome.results)
            .await?;

        let failures: Vec<QualityGateResult> =
            outcome.results.iter().filter(|r| !r.passed).cloned().collect();
        let retryable = self.policy.all_retryable(&failures);

        if outcome.passed {
            tracing::info!(entity_type, entity_id, attempt_number, "validation passed");
        } else {
            tracing::warn!(
                entity_type,
                entity_id,
                attempt_number,
                failed = ?outcome.failed_gates,
                retryable,
                "validation attempt failed"
            );
        }

        Ok(RetryOutcome {
            success: outcome.passed,
            attempt_number,
            can_retry: !outcome.passed && retryable && attempt_number < self.policy.max_attempts,
            failed_gates: outcome.failed_gates,
            results: outcome.results,
        })
    }

    /// Automatic validation: attempt until success, a non-retryable failure,
    /// or the budget runs out.
    ///
    /// Continues numbering from any attempts already recorded. Fails with
    /// `MaxRetriesReached` when the budget was spent before the call.
    pub async fn validate_with_retry(
        &self,
        entity_type: &str,
        entity_id: &str,
        input: &GateInput,
    ) -> Result<RetryOutcome> {
        let slot = self.entity_slot(entity_type, entity_id);
        let _guard = slot.lock.lock().await;
        self.retry_loop(entity_type, entity_id, input).await
    }

    async fn retry_loop(
        &self,
        entity_type: &str,
        entity_id: &str,
        input: &GateInput,
    ) -> Result<RetryOutcome> {
        let max = self.policy.max_attempts;
        let latest = self
            .recorder
            .get_latest_attempt_number(entity_type, entity_id)
            .await?;
        if latest >= max {
            return Err(SieveError::max_retries_reached(entity_type, entity_id, max));
        }

        let mut attempt_number = latest + 1;
        let mut first = true;
        loop {
            if !first {
                let delay = self.policy.delay_for(attempt_number);
                if !delay.is_zero() {
                    tracing::debug!(entity_id, attempt_number, delay_ms = delay.as_millis() as u64, "waiting before retry");
                    tokio::time::sleep(delay).await;
                }
            }
            first = false;

            let outcome = self
                .run_attempt(entity_type, entity_id, attempt_number, input)
                .await?;
            if outcome.success || !outcome.can_retry {
                return Ok(outcome);
            }
            attempt_number += 1;
        }
    }

    /// One operator-triggered attempt.
    ///
    /// Refuses without running any gate once the latest attempt has reached
    /// `max_attempts`.
    pub async fn manual_retry(
        &self,
        entity_type: &str,
        entity_id: &str,
        input: &GateInput,
    ) -> Result<RetryOutcome> {
        let slot = self.entity_slot(entity_type, entity_id);
        let _guard = slot.lock.lock().await;
        self.single_attempt(entity_type, entity_id, input).await
    }

    async fn single_attempt(
        &self,
        entity_type: &str,
        entity_id: &str,
        input: &GateInput,
    ) -> Result<RetryOutcome> {
        let max = self.policy.max_attempts;
        let latest = self
            .recorder
            .get_latest_attempt_number(entity_type, entity_id)
            .await?;
        if latest >= max {
            tracing::warn!(entity_type, entity_id, latest, "manual retry refused");
            return Err(SieveError::max_retries_reached(entity_type, entity_id, max));
        }
        tracing::info!(entity_type, entity_id, attempt_number = latest + 1, "manual retry");
        self.run_attempt(entity_type, entity_id, latest + 1, input).await
    }
}
