//! Repository traits for Sieve.
//!
//! The engine never touches a database directly. Every read and write goes
//! through one of these traits, injected at construction as `Arc<dyn _>`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{CefrLevel, ItemType, LifecycleState, StateTransition};
use crate::error::Result;
use crate::ledger::{ApprovalEventRecord, DeprecationRecord};
use crate::pipeline::GateResultRecord;

/// A stored item whose text is close to a candidate's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub id: String,
    pub text: String,
    /// Similarity score in `[0.0, 1.0]`.
    pub similarity: f64,
}

/// Read-only projection of a catalog item used for prerequisite checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteInfo {
    pub id: String,
    pub level: CefrLevel,
    pub language: String,
}

/// Lookup of existing content for duplicate detection.
#[async_trait]
pub trait DuplicationRepository: Send + Sync {
    /// Identifier of an item with exactly this text, if one exists.
    async fn find_exact_match(
        &self,
        text: &str,
        language: &str,
        content_type: &str,
    ) -> Result<Option<String>>;

    /// Items whose similarity to `text` is at least `threshold`, best first.
    async fn find_similar(
        &self,
        text: &str,
        language: &str,
        content_type: &str,
        threshold: f64,
    ) -> Result<Vec<SimilarItem>>;
}

/// Read access to the prerequisite graph.
#[async_trait]
pub trait PrerequisiteRepository: Send + Sync {
    /// Catalog entries for the given ids. Unknown ids are omitted.
    async fn find_prerequisites(&self, ids: &[String]) -> Result<Vec<PrerequisiteInfo>>;

    /// Direct prerequisites of one item.
    async fn get_prerequisites_of(&self, id: &str) -> Result<Vec<String>>;
}

/// Append-only store of gate outcomes.
#[async_trait]
pub trait FailureRecorderRepository: Send + Sync {
    /// Append one record.
    async fn insert(&self, record: &GateResultRecord) -> Result<()>;

    /// Highest attempt number recorded for the entity, or 0.
    async fn latest_attempt_number(&self, entity_type: &str, entity_id: &str) -> Result<u32>;

    /// All records for one attempt.
    async fn attempt_results(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
    ) -> Result<Vec<GateResultRecord>>;

    /// Every failed record for the entity, oldest first.
    async fn failures(&self, entity_type: &str, entity_id: &str) -> Result<Vec<GateResultRecord>>;

    /// Delete records created before `cutoff`. Returns how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Records transitions and moves items between stage locations.
#[async_trait]
pub trait TransitionRepository: Send + Sync {
    /// Persist the transition and move the item from `from_location` to
    /// `to_location` as a single write.
    async fn record_transition(
        &self,
        transition: &StateTransition,
        from_location: &str,
        to_location: &str,
    ) -> Result<()>;

    /// Current state of an item, if it has ever transitioned.
    async fn current_state(&self, item_id: &str, item_type: ItemType)
        -> Result<Option<LifecycleState>>;

    /// Transition history of an item, oldest first.
    async fn history(&self, item_id: &str, item_type: ItemType) -> Result<Vec<StateTransition>>;
}

/// Append-only approval history.
#[async_trait]
pub trait ApprovalEventRepository: Send + Sync {
    async fn create(&self, event: &ApprovalEventRecord) -> Result<()>;

    /// All approval events for an item, oldest first.
    async fn find_by_item(&self, item_id: &str, item_type: ItemType)
        -> Result<Vec<ApprovalEventRecord>>;
}

/// Deprecation records and replacement pointers.
#[async_trait]
pub trait DeprecationRepository: Send + Sync {
    async fn create(&self, record: &DeprecationRecord) -> Result<()>;

    async fn find_by_item(&self, item_id: &str, item_type: ItemType)
        -> Result<Option<DeprecationRecord>>;
}

/// Blanket implementation so `Arc<T>` can be used where a repository is
/// expected, which keeps test handles shareable.
#[async_trait]
impl<T: FailureRecorderRepository + ?Sized> FailureRecorderRepository for Arc<T> {
    async fn insert(&self, record: &GateResultRecord) -> Result<()> {
        (**self).insert(record).await
    }

    async fn latest_attempt_number(&self, entity_type: &str, entity_id: &str) -> Result<u32> {
        (**self).latest_attempt_number(entity_type, entity_id).await
    }

    async fn attempt_results(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
    ) -> Result<Vec<GateResultRecord>> {
        (**self)
            .attempt_results(entity_type, entity_id, attempt_number)
            .await
    }

    async fn failures(&self, entity_type: &str, entity_id: &str) -> Result<Vec<GateResultRecord>> {
        (**self).failures(entity_type, entity_id).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        (**self).delete_older_than(cutoff).await
    }
}

/// Test utilities for repository implementations.
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::gates::QualityGateResult;

    /// Shared contract test for `FailureRecorderRepository` implementations.
    pub async fn test_failure_recorder_contract<R: FailureRecorderRepository>(repo: &R) {
        assert_eq!(repo.latest_attempt_number("word", "w-1").await.unwrap(), 0);

        let pass = GateResultRecord::from_result("word", "w-1", 1, &QualityGateResult::pass("a"));
        let fail = GateResultRecord::from_result(
            "word",
            "w-1",
            1,
            &QualityGateResult::fail("b", "nope"),
        );
        repo.insert(&pass).await.unwrap();
        repo.insert(&fail).await.unwrap();

        let other = GateResultRecord::from_result("word", "w-2", 4, &QualityGateResult::pass("a"));
        repo.insert(&other).await.unwrap();

        assert_eq!(repo.latest_attempt_number("word", "w-1").await.unwrap(), 1);
        assert_eq!(repo.latest_attempt_number("word", "w-2").await.unwrap(), 4);
        assert_eq!(repo.latest_attempt_number("exercise", "w-1").await.unwrap(), 0);

        let attempt = repo.attempt_results("word", "w-1", 1).await.unwrap();
        assert_eq!(attempt.len(), 2);

        let failures = repo.failures("word", "w-1").await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].gate_name, "b");

        let removed = repo
            .delete_older_than(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(repo.latest_attempt_number("word", "w-1").await.unwrap(), 0);
    }
}
