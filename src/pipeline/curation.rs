//! End-to-end curation of one item.
//!
//! Wires normalization, the retry controller, the transition executor and
//! the ledgers into the operations an ingestion service or operator console
//! calls. Every operation reads the item's current state first and lets the
//! transition table decide whether it may proceed.

use std::sync::Arc;

use crate::config::Config;
use crate::core::{
    assert_valid_transition, normalize_draft, DraftPayload, ItemType, LifecycleState,
    NormalizedDraft, StateTransition,
};
use crate::error::{Result, SieveError};
use crate::gates::standard_gates;
use crate::ledger::{
    assert_mutable, ApprovalLedger, DeprecationLedger, DeprecationRecord, MutationOperation,
};
use crate::pipeline::executor::TransitionExecutor;
use crate::pipeline::recorder::FailureRecorder;
use crate::pipeline::retry::{RetryController, RetryOutcome};
use crate::storage::{
    ApprovalEventRepository, DeprecationRepository, DuplicationRepository,
    FailureRecorderRepository, MemoryApprovalEventRepository, MemoryDeprecationRepository,
    MemoryDuplicationRepository, MemoryFailureRecorderRepository, MemoryPrerequisiteRepository,
    MemoryTransitionRepository, PrerequisiteRepository, TransitionRepository,
};

/// Storage a pipeline built by [`CurationPipeline::from_config`] runs against.
#[derive(Clone)]
pub struct PipelineRepositories {
    pub duplicates: Arc<dyn DuplicationRepository>,
    pub prerequisites: Arc<dyn PrerequisiteRepository>,
    pub results: Arc<dyn FailureRecorderRepository>,
    pub transitions: Arc<dyn TransitionRepository>,
    pub approvals: Arc<dyn ApprovalEventRepository>,
    pub deprecations: Arc<dyn DeprecationRepository>,
}

impl PipelineRepositories {
    /// Empty in-memory repositories for every concern.
    pub fn in_memory() -> Self {
        Self {
            duplicates: Arc::new(MemoryDuplicationRepository::new()),
            prerequisites: Arc::new(MemoryPrerequisiteRepository::new()),
            results: Arc::new(MemoryFailureRecorderRepository::new()),
            transitions: Arc::new(MemoryTransitionRepository::new()),
            approvals: Arc::new(MemoryApprovalEventRepository::new()),
            deprecations: Arc::new(MemoryDeprecationRepository::new()),
        }
    }
}

/// Curation operations over injected collaborators.
pub struct CurationPipeline {
    retry: RetryController,
    executor: TransitionExecutor,
    deprecations: DeprecationLedger,
    transitions: Arc<dyn TransitionRepository>,
}

impl CurationPipeline {
    pub fn new(
        retry: RetryController,
        executor: TransitionExecutor,
        deprecations: DeprecationLedger,
        transitions: Arc<dyn TransitionRepository>,
    ) -> Self {
        Self {
            retry,
            executor,
            deprecations,
            transitions,
        }
    }

    /// Build the full gate set and ledgers from `config`.
    ///
    /// The retry policy, run mode and attempt budget come from `[retry]`,
    /// the duplication threshold from `[duplication]` and the replacement
    /// chain bound from `[deprecation]`.
    pub fn from_config(config: &Config, repositories: PipelineRepositories) -> Self {
        let gates = standard_gates(
            repositories.duplicates,
            repositories.prerequisites,
            config.duplication.similarity_threshold,
        );
        let recorder = FailureRecorder::new(repositories.results, config.retry.max_attempts);
        let retry = RetryController::new(gates, recorder, config.retry.to_policy())
            .with_mode(config.retry.mode);
        let executor = TransitionExecutor::new(
            repositories.transitions.clone(),
            ApprovalLedger::new(repositories.approvals),
        );
        let deprecations = DeprecationLedger::new(repositories.deprecations)
            .with_max_chain_depth(config.deprecation.max_chain_depth);

        Self::new(retry, executor, deprecations, repositories.transitions)
    }

    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    pub fn deprecations(&self) -> &DeprecationLedger {
        &self.deprecations
    }

    /// Current lifecycle state. Items that never transitioned are drafts.
    pub async fn current_state(&self, item_id: &str, item_type: ItemType) -> Result<LifecycleState> {
        Ok(self
            .transitions
            .current_state(item_id, item_type)
            .await?
            .unwrap_or(LifecycleState::Draft))
    }

    /// Normalize a draft and promote it to Candidate.
    pub async fn submit_draft(&self, draft: &DraftPayload) -> Result<NormalizedDraft> {
        let normalized = normalize_draft(draft)?;
        let state = self
            .current_state(&normalized.item_id, normalized.item_type)
            .await?;
        self.executor
            .execute_transition(
                &normalized.item_id,
                normalized.item_type,
                state,
                LifecycleState::Candidate,
                None,
            )
            .await?;
        Ok(normalized)
    }

    /// Validate a Candidate with automatic retries; promote it on success.
    pub async fn validate_candidate(&self, candidate: &NormalizedDraft) -> Result<RetryOutcome> {
        self.require_candidate(candidate).await?;
        let outcome = self
            .retry
            .validate_with_retry(candidate.item_type.as_str(), &candidate.item_id, &candidate.input)
            .await?;
        self.promote_if_passed(candidate, &outcome).await?;
        Ok(outcome)
    }

    /// One operator-triggered validation attempt; promotes on success.
    pub async fn manual_revalidate(&self, candidate: &NormalizedDraft) -> Result<RetryOutcome> {
        self.require_candidate(candidate).await?;
        let outcome = self
            .retry
            .manual_retry(candidate.item_type.as_str(), &candidate.item_id, &candidate.input)
            .await?;
        self.promote_if_passed(candidate, &outcome).await?;
        Ok(outcome)
    }

    /// Promote a Validated item to Approved.
    ///
    /// `metadata` may carry `approvalType`, `operatorId` and `notes`.
    pub async fn approve(
        &self,
        item_id: &str,
        item_type: ItemType,
        metadata: Option<serde_json::Value>,
    ) -> Result<StateTransition> {
        let state = self.current_state(item_id, item_type).await?;
        self.executor
            .execute_transition(item_id, item_type, state, LifecycleState::Approved, metadata)
            .await
    }

    /// Retire an Approved item.
    pub async fn deprecate(&self, record: DeprecationRecord) -> Result<DeprecationRecord> {
        let state = self.current_state(&record.item_id, record.item_type).await?;
        if state != LifecycleState::Approved {
            return Err(SieveError::deprecation(format!(
                "{} {} is {}, only approved items can be deprecated",
                record.item_type, record.item_id, state
            )));
        }
        self.deprecations.deprecate_item(record).await
    }

    /// Refuse an edit or delete of an Approved item.
    pub async fn guard_mutation(
        &self,
        item_id: &str,
        item_type: ItemType,
        operation: MutationOperation,
    ) -> Result<()> {
        let state = self.current_state(item_id, item_type).await?;
        assert_mutable(state == LifecycleState::Approved, item_id, operation)
    }

    async fn require_candidate(&self, candidate: &NormalizedDraft) -> Result<()> {
        let state = self
            .current_state(&candidate.item_id, candidate.item_type)
            .await?;
        assert_valid_transition(state, LifecycleState::Validated)
    }

    async fn promote_if_passed(&self, candidate: &NormalizedDraft, outcome: &RetryOutcome) -> Result<()> {
        if !outcome.success {
            return Ok(());
        }
        self.executor
            .execute_transition(
                &candidate.item_id,
                candidate.item_type,
                LifecycleState::Candidate,
                LifecycleState::Validated,
                Some(serde_json::json!({ "attemptNumber": outcome.attempt_number })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::gates::{self, GateRef};
    use crate::ledger::ApprovalType;
    use crate::pipeline::retry::RetryPolicy;
    use crate::pipeline::runner::RunMode;

    fn pipeline_with(duplicates: MemoryDuplicationRepository) -> CurationPipeline {
        let policy = RetryPolicy {
            delays: vec![Duration::ZERO],
            ..RetryPolicy::default()
        };
        let gates: Vec<GateRef> = gates::standard_gates(
            Arc::new(duplicates),
            Arc::new(MemoryPrerequisiteRepository::new()),
            gates::duplication::DEFAULT_SIMILARITY_THRESHOLD,
        );
        let recorder = FailureRecorder::new(
            Arc::new(MemoryFailureRecorderRepository::new()),
            policy.max_attempts,
        );
        let transitions = Arc::new(MemoryTransitionRepository::new());
        let approvals = ApprovalLedger::new(Arc::new(MemoryApprovalEventRepository::new()));

        CurationPipeline::new(
            RetryController::new(gates, recorder, policy),
            TransitionExecutor::new(transitions.clone(), approvals),
            DeprecationLedger::new(Arc::new(MemoryDeprecationRepository::new())),
            transitions,
        )
    }

    fn pipeline() -> CurationPipeline {
        pipeline_with(MemoryDuplicationRepository::new())
    }

    fn draft(id: &str, text: &str, level: &str) -> DraftPayload {
        DraftPayload {
            item_id: id.to_string(),
            item_type: "grammar_rule".to_string(),
            text: Some(text.to_string()),
            language: Some("ES".to_string()),
            level: Some(level.to_string()),
            ..DraftPayload::default()
        }
    }

    #[tokio::test]
    async fn test_subjunctive_at_a1_fails_cefr() {
        let p = pipeline();
        let candidate = p.submit_draft(&draft("g-1", "Subjunctive mood usage", "A1")).await.unwrap();
        let outcome = p.validate_candidate(&candidate).await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.failed_gates.contains(&gates::names::CEFR.to_string()));
        let cefr = outcome
            .results
            .iter()
            .find(|r| r.gate_name == gates::names::CEFR)
            .unwrap();
        assert!(cefr.reason.as_deref().unwrap().to_lowercase().contains("subjunctive"));
        assert_eq!(
            p.current_state("g-1", ItemType::GrammarRule).await.unwrap(),
            LifecycleState::Candidate
        );
    }

    #[tokio::test]
    async fn test_subjunctive_at_c1_is_validated_and_approved() {
        let p = pipeline();
        let candidate = p.submit_draft(&draft("g-2", "Subjunctive mood usage", "C1")).await.unwrap();
        let outcome = p.validate_candidate(&candidate).await.unwrap();
        assert!(outcome.success, "{:?}", outcome.failed_gates);
        assert_eq!(outcome.attempt_number, 1);
        assert_eq!(
            p.current_state("g-2", ItemType::GrammarRule).await.unwrap(),
            LifecycleState::Validated
        );

        p.approve("g-2", ItemType::GrammarRule, None).await.unwrap();
        assert_eq!(
            p.current_state("g-2", ItemType::GrammarRule).await.unwrap(),
            LifecycleState::Approved
        );
    }

    #[tokio::test]
    async fn test_malformed_draft_is_rejected_before_gating() {
        let p = pipeline();
        let mut bad = draft("g-3", "   ", "Z9");
        bad.language = None;
        let err = p.submit_draft(&bad).await.unwrap_err();
        match err {
            SieveError::SchemaValidation { issues } => assert!(issues.len() >= 2),
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
        assert_eq!(
            p.current_state("g-3", ItemType::GrammarRule).await.unwrap(),
            LifecycleState::Draft
        );
    }

    #[tokio::test]
    async fn test_duplicate_fails_once_and_operator_can_retry() {
        let dupes = MemoryDuplicationRepository::new();
        dupes.insert("old", "el gato negro", "es", "word");
        let p = pipeline_with(dupes);

        let mut word = draft("w-1", "el gato negro", "A1");
        word.item_type = "word".to_string();
        let candidate = p.submit_draft(&word).await.unwrap();

        let outcome = p.validate_candidate(&candidate).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.attempt_number, 1);
        assert!(!outcome.can_retry);

        let again = p.manual_revalidate(&candidate).await.unwrap();
        assert_eq!(again.attempt_number, 2);
    }

    #[tokio::test]
    async fn test_validating_a_draft_is_an_invalid_transition() {
        let p = pipeline();
        let candidate = normalize_draft(&draft("g-4", "Articles", "A1")).unwrap();
        let err = p.validate_candidate(&candidate).await.unwrap_err();
        assert!(matches!(
            err,
            SieveError::InvalidTransition {
                from: LifecycleState::Draft,
                to: LifecycleState::Validated
            }
        ));
    }

    #[tokio::test]
    async fn test_approved_items_are_guarded_and_deprecable() {
        let p = pipeline();
        let candidate = p.submit_draft(&draft("g-5", "Definite articles", "A1")).await.unwrap();
        assert!(p.validate_candidate(&candidate).await.unwrap().success);

        let record = DeprecationRecord::new("g-5", ItemType::GrammarRule, "merged", "op-1");
        assert!(p.deprecate(record.clone()).await.is_err());
        assert!(p
            .guard_mutation("g-5", ItemType::GrammarRule, MutationOperation::Update)
            .await
            .is_ok());

        let meta = serde_json::json!({ "approvalType": "MANUAL", "operatorId": "op-1" });
        p.approve("g-5", ItemType::GrammarRule, Some(meta)).await.unwrap();

        let err = p
            .guard_mutation("g-5", ItemType::GrammarRule, MutationOperation::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, SieveError::ImmutabilityViolation { .. }));

        p.deprecate(record.with_replacement("g-6")).await.unwrap();
        assert_eq!(
            p.deprecations()
                .get_active_replacement("g-5", ItemType::GrammarRule)
                .await
                .unwrap(),
            "g-6"
        );
        let approval = p
            .executor
            .approvals()
            .latest("g-5", ItemType::GrammarRule)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approval.approval_type, ApprovalType::Manual);
    }

    #[tokio::test]
    async fn test_from_config_applies_every_section() {
        let mut config = Config::default();
        config.retry.max_attempts = 2;
        config.retry.delays_ms = vec![0];
        config.retry.mode = RunMode::Sequential;
        config.duplication.similarity_threshold = 1.0;
        config.deprecation.max_chain_depth = 1;

        let dupes = MemoryDuplicationRepository::new();
        dupes.insert("old", "el perro come carne", "es", "word");
        let repositories = PipelineRepositories {
            duplicates: Arc::new(dupes),
            ..PipelineRepositories::in_memory()
        };
        let p = CurationPipeline::from_config(&config, repositories);

        assert_eq!(p.retry().policy().max_attempts, 2);
        assert_eq!(p.retry().recorder().max_attempts(), 2);
        assert_eq!(p.deprecations().max_chain_depth(), 1);

        // Near-duplicates only fail at the default threshold.
        let mut word = draft("w-9", "el perro come carnes", "C1");
        word.item_type = "word".to_string();
        let candidate = p.submit_draft(&word).await.unwrap();
        let outcome = p.validate_candidate(&candidate).await.unwrap();
        assert!(outcome.success, "{:?}", outcome.failed_gates);

        p.approve("w-9", ItemType::Word, None).await.unwrap();
        let first = DeprecationRecord::new("w-9", ItemType::Word, "merged", "op-1")
            .with_replacement("w-10");
        p.deprecate(first).await.unwrap();
        p.deprecations()
            .deprecate_item(
                DeprecationRecord::new("w-10", ItemType::Word, "merged", "op-1")
                    .with_replacement("w-11"),
            )
            .await
            .unwrap();
        let chain = p
            .deprecations()
            .get_replacement_chain("w-9", ItemType::Word)
            .await
            .unwrap();
        assert_eq!(chain, vec!["w-9", "w-10"]);
    }

    #[tokio::test]
    async fn test_default_config_rejects_near_duplicate() {
        let dupes = MemoryDuplicationRepository::new();
        dupes.insert("old", "el perro come carne", "es", "word");
        let repositories = PipelineRepositories {
            duplicates: Arc::new(dupes),
            ..PipelineRepositories::in_memory()
        };
        let p = CurationPipeline::from_config(&Config::default(), repositories);

        let mut word = draft("w-12", "el perro come carnes", "C1");
        word.item_type = "word".to_string();
        let candidate = p.submit_draft(&word).await.unwrap();
        let outcome = p.validate_candidate(&candidate).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.failed_gates.contains(&gates::names::DUPLICATION.to_string()));
    }
}
