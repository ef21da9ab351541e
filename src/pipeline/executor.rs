//! Transition executor.

use std::sync::Arc;

use serde::Deserialize;

use crate::core::{assert_valid_transition, ItemType, LifecycleState, StateTransition};
use crate::error::{Result, SieveError};
use crate::ledger::{ApprovalEventRecord, ApprovalLedger, ApprovalType};
use crate::storage::TransitionRepository;

/// Where an item physically lives while in `state`.
pub fn location_for(item_type: ItemType, state: LifecycleState) -> String {
    match state {
        LifecycleState::Draft => "drafts".to_string(),
        LifecycleState::Candidate => "candidates".to_string(),
        LifecycleState::Validated => "validated".to_string(),
        LifecycleState::Approved => format!("approved_{}s", item_type.as_str()),
    }
}

/// Approval fields a caller may put in transition metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalMeta {
    #[serde(default)]
    approval_type: Option<ApprovalType>,
    #[serde(default)]
    operator_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

fn approval_event(
    item_id: &str,
    item_type: ItemType,
    metadata: Option<&serde_json::Value>,
) -> Result<ApprovalEventRecord> {
    let meta: ApprovalMeta = match metadata {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| SieveError::approval(format!("malformed approval metadata: {}", e)))?,
        None => ApprovalMeta::default(),
    };

    let mut event = ApprovalEventRecord::automatic(item_id, item_type);
    if meta.approval_type == Some(ApprovalType::Manual) {
        event.approval_type = ApprovalType::Manual;
        event.operator_id = meta.operator_id;
    }
    event.notes = meta.notes;
    event.validate()?;
    Ok(event)
}

/// Applies lifecycle transitions.
pub struct TransitionExecutor {
    transitions: Arc<dyn TransitionRepository>,
    approvals: ApprovalLedger,
}

impl TransitionExecutor {
    pub fn new(transitions: Arc<dyn TransitionRepository>, approvals: ApprovalLedger) -> Self {
        Self {
            transitions,
            approvals,
        }
    }

    pub fn approvals(&self) -> &ApprovalLedger {
        &self.approvals
    }

    /// Validate, record and apply one transition.
    ///
    /// Entering Approved also records an approval event: AUTOMATIC unless the
    /// metadata carries `approvalType: "MANUAL"` with an `operatorId`. The
    /// event is written before the transition, so an item never reaches
    /// Approved without one. If the transition write then fails the item stays
    /// where it was and a retry appends a second event; `latest` governs.
    pub async fn execute_transition(
        &self,
        item_id: &str,
        item_type: ItemType,
        from: LifecycleState,
        to: LifecycleState,
        metadata: Option<serde_json::Value>,
    ) -> Result<StateTransition> {
        assert_valid_transition(from, to)?;

        let approval = if to == LifecycleState::Approved {
            Some(approval_event(item_id, item_type, metadata.as_ref())?)
        } else {
            None
        };

        let mut transition = StateTransition::new(item_id, item_type, from, to);
        if let Some(metadata) = metadata {
            transition = transition.with_metadata(metadata);
        }

        if let Some(event) = approval {
            self.approvals.record_approval(event).await?;
        }

        let from_location = location_for(item_type, from);
        let to_location = location_for(item_type, to);
        self.transitions
            .record_transition(&transition, &from_location, &to_location)
            .await?;
        tracing::info!(
            item_id,
            item_type = %item_type,
            from = %from,
            to = %to,
            "transition applied"
        );

        Ok(transition)
    }
}
