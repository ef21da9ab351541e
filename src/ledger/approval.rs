//! Append-only approval history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ItemType;
use crate::error::{Result, SieveError};
use crate::storage::ApprovalEventRepository;

/// How an item reached the Approved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalType {
    /// Promoted by the pipeline after passing every gate.
    #[default]
    Automatic,
    /// Promoted by a named operator.
    Manual,
}

impl std::fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalType::Automatic => write!(f, "AUTOMATIC"),
            ApprovalType::Manual => write!(f, "MANUAL"),
        }
    }
}

/// One approval event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEventRecord {
    pub item_id: String,
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    pub approval_type: ApprovalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalEventRecord {
    /// An AUTOMATIC approval with no operator.
    pub fn automatic(item_id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            operator_id: None,
            approval_type: ApprovalType::Automatic,
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// A MANUAL approval by `operator_id`.
    pub fn manual(
        item_id: impl Into<String>,
        item_type: ItemType,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            operator_id: Some(operator_id.into()),
            approval_type: ApprovalType::Manual,
            ..Self::automatic(item_id, item_type)
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// MANUAL approvals must name an operator.
    pub fn validate(&self) -> Result<()> {
        if self.approval_type == ApprovalType::Manual {
            let has_operator = self
                .operator_id
                .as_deref()
                .is_some_and(|op| !op.trim().is_empty());
            if !has_operator {
                return Err(SieveError::approval(format!(
                    "manual approval of {} {} requires an operator",
                    self.item_type, self.item_id
                )));
            }
        }
        Ok(())
    }
}

/// Records and reads approval events.
pub struct ApprovalLedger {
    repository: Arc<dyn ApprovalEventRepository>,
}

impl ApprovalLedger {
    pub fn new(repository: Arc<dyn ApprovalEventRepository>) -> Self {
        Self { repository }
    }

    /// Append an approval event.
    pub async fn record_approval(&self, event: ApprovalEventRecord) -> Result<ApprovalEventRecord> {
        event.validate()?;

        self.repository.create(&event).await?;
        tracing::info!(
            item_id = %event.item_id,
            item_type = %event.item_type,
            approval_type = %event.approval_type,
            operator = event.operator_id.as_deref().unwrap_or("-"),
            "approval recorded"
        );
        Ok(event)
    }

    /// Every approval event for the item, oldest first.
    pub async fn history(&self, item_id: &str, item_type: ItemType) -> Result<Vec<ApprovalEventRecord>> {
        self.repository.find_by_item(item_id, item_type).await
    }

    /// The event currently governing the item's approved status.
    pub async fn latest(&self, item_id: &str, item_type: ItemType) -> Result<Option<ApprovalEventRecord>> {
        let mut events = self.history(item_id, item_type).await?;
        Ok(events.pop())
    }
}
