//! Deprecation records and replacement chains.
//!
//! Approved items are never edited. An item is retired by deprecating it,
//! optionally pointing at a replacement that may itself be deprecated later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ItemType;
use crate::error::{Result, SieveError};
use crate::storage::DeprecationRepository;

/// Default limit on replacement hops followed by [`DeprecationLedger`].
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10;

/// A deprecation of one approved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprecationRecord {
    pub item_id: String,
    pub item_type: ItemType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,
    pub operator_id: String,
    pub deprecated_at: DateTime<Utc>,
}

impl DeprecationRecord {
    pub fn new(
        item_id: impl Into<String>,
        item_type: ItemType,
        reason: impl Into<String>,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            reason: reason.into(),
            replacement_id: None,
            operator_id: operator_id.into(),
            deprecated_at: Utc::now(),
        }
    }

    pub fn with_replacement(mut self, replacement_id: impl Into<String>) -> Self {
        self.replacement_id = Some(replacement_id.into());
        self
    }
}

/// Records deprecations and resolves replacement chains.
pub struct DeprecationLedger {
    repository: Arc<dyn DeprecationRepository>,
    max_chain_depth: usize,
}

impl DeprecationLedger {
    pub fn new(repository: Arc<dyn DeprecationRepository>) -> Self {
        Self {
            repository,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    /// Deprecate an item. A second deprecation of the same item fails.
    pub async fn deprecate_item(&self, record: DeprecationRecord) -> Result<DeprecationRecord> {
        if record.replacement_id.as_deref() == Some(record.item_id.as_str()) {
            return Err(SieveError::deprecation(format!(
                "{} {} cannot replace itself",
                record.item_type, record.item_id
            )));
        }

        if let Some(existing) = self
            .repository
            .find_by_item(&record.item_id, record.item_type)
            .await?
        {
            return Err(SieveError::deprecation(format!(
                "{} {} was already deprecated at {}",
                record.item_type,
                record.item_id,
                existing.deprecated_at.to_rfc3339()
            )));
        }

        self.repository.create(&record).await?;
        tracing::info!(
            item_id = %record.item_id,
            item_type = %record.item_type,
            replacement = record.replacement_id.as_deref().unwrap_or("-"),
            operator = %record.operator_id,
            "item deprecated"
        );
        Ok(record)
    }

    pub async fn is_deprecated(&self, item_id: &str, item_type: ItemType) -> Result<bool> {
        Ok(self.repository.find_by_item(item_id, item_type).await?.is_some())
    }

    /// Follow replacement pointers starting at `item_id`.
    ///
    /// The chain always starts with `item_id`. It ends at the first item that
    /// is not deprecated or has no replacement, before any id that already
    /// appears in the chain, or after `max_chain_depth` hops.
    pub async fn get_replacement_chain(&self, item_id: &str, item_type: ItemType) -> Result<Vec<String>> {
        let mut chain = vec![item_id.to_string()];
        let mut current = item_id.to_string();

        while chain.len() <= self.max_chain_depth {
            let Some(record) = self.repository.find_by_item(&current, item_type).await? else {
                break;
            };
            let Some(next) = record.replacement_id else {
                break;
            };
            if chain.contains(&next) {
                tracing::warn!(item_id, at = %next, "replacement chain loops back on itself");
                break;
            }
            chain.push(next.clone());
            current = next;
        }

        Ok(chain)
    }

    /// The item that currently stands in for `item_id`.
    pub async fn get_active_replacement(&self, item_id: &str, item_type: ItemType) -> Result<String> {
        let chain = self.get_replacement_chain(item_id, item_type).await?;
        Ok(chain.last().cloned().unwrap_or_else(|| item_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDeprecationRepository;

    fn record(id: &str, replacement: Option<&str>) -> DeprecationRecord {
        let record = DeprecationRecord::new(id, ItemType::Word, "superseded", "op-1");
        match replacement {
            Some(r) => record.with_replacement(r),
            None => record,
        }
    }

    /// Seeds the repository directly, bypassing the idempotency guard.
    async fn seeded(records: &[(&str, Option<&str>)]) -> DeprecationLedger {
        let repo = Arc::new(MemoryDeprecationRepository::new());
        for (id, replacement) in records {
            repo.create(&record(id, *replacement)).await.unwrap();
        }
        DeprecationLedger::new(repo)
    }

    #[tokio::test]
    async fn test_second_deprecation_fails() {
        let ledger = seeded(&[]).await;
        ledger.deprecate_item(record("w-1", Some("w-2"))).await.unwrap();
        let err = ledger.deprecate_item(record("w-1", None)).await.unwrap_err();
        assert!(matches!(err, SieveError::Deprecation { .. }));
        assert!(ledger.is_deprecated("w-1", ItemType::Word).await.unwrap());
        assert!(!ledger.is_deprecated("w-1", ItemType::Exercise).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_replacement_fails() {
        let ledger = seeded(&[]).await;
        assert!(ledger.deprecate_item(record("w-1", Some("w-1"))).await.is_err());
        assert!(!ledger.is_deprecated("w-1", ItemType::Word).await.unwrap());
    }

    #[tokio::test]
    async fn test_chain_follows_to_active_item() {
        let ledger = seeded(&[("a", Some("b")), ("b", Some("c"))]).await;
        let chain = ledger.get_replacement_chain("a", ItemType::Word).await.unwrap();
        assert_eq!(chain, vec!["a", "b", "c"]);
        assert_eq!(ledger.get_active_replacement("a", ItemType::Word).await.unwrap(), "c");
    }

    #[tokio::test]
    async fn test_never_deprecated_is_its_own_replacement() {
        let ledger = seeded(&[]).await;
        assert_eq!(ledger.get_replacement_chain("x", ItemType::Word).await.unwrap(), vec!["x"]);
        assert_eq!(ledger.get_active_replacement("x", ItemType::Word).await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_deprecated_without_replacement_ends_chain() {
        let ledger = seeded(&[("a", Some("b")), ("b", None)]).await;
        assert_eq!(ledger.get_replacement_chain("a", ItemType::Word).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cycle_is_returned_once() {
        let ledger = seeded(&[("a", Some("b")), ("b", Some("c")), ("c", Some("a"))]).await;
        let chain = ledger.get_replacement_chain("a", ItemType::Word).await.unwrap();
        assert_eq!(chain, vec!["a", "b", "c"]);
        assert!(chain.len() <= 4);

        let from_b = ledger.get_replacement_chain("b", ItemType::Word).await.unwrap();
        assert_eq!(from_b, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let ids: Vec<String> = (0..20).map(|i| format!("n{}", i)).collect();
        let pairs: Vec<(&str, Option<&str>)> = ids
            .windows(2)
            .map(|w| (w[0].as_str(), Some(w[1].as_str())))
            .collect();
        let ledger = seeded(&pairs).await;

        let chain = ledger.get_replacement_chain("n0", ItemType::Word).await.unwrap();
        assert_eq!(chain.len(), DEFAULT_MAX_CHAIN_DEPTH + 1);

        let short = ledger.with_max_chain_depth(3);
        let chain = short.get_replacement_chain("n0", ItemType::Word).await.unwrap();
        assert_eq!(chain, vec!["n0", "n1", "n2", "n3"]);
    }
}
