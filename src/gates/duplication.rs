//! Duplication gate.
//!
//! Delegates to a [`DuplicationRepository`]: an exact match fails first,
//! otherwise any stored item at or above the similarity threshold fails.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::GateInput;
use crate::gates::{names, QualityGate, QualityGateResult, Tier};
use crate::storage::DuplicationRepository;

/// Default similarity at which two texts count as near-duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Rejects content that already exists in the corpus.
pub struct DuplicationGate {
    repository: Arc<dyn DuplicationRepository>,
    threshold: f64,
}

impl std::fmt::Debug for DuplicationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicationGate")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl DuplicationGate {
    pub fn new(repository: Arc<dyn DuplicationRepository>) -> Self {
        Self {
            repository,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Override the similarity threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[async_trait]
impl QualityGate for DuplicationGate {
    fn name(&self) -> &str {
        names::DUPLICATION
    }

    fn tier(&self) -> Tier {
        Tier::Database
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let content_type = input.content_type.as_str();

        match self
            .repository
            .find_exact_match(&input.text, &input.language, content_type)
            .await
        {
            Ok(Some(id)) => {
                return QualityGateResult::fail(
                    names::DUPLICATION,
                    format!("exact duplicate of {}", id),
                )
                .with_details(serde_json::json!({ "duplicateId": id, "similarity": 1.0 }));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "exact-match lookup failed");
                return QualityGateResult::infrastructure_error(names::DUPLICATION, &e);
            }
        }

        let similar = match self
            .repository
            .find_similar(&input.text, &input.language, content_type, self.threshold)
            .await
        {
            Ok(similar) => similar,
            Err(e) => {
                tracing::warn!(error = %e, "similarity lookup failed");
                return QualityGateResult::infrastructure_error(names::DUPLICATION, &e);
            }
        };

        let best = similar
            .into_iter()
            .filter(|item| item.similarity >= self.threshold)
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity));

        match best {
            Some(item) => QualityGateResult::fail(
                names::DUPLICATION,
                format!(
                    "near-duplicate of {} (similarity {:.2}, threshold {:.2})",
                    item.id, item.similarity, self.threshold
                ),
            )
            .with_details(serde_json::json!({
                "similarId": item.id,
                "similarText": item.text,
                "similarity": item.similarity,
                "threshold": self.threshold,
            })),
            None => QualityGateResult::pass(names::DUPLICATION),
        }
    }
}
