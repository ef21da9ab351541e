//! In-memory repositories.
//!
//! Thread-safe implementations of every repository trait using
//! `RwLock<HashMap>`/`RwLock<Vec>`. Used by the test suite and by the CLI
//! where no persistent store is configured. Locks are never held across an
//! `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{CefrLevel, ItemType, LifecycleState, StateTransition};
use crate::error::Result;
use crate::ledger::{ApprovalEventRecord, DeprecationRecord};
use crate::pipeline::GateResultRecord;
use crate::storage::{
    ApprovalEventRepository, DeprecationRepository, DuplicationRepository,
    FailureRecorderRepository, PrerequisiteInfo, PrerequisiteRepository, SimilarItem,
    TransitionRepository,
};

// ============================================================================
// Similarity
// ============================================================================

/// Lower-case and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = normalize_text(text).chars().collect();
    if chars.len() < 3 {
        return HashSet::from([chars.iter().collect()]);
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity of character trigram sets, in `[0.0, 1.0]`.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let a = trigrams(a);
    let b = trigrams(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

// ============================================================================
// Duplication
// ============================================================================

#[derive(Debug, Clone)]
struct StoredText {
    id: String,
    text: String,
    language: String,
    content_type: String,
}

/// Corpus texts for duplicate lookup.
#[derive(Debug, Default)]
pub struct MemoryDuplicationRepository {
    items: RwLock<Vec<StoredText>>,
}

impl MemoryDuplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing corpus item.
    pub fn insert(&self, id: &str, text: &str, language: &str, content_type: &str) {
        self.items.write().unwrap().push(StoredText {
            id: id.to_string(),
            text: text.to_string(),
            language: language.to_lowercase(),
            content_type: content_type.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().unwrap().is_empty()
    }
}

#[async_trait]
impl DuplicationRepository for MemoryDuplicationRepository {
    async fn find_exact_match(
        &self,
        text: &str,
        language: &str,
        content_type: &str,
    ) -> Result<Option<String>> {
        let needle = normalize_text(text);
        let items = self.items.read().unwrap();
        Ok(items
            .iter()
            .find(|item| {
                item.language == language
                    && item.content_type == content_type
                    && normalize_text(&item.text) == needle
            })
            .map(|item| item.id.clone()))
    }

    async fn find_similar(
        &self,
        text: &str,
        language: &str,
        content_type: &str,
        threshold: f64,
    ) -> Result<Vec<SimilarItem>> {
        let items = self.items.read().unwrap();
        let mut similar: Vec<SimilarItem> = items
            .iter()
            .filter(|item| item.language == language && item.content_type == content_type)
            .map(|item| SimilarItem {
                id: item.id.clone(),
                text: item.text.clone(),
                similarity: trigram_similarity(text, &item.text),
            })
            .filter(|item| item.similarity >= threshold)
            .collect();
        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(similar)
    }
}

// ============================================================================
// Prerequisites
// ============================================================================

/// Catalog entries and their prerequisite edges.
#[derive(Debug, Default)]
pub struct MemoryPrerequisiteRepository {
    items: RwLock<HashMap<String, (PrerequisiteInfo, Vec<String>)>>,
}

impl MemoryPrerequisiteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog item with its direct prerequisites.
    pub fn insert(&self, id: &str, level: CefrLevel, language: &str, prerequisites: &[&str]) {
        let info = PrerequisiteInfo {
            id: id.to_string(),
            level,
            language: language.to_lowercase(),
        };
        let edges = prerequisites.iter().map(|p| p.to_string()).collect();
        self.items
            .write()
            .unwrap()
            .insert(id.to_string(), (info, edges));
    }
}

#[async_trait]
impl PrerequisiteRepository for MemoryPrerequisiteRepository {
    async fn find_prerequisites(&self, ids: &[String]) -> Result<Vec<PrerequisiteInfo>> {
        let items = self.items.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| items.get(id).map(|(info, _)| info.clone()))
            .collect())
    }

    async fn get_prerequisites_of(&self, id: &str) -> Result<Vec<String>> {
        let items = self.items.read().unwrap();
        Ok(items.get(id).map(|(_, edges)| edges.clone()).unwrap_or_default())
    }
}

// ============================================================================
// Gate results
// ============================================================================

/// Append-only gate result log.
#[derive(Debug, Default)]
pub struct MemoryFailureRecorderRepository {
    records: RwLock<Vec<GateResultRecord>>,
}

impl MemoryFailureRecorderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

fn is_entity(record: &GateResultRecord, entity_type: &str, entity_id: &str) -> bool {
    record.entity_type == entity_type && record.entity_id == entity_id
}

#[async_trait]
impl FailureRecorderRepository for MemoryFailureRecorderRepository {
    async fn insert(&self, record: &GateResultRecord) -> Result<()> {
        self.records.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn latest_attempt_number(&self, entity_type: &str, entity_id: &str) -> Result<u32> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| is_entity(r, entity_type, entity_id))
            .map(|r| r.attempt_number)
            .max()
            .unwrap_or(0))
    }

    async fn attempt_results(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
    ) -> Result<Vec<GateResultRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| is_entity(r, entity_type, entity_id) && r.attempt_number == attempt_number)
            .cloned()
            .collect())
    }

    async fn failures(&self, entity_type: &str, entity_id: &str) -> Result<Vec<GateResultRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| is_entity(r, entity_type, entity_id) && !r.passed)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.created_at >= cutoff);
        Ok(before - records.len())
    }
}

// ============================================================================
// Transitions
// ============================================================================

type ItemKey = (ItemType, String);

/// Transition log plus the current location of each item.
#[derive(Debug, Default)]
pub struct MemoryTransitionRepository {
    transitions: RwLock<Vec<StateTransition>>,
    locations: RwLock<HashMap<ItemKey, String>>,
}

impl MemoryTransitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the item currently lives.
    pub fn location_of(&self, item_id: &str, item_type: ItemType) -> Option<String> {
        self.locations
            .read()
            .unwrap()
            .get(&(item_type, item_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TransitionRepository for MemoryTransitionRepository {
    async fn record_transition(
        &self,
        transition: &StateTransition,
        _from_location: &str,
        to_location: &str,
    ) -> Result<()> {
        let mut transitions = self.transitions.write().unwrap();
        let mut locations = self.locations.write().unwrap();
        transitions.push(transition.clone());
        locations.insert(
            (transition.item_type, transition.item_id.clone()),
            to_location.to_string(),
        );
        Ok(())
    }

    async fn current_state(
        &self,
        item_id: &str,
        item_type: ItemType,
    ) -> Result<Option<LifecycleState>> {
        let transitions = self.transitions.read().unwrap();
        Ok(transitions
            .iter()
            .rev()
            .find(|t| t.item_id == item_id && t.item_type == item_type)
            .map(|t| t.to_state))
    }

    async fn history(&self, item_id: &str, item_type: ItemType) -> Result<Vec<StateTransition>> {
        let transitions = self.transitions.read().unwrap();
        Ok(transitions
            .iter()
            .filter(|t| t.item_id == item_id && t.item_type == item_type)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Approvals and deprecations
// ============================================================================

/// Approval event log.
#[derive(Debug, Default)]
pub struct MemoryApprovalEventRepository {
    events: RwLock<Vec<ApprovalEventRecord>>,
}

impl MemoryApprovalEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalEventRepository for MemoryApprovalEventRepository {
    async fn create(&self, event: &ApprovalEventRecord) -> Result<()> {
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }

    async fn find_by_item(
        &self,
        item_id: &str,
        item_type: ItemType,
    ) -> Result<Vec<ApprovalEventRecord>> {
        let events = self.events.read().unwrap();
        Ok(events
            .iter()
            .filter(|e| e.item_id == item_id && e.item_type == item_type)
            .cloned()
            .collect())
    }
}

/// Deprecation records keyed by item.
#[derive(Debug, Default)]
pub struct MemoryDeprecationRepository {
    records: RwLock<HashMap<ItemKey, DeprecationRecord>>,
}

impl MemoryDeprecationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeprecationRepository for MemoryDeprecationRepository {
    async fn create(&self, record: &DeprecationRecord) -> Result<()> {
        self.records
            .write()
            .unwrap()
            .insert((record.item_type, record.item_id.clone()), record.clone());
        Ok(())
    }

    async fn find_by_item(
        &self,
        item_id: &str,
        item_type: ItemType,
    ) -> Result<Option<DeprecationRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(&(item_type, item_id.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_failure_recorder_contract;

    #[tokio::test]
    async fn test_memory_failure_recorder_contract() {
        let repo = MemoryFailureRecorderRepository::new();
        test_failure_recorder_contract(&repo).await;
        assert!(repo.is_empty());
    }

    #[test]
    fn test_trigram_similarity_bounds() {
        assert_eq!(trigram_similarity("la casa", "La  Casa"), 1.0);
        assert_eq!(trigram_similarity("abc", "xyz"), 0.0);
        let s = trigram_similarity("el perro come carne", "el perro come carnes");
        assert!(s > 0.9 && s < 1.0, "{}", s);
    }

    #[test]
    fn test_short_texts_compare_whole() {
        assert_eq!(trigram_similarity("yo", "yo"), 1.0);
        assert_eq!(trigram_similarity("yo", "tu"), 0.0);
    }

    #[tokio::test]
    async fn test_exact_match_ignores_case_and_spacing() {
        let repo = MemoryDuplicationRepository::new();
        repo.insert("w-1", "Buenos  días", "es", "sentence");
        assert_eq!(
            repo.find_exact_match("buenos días", "es", "sentence").await.unwrap(),
            Some("w-1".to_string())
        );
        assert_eq!(repo.find_exact_match("buenos días", "es", "word").await.unwrap(), None);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_find_similar_sorted_best_first() {
        let repo = MemoryDuplicationRepository::new();
        repo.insert("a", "el perro come carne", "es", "sentence");
        repo.insert("b", "el perro come carnes rojas", "es", "sentence");
        let similar = repo
            .find_similar("el perro come carnes", "es", "sentence", 0.5)
            .await
            .unwrap();
        assert_eq!(similar.len(), 2);
        assert!(similar[0].similarity >= similar[1].similarity);
    }

    #[tokio::test]
    async fn test_prerequisite_lookup_omits_unknown() {
        let repo = MemoryPrerequisiteRepository::new();
        repo.insert("a", CefrLevel::A1, "ES", &["b"]);
        let found = repo
            .find_prerequisites(&["a".to_string(), "zz".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].language, "es");
        assert_eq!(repo.get_prerequisites_of("a").await.unwrap(), vec!["b"]);
        assert!(repo.get_prerequisites_of("zz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_repository_tracks_state_and_location() {
        let repo = MemoryTransitionRepository::new();
        assert_eq!(repo.current_state("w-1", ItemType::Word).await.unwrap(), None);

        let t1 = StateTransition::new("w-1", ItemType::Word, LifecycleState::Draft, LifecycleState::Candidate);
        let t2 = StateTransition::new("w-1", ItemType::Word, LifecycleState::Candidate, LifecycleState::Validated);
        repo.record_transition(&t1, "drafts", "candidates").await.unwrap();
        repo.record_transition(&t2, "candidates", "validated").await.unwrap();

        assert_eq!(
            repo.current_state("w-1", ItemType::Word).await.unwrap(),
            Some(LifecycleState::Validated)
        );
        assert_eq!(repo.location_of("w-1", ItemType::Word).as_deref(), Some("validated"));
        assert_eq!(repo.history("w-1", ItemType::Word).await.unwrap().len(), 2);
        assert_eq!(repo.current_state("w-1", ItemType::Exercise).await.unwrap(), None);
    }
}
