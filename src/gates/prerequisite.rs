//! Prerequisite validation gate.
//!
//! Checks the declared prerequisites of an item against the catalog and walks
//! the prerequisite graph looking for cycles that would pass through the item.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{CefrLevel, GateInput, PrerequisiteView};
use crate::error::Result;
use crate::gates::{names, QualityGate, QualityGateResult, Tier};
use crate::storage::PrerequisiteRepository;

/// Label used on cycle paths when the input carries no item id.
const UNSAVED_ITEM: &str = "<unsaved>";

/// Validates the prerequisite graph of one item.
pub struct PrerequisiteGate {
    repository: Arc<dyn PrerequisiteRepository>,
}

impl std::fmt::Debug for PrerequisiteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrerequisiteGate").finish_non_exhaustive()
    }
}

struct Frame {
    node: String,
    children: Vec<String>,
    next: usize,
}

impl PrerequisiteGate {
    pub fn new(repository: Arc<dyn PrerequisiteRepository>) -> Self {
        Self { repository }
    }

    /// Depth-first search from each direct prerequisite.
    ///
    /// Returns the first cycle found as a node path that starts and ends on
    /// the same id. Nodes fully explored without finding a cycle are not
    /// walked again during the same call.
    pub async fn find_cycle(&self, item_id: &str, direct: &[String]) -> Result<Option<Vec<String>>> {
        let mut cleared: HashSet<String> = HashSet::new();

        for start in direct {
            if cleared.contains(start) {
                continue;
            }

            let mut path = vec![item_id.to_string()];
            let mut on_path: HashSet<String> = HashSet::from([item_id.to_string()]);

            if on_path.contains(start) {
                path.push(start.clone());
                return Ok(Some(path));
            }
            let children = self.repository.get_prerequisites_of(start).await?;
            path.push(start.clone());
            on_path.insert(start.clone());
            let mut stack = vec![Frame {
                node: start.clone(),
                children,
                next: 0,
            }];

            while let Some(frame) = stack.last_mut() {
                if frame.next >= frame.children.len() {
                    if let Some(done) = stack.pop() {
                        path.pop();
                        on_path.remove(&done.node);
                        cleared.insert(done.node);
                    }
                    continue;
                }

                let child = frame.children[frame.next].clone();
                frame.next += 1;

                if on_path.contains(&child) {
                    let from = path.iter().position(|n| *n == child).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(child);
                    return Ok(Some(cycle));
                }
                if cleared.contains(&child) {
                    continue;
                }

                let children = self.repository.get_prerequisites_of(&child).await?;
                path.push(child.clone());
                on_path.insert(child.clone());
                stack.push(Frame {
                    node: child,
                    children,
                    next: 0,
                });
            }
        }

        Ok(None)
    }

    async fn catalog_issues(
        &self,
        prerequisites: &[String],
        level: Option<CefrLevel>,
        language: &str,
    ) -> Result<Vec<String>> {
        let found = self.repository.find_prerequisites(prerequisites).await?;
        let mut issues = Vec::new();

        let missing: Vec<&str> = prerequisites
            .iter()
            .filter(|id| !found.iter().any(|info| &info.id == *id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            issues.push(format!("Prerequisites not found: {}", missing.join(", ")));
        }

        for info in &found {
            if let Some(level) = level {
                if info.level > level {
                    issues.push(format!(
                        "Prerequisite {} is {} but the item is {}",
                        info.id, info.level, level
                    ));
                }
            }
            if info.language != language {
                issues.push(format!(
                    "Prerequisite {} is in '{}' but the item is in '{}'",
                    info.id, info.language, language
                ));
            }
        }

        Ok(issues)
    }
}

#[async_trait]
impl QualityGate for PrerequisiteGate {
    fn name(&self) -> &str {
        names::PREREQUISITE
    }

    fn tier(&self) -> Tier {
        Tier::Database
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let view: PrerequisiteView = match input.extension() {
            Ok(view) => view,
            Err(e) => {
                return QualityGateResult::fail(
                    names::PREREQUISITE,
                    format!("malformed prerequisite metadata: {}", e),
                )
            }
        };

        if view.prerequisites.is_empty() {
            return QualityGateResult::pass(names::PREREQUISITE);
        }

        let item_id = view.item_id.as_deref().unwrap_or(UNSAVED_ITEM);
        if view.prerequisites.iter().any(|p| p == item_id) {
            return QualityGateResult::fail(
                names::PREREQUISITE,
                "Item cannot be its own prerequisite",
            )
            .with_details(serde_json::json!({ "itemId": item_id }));
        }

        let mut issues = match self
            .catalog_issues(&view.prerequisites, view.level, &input.language)
            .await
        {
            Ok(issues) => issues,
            Err(e) => {
                tracing::warn!(error = %e, item_id, "prerequisite lookup failed");
                return QualityGateResult::infrastructure_error(names::PREREQUISITE, &e);
            }
        };

        let cycle = match self.find_cycle(item_id, &view.prerequisites).await {
            Ok(cycle) => cycle,
            Err(e) => {
                tracing::warn!(error = %e, item_id, "prerequisite graph walk failed");
                return QualityGateResult::infrastructure_error(names::PREREQUISITE, &e);
            }
        };
        if let Some(cycle) = &cycle {
            issues.push(format!("Circular dependency: {}", cycle.join(" -> ")));
        }

        if issues.is_empty() {
            return QualityGateResult::pass(names::PREREQUISITE);
        }

        QualityGateResult::fail(
            names::PREREQUISITE,
            format!("Prerequisite violations: {}", issues.join("; ")),
        )
        .with_details(serde_json::json!({
            "issues": issues,
            "cycle": cycle,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::core::ContentType;
    use crate::error::SieveError;
    use crate::storage::{MemoryPrerequisiteRepository, PrerequisiteInfo};

    fn input(item_id: &str, level: &str, prerequisites: &[&str]) -> GateInput {
        GateInput::new("palabra", "es", ContentType::Word)
            .with_meta("itemId", item_id)
            .with_meta("level", level)
            .with_meta("prerequisites", serde_json::json!(prerequisites))
    }

    fn cyclic_repo() -> Arc<MemoryPrerequisiteRepository> {
        let repo = MemoryPrerequisiteRepository::new();
        repo.insert("A", CefrLevel::A1, "es", &["B"]);
        repo.insert("B", CefrLevel::A1, "es", &["A"]);
        Arc::new(repo)
    }

    #[tokio::test]
    async fn test_no_prerequisites_passes() {
        let gate = PrerequisiteGate::new(Arc::new(MemoryPrerequisiteRepository::new()));
        assert!(gate.check(&input("A", "A1", &[])).await.passed);
    }

    #[tokio::test]
    async fn test_self_reference_fails() {
        let gate = PrerequisiteGate::new(cyclic_repo());
        let result = gate.check(&input("A", "A1", &["A"])).await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("own prerequisite"));
    }

    #[tokio::test]
    async fn test_cycle_detected_from_either_node() {
        let gate = PrerequisiteGate::new(cyclic_repo());

        let from_a = gate.check(&input("A", "A1", &["B"])).await;
        assert!(!from_a.passed);
        assert!(from_a.reason.unwrap().contains("A -> B -> A"));

        let from_b = gate.check(&input("B", "A1", &["A"])).await;
        assert!(!from_b.passed);
        assert_eq!(from_b.details.unwrap()["cycle"], serde_json::json!(["B", "A", "B"]));
    }

    #[tokio::test]
    async fn test_cycle_not_through_item_is_reported() {
        let repo = MemoryPrerequisiteRepository::new();
        repo.insert("X", CefrLevel::A1, "es", &["Y"]);
        repo.insert("Y", CefrLevel::A1, "es", &["Z"]);
        repo.insert("Z", CefrLevel::A1, "es", &["Y"]);
        let gate = PrerequisiteGate::new(Arc::new(repo));

        let cycle = gate.find_cycle("N", &["X".to_string()]).await.unwrap();
        assert_eq!(cycle.unwrap(), vec!["Y", "Z", "Y"]);
    }

    #[tokio::test]
    async fn test_missing_prerequisite_fails() {
        let gate = PrerequisiteGate::new(cyclic_repo());
        let result = gate.check(&input("N", "B1", &["A", "ghost"])).await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("not found: ghost"));
    }

    #[tokio::test]
    async fn test_prerequisite_above_item_level_fails() {
        let repo = MemoryPrerequisiteRepository::new();
        repo.insert("hard", CefrLevel::C1, "es", &[]);
        let gate = PrerequisiteGate::new(Arc::new(repo));

        let result = gate.check(&input("N", "A2", &["hard"])).await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("C1"));

        assert!(gate.check(&input("N", "C2", &["hard"])).await.passed);
    }

    #[tokio::test]
    async fn test_language_mismatch_fails() {
        let repo = MemoryPrerequisiteRepository::new();
        repo.insert("en-1", CefrLevel::A1, "en", &[]);
        let gate = PrerequisiteGate::new(Arc::new(repo));

        let result = gate.check(&input("N", "A1", &["en-1"])).await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("'en'"));
    }

    /// Counts graph reads per node.
    struct CountingRepository {
        graph: HashMap<String, Vec<String>>,
        reads: Mutex<HashMap<String, u32>>,
    }

    #[async_trait]
    impl PrerequisiteRepository for CountingRepository {
        async fn find_prerequisites(&self, ids: &[String]) -> Result<Vec<PrerequisiteInfo>> {
            Ok(ids
                .iter()
                .map(|id| PrerequisiteInfo {
                    id: id.clone(),
                    level: CefrLevel::A1,
                    language: "es".into(),
                })
                .collect())
        }

        async fn get_prerequisites_of(&self, id: &str) -> Result<Vec<String>> {
            *self.reads.lock().unwrap().entry(id.to_string()).or_default() += 1;
            Ok(self.graph.get(id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_explored_nodes_are_walked_once() {
        let edges: &[(&str, &[&str])] = &[("B", &["D"]), ("C", &["D"]), ("D", &["E"]), ("E", &[])];
        let graph = edges
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect();
        let repo = Arc::new(CountingRepository {
            graph,
            reads: Mutex::new(HashMap::new()),
        });
        let gate = PrerequisiteGate::new(repo.clone());

        assert!(gate.check(&input("A", "A1", &["B", "C"])).await.passed);
        let reads = repo.reads.lock().unwrap();
        assert_eq!(reads["D"], 1);
        assert_eq!(reads["E"], 1);
    }

    struct BrokenRepository;

    #[async_trait]
    impl PrerequisiteRepository for BrokenRepository {
        async fn find_prerequisites(&self, _: &[String]) -> Result<Vec<PrerequisiteInfo>> {
            Err(SieveError::repository("catalog offline"))
        }

        async fn get_prerequisites_of(&self, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_repository_error_is_transient() {
        let gate = PrerequisiteGate::new(Arc::new(BrokenRepository));
        let result = gate.check(&input("A", "A1", &["B"])).await;
        assert!(!result.passed);
        assert!(result.transient);
    }

    #[tokio::test]
    async fn test_malformed_metadata_fails() {
        let gate = PrerequisiteGate::new(Arc::new(MemoryPrerequisiteRepository::new()));
        let bad = GateInput::new("x", "es", ContentType::Word)
            .with_meta("prerequisites", "A");
        let result = gate.check(&bad).await;
        assert!(!result.passed);
        assert!(!result.transient);
    }
}
