//! Structural validation as a gate.

use async_trait::async_trait;

use crate::core::{schema_issues, GateInput};
use crate::gates::{names, QualityGate, QualityGateResult, Tier};

/// Rejects inputs whose fields are structurally malformed.
#[derive(Debug, Default, Clone)]
pub struct SchemaGate;

impl SchemaGate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QualityGate for SchemaGate {
    fn name(&self) -> &str {
        names::SCHEMA
    }

    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let issues = schema_issues(input)
            .into_iter()
            .map(|issue| issue.to_string())
            .collect();
        QualityGateResult::from_issues(names::SCHEMA, "Malformed input", issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContentType;

    #[tokio::test]
    async fn test_well_formed_input_passes() {
        let input = GateInput::new("casa", "es", ContentType::Word).with_meta("level", "A1");
        assert!(SchemaGate::new().check(&input).await.passed);
    }

    #[tokio::test]
    async fn test_lowercase_level_passes() {
        let input = GateInput::new("casa", "es", ContentType::Word).with_meta("level", "a1");
        assert!(SchemaGate::new().check(&input).await.passed);
    }

    #[tokio::test]
    async fn test_empty_text_fails_with_issue() {
        let input = GateInput::new("   ", "es", ContentType::Word);
        let result = SchemaGate::new().check(&input).await;
        assert!(!result.passed);
        assert_eq!(result.gate_name, "schema-validation");
        assert_eq!(
            result.details.unwrap()["issues"][0],
            "text: must not be empty"
        );
    }
}
