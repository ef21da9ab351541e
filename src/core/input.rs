//! Normalized gate input.
//!
//! Every gate consumes the same base [`GateInput`]. Gates that need more than
//! the base fields read a typed extension view out of `metadata` with
//! [`GateInput::extension`], so each gate owns the narrowing of its own view.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::state::CefrLevel;

/// What kind of content the text represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A single vocabulary item.
    #[default]
    Word,
    /// A grammar rule (title plus explanation).
    GrammarRule,
    /// An exercise prompt.
    Exercise,
    /// An example sentence.
    Sentence,
}

impl ContentType {
    /// Snake-case name of the content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Word => "word",
            ContentType::GrammarRule => "grammar_rule",
            ContentType::Exercise => "exercise",
            ContentType::Sentence => "sentence",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized unit every gate operates on.
///
/// Immutable for the duration of one gate run; gates receive it by shared
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateInput {
    /// The item text (word, rule title, exercise prompt).
    pub text: String,
    /// Lower-case ISO 639-1 language code.
    pub language: String,
    /// Kind of content.
    #[serde(default)]
    pub content_type: ContentType,
    /// Gate-specific extension fields.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl GateInput {
    /// Create an input with empty metadata.
    pub fn new(text: impl Into<String>, language: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            text: text.into(),
            language: language.into().to_lowercase(),
            content_type,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set one metadata field.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Deserialize a gate-specific view out of `metadata`.
    ///
    /// Missing optional fields fall back to their serde defaults; a field of
    /// the wrong shape is reported as an error string for the gate to surface.
    pub fn extension<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(serde_json::Value::Object(self.metadata.clone()))
            .map_err(|e| e.to_string())
    }

    /// The declared CEFR level, if present and well-formed.
    pub fn level(&self) -> Option<CefrLevel> {
        self.metadata
            .get("level")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

/// Extension view read by the CEFR consistency gate.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CefrView {
    /// Declared proficiency level.
    pub level: Option<CefrLevel>,
    /// Corpus frequency rank of the word (1 = most frequent).
    #[serde(default)]
    pub frequency_rank: Option<u32>,
    /// Explanation text for grammar rules.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Extension view read by the prerequisite validation gate.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteView {
    /// Identifier of the item being validated.
    pub item_id: Option<String>,
    /// Declared proficiency level.
    pub level: Option<CefrLevel>,
    /// Identifiers of declared prerequisites.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_lowercases_language() {
        let input = GateInput::new("hola", "ES", ContentType::Word);
        assert_eq!(input.language, "es");
        assert!(input.metadata.is_empty());
    }

    #[test]
    fn test_cefr_view_from_metadata() {
        let input = GateInput::new("Subjunctive mood usage", "es", ContentType::GrammarRule)
            .with_meta("level", "A1")
            .with_meta("frequencyRank", 120)
            .with_meta("explanation", "Used for wishes.");

        let view: CefrView = input.extension().unwrap();
        assert_eq!(view.level, Some(CefrLevel::A1));
        assert_eq!(view.frequency_rank, Some(120));
        assert_eq!(view.explanation.as_deref(), Some("Used for wishes."));
    }

    #[test]
    fn test_prerequisite_view_defaults() {
        let input = GateInput::new("ser", "es", ContentType::Word).with_meta("itemId", "w-1");
        let view: PrerequisiteView = input.extension().unwrap();
        assert_eq!(view.item_id.as_deref(), Some("w-1"));
        assert!(view.prerequisites.is_empty());
        assert_eq!(view.level, None);
    }

    #[test]
    fn test_extension_reports_bad_shape() {
        let input = GateInput::new("ser", "es", ContentType::Word)
            .with_meta("prerequisites", json!("not-a-list"));
        let view: Result<PrerequisiteView, String> = input.extension();
        assert!(view.is_err());
    }

    #[test]
    fn test_level_helper_ignores_garbage() {
        let input = GateInput::new("ser", "es", ContentType::Word).with_meta("level", "Z9");
        assert_eq!(input.level(), None);
        let input = GateInput::new("ser", "es", ContentType::Word).with_meta("level", "b2");
        assert_eq!(input.level(), Some(CefrLevel::B2));
    }
}
