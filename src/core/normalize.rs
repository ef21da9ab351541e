//! Draft normalization.
//!
//! Turns a raw ingested [`DraftPayload`] into the [`GateInput`] a Candidate
//! carries. Structural problems are collected field by field and raised
//! together as [`SieveError::SchemaValidation`].

use serde::{Deserialize, Serialize};

use crate::core::input::{ContentType, GateInput};
use crate::core::state::{CefrLevel, ItemType};
use crate::error::{FieldIssue, Result, SieveError};

/// Maximum length of item text, in characters.
pub const TEXT_MAX_LENGTH: usize = 2000;

/// Raw item as produced by ingestion. Every field is loose so validation can
/// name exactly what is wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayload {
    /// Item identifier.
    pub item_id: String,
    /// Item kind (`word`, `grammar_rule`, `exercise`).
    pub item_type: String,
    /// Item text.
    #[serde(default)]
    pub text: Option<String>,
    /// Language code.
    #[serde(default)]
    pub language: Option<String>,
    /// Content type; derived from the item type when absent.
    #[serde(default)]
    pub content_type: Option<String>,
    /// CEFR level code.
    #[serde(default)]
    pub level: Option<String>,
    /// Everything else, passed through to gate metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A normalized draft, ready to become a Candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDraft {
    /// Item identifier.
    pub item_id: String,
    /// Parsed item kind.
    pub item_type: ItemType,
    /// Gate input for the Candidate.
    pub input: GateInput,
}

/// Normalize a draft payload into gate input.
pub fn normalize_draft(draft: &DraftPayload) -> Result<NormalizedDraft> {
    let mut issues = Vec::new();

    let item_id = draft.item_id.trim().to_string();
    if item_id.is_empty() {
        issues.push(FieldIssue::new("itemId", "must not be empty"));
    }

    let item_type = match draft.item_type.parse::<ItemType>() {
        Ok(t) => Some(t),
        Err(e) => {
            issues.push(FieldIssue::new("itemType", e));
            None
        }
    };

    let text = draft.text.as_deref().map(collapse_whitespace).unwrap_or_default();
    issues.extend(text_issues(&text));

    let language = draft
        .language
        .as_deref()
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_default();
    issues.extend(language_issues(&language));

    let content_type = match (&draft.content_type, item_type) {
        (Some(raw), _) => match parse_content_type(raw) {
            Some(ct) => ct,
            None => {
                issues.push(FieldIssue::new(
                    "contentType",
                    format!("unknown content type: '{}'", raw),
                ));
                ContentType::default()
            }
        },
        (None, Some(ItemType::GrammarRule)) => ContentType::GrammarRule,
        (None, Some(ItemType::Exercise)) => ContentType::Exercise,
        (None, _) => ContentType::Word,
    };

    let level = match draft.level.as_deref() {
        Some(raw) => match raw.parse::<CefrLevel>() {
            Ok(level) => Some(level),
            Err(e) => {
                issues.push(FieldIssue::new("level", e));
                None
            }
        },
        None => None,
    };

    if !issues.is_empty() {
        return Err(SieveError::schema_validation(issues));
    }

    let mut input = GateInput::new(text, language, content_type);
    input.metadata = draft.metadata.clone();
    input
        .metadata
        .insert("itemId".to_string(), item_id.clone().into());
    if let Some(level) = level {
        input
            .metadata
            .insert("level".to_string(), level.as_str().into());
    }

    Ok(NormalizedDraft {
        item_id,
        // Issues above guarantee the type parsed.
        item_type: item_type.unwrap_or(ItemType::Word),
        input,
    })
}

/// Structural issues with an already-built gate input.
///
/// Used by the schema gate so candidates built outside [`normalize_draft`]
/// get the same checks.
pub fn schema_issues(input: &GateInput) -> Vec<FieldIssue> {
    let mut issues = text_issues(&input.text);
    issues.extend(language_issues(&input.language));

    if let Some(raw) = input.metadata.get("level") {
        let valid = raw
            .as_str()
            .map(|s| s.parse::<CefrLevel>().is_ok())
            .unwrap_or(false);
        if !valid {
            issues.push(FieldIssue::new(
                "level",
                format!("not a CEFR level: {}", raw),
            ));
        }
    }

    if let Some(prereqs) = input.metadata.get("prerequisites") {
        let valid = prereqs
            .as_array()
            .map(|items| items.iter().all(|v| v.is_string()))
            .unwrap_or(false);
        if !valid {
            issues.push(FieldIssue::new(
                "prerequisites",
                "must be a list of item identifiers",
            ));
        }
    }

    issues
}

fn text_issues(text: &str) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if text.trim().is_empty() {
        issues.push(FieldIssue::new("text", "must not be empty"));
    }
    let length = text.chars().count();
    if length > TEXT_MAX_LENGTH {
        issues.push(FieldIssue::new(
            "text",
            format!("too long: {} chars (max: {})", length, TEXT_MAX_LENGTH),
        ));
    }
    issues
}

fn language_issues(language: &str) -> Vec<FieldIssue> {
    if language.is_empty() {
        return vec![FieldIssue::new("language", "must not be empty")];
    }
    let well_formed = language.len() == 2 && language.chars().all(|c| c.is_ascii_lowercase());
    if well_formed {
        Vec::new()
    } else {
        vec![FieldIssue::new(
            "language",
            format!("expected a two-letter ISO 639-1 code, got '{}'", language),
        )]
    }
}

fn parse_content_type(raw: &str) -> Option<ContentType> {
    match raw.trim().to_lowercase().replace('-', "_").as_str() {
        "word" => Some(ContentType::Word),
        "grammar_rule" | "grammar" => Some(ContentType::GrammarRule),
        "exercise" => Some(ContentType::Exercise),
        "sentence" => Some(ContentType::Sentence),
        _ => None,
    }
}

/// Trim and collapse internal runs of whitespace to single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, language: &str) -> DraftPayload {
        DraftPayload {
            item_id: "w-1".to_string(),
            item_type: "word".to_string(),
            text: Some(text.to_string()),
            language: Some(language.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_lowercases_language() {
        let normalized = normalize_draft(&draft("  la   casa \n", "ES")).unwrap();
        assert_eq!(normalized.input.text, "la casa");
        assert_eq!(normalized.input.language, "es");
        assert_eq!(normalized.item_type, ItemType::Word);
        assert_eq!(normalized.input.metadata["itemId"], "w-1");
    }

    #[test]
    fn test_normalize_uppercases_level_into_metadata() {
        let mut payload = draft("casa", "es");
        payload.level = Some("a2".to_string());
        let normalized = normalize_draft(&payload).unwrap();
        assert_eq!(normalized.input.metadata["level"], "A2");
        assert_eq!(normalized.input.level(), Some(CefrLevel::A2));
    }

    #[test]
    fn test_content_type_derived_from_item_type() {
        let mut payload = draft("Subjunctive mood usage", "es");
        payload.item_type = "grammar_rule".to_string();
        let normalized = normalize_draft(&payload).unwrap();
        assert_eq!(normalized.input.content_type, ContentType::GrammarRule);
    }

    #[test]
    fn test_normalize_collects_every_issue() {
        let payload = DraftPayload {
            item_id: " ".to_string(),
            item_type: "poem".to_string(),
            text: None,
            language: Some("spanish".to_string()),
            content_type: None,
            level: Some("Z1".to_string()),
            metadata: Default::default(),
        };

        match normalize_draft(&payload).unwrap_err() {
            SieveError::SchemaValidation { issues } => {
                let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
                assert_eq!(fields, vec!["itemId", "itemType", "text", "language", "level"]);
            }
            other => panic!("Expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_text_too_long() {
        let long = "a".repeat(TEXT_MAX_LENGTH + 1);
        let err = normalize_draft(&draft(&long, "en")).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_schema_issues_on_gate_input() {
        let input = GateInput::new("", "eng", ContentType::Word)
            .with_meta("level", "X")
            .with_meta("prerequisites", serde_json::json!([1, 2]));
        let fields: Vec<String> = schema_issues(&input).into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["text", "language", "level", "prerequisites"]);
    }

    #[test]
    fn test_schema_issues_clean_input() {
        let input = GateInput::new("casa", "es", ContentType::Word)
            .with_meta("level", "A1")
            .with_meta("prerequisites", serde_json::json!(["w-0"]));
        assert!(schema_issues(&input).is_empty());
    }
}
