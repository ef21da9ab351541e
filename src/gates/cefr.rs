//! CEFR consistency gate.
//!
//! Content tagged with a proficiency level must stay inside that level's
//! numeric ceilings and must not teach grammar introduced at a later level.

use async_trait::async_trait;
use regex::Regex;

use crate::core::{CefrLevel, CefrView, ContentType, GateInput};
use crate::gates::{names, QualityGate, QualityGateResult, Tier};

/// Numeric ceilings for one CEFR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLimits {
    /// Longest allowed word, in characters.
    pub max_word_length: usize,
    /// Highest allowed corpus frequency rank.
    pub max_frequency_rank: u32,
    /// Longest allowed explanation, in words.
    pub max_explanation_words: usize,
    /// Longest allowed explanation, in sentences.
    pub max_explanation_sentences: usize,
}

/// Ceilings for a level.
pub fn limits_for(level: CefrLevel) -> LevelLimits {
    let (max_word_length, max_frequency_rank, max_explanation_words, max_explanation_sentences) =
        match level {
            CefrLevel::A1 => (10, 1_000, 40, 3),
            CefrLevel::A2 => (12, 2_000, 60, 4),
            CefrLevel::B1 => (14, 3_500, 90, 6),
            CefrLevel::B2 => (16, 5_000, 130, 8),
            CefrLevel::C1 => (20, 8_000, 180, 10),
            CefrLevel::C2 => (30, u32::MAX, 250, 14),
        };
    LevelLimits {
        max_word_length,
        max_frequency_rank,
        max_explanation_words,
        max_explanation_sentences,
    }
}

/// Grammar topics and the level at which they may first appear.
const ADVANCED_TOPICS: &[(&str, &str, CefrLevel)] = &[
    (
        "subjunctive",
        r"(?i)\b(subjunctive|subjuntivo|subjonctif|konjunktiv|congiuntivo|conjuntivo)\b",
        CefrLevel::B1,
    ),
    (
        "passive voice",
        r"(?i)\b(passive voice|voz pasiva|voix passive|passiv)\b",
        CefrLevel::B1,
    ),
    (
        "reported speech",
        r"(?i)\b(reported|indirect) speech\b|\bestilo indirecto\b|\bdiscours indirect\b",
        CefrLevel::B1,
    ),
    (
        "pluperfect",
        r"(?i)\b(pluperfect|pluscuamperfecto|plus-que-parfait|plusquamperfekt)\b",
        CefrLevel::B2,
    ),
    (
        "conditional perfect",
        r"(?i)\b(conditional perfect|condicional compuesto|conditionnel pass[ée])\b",
        CefrLevel::B2,
    ),
    (
        "future perfect",
        r"(?i)\b(future perfect|futuro perfecto|futur ant[ée]rieur)\b",
        CefrLevel::B2,
    ),
    ("mixed conditional", r"(?i)\bmixed conditionals?\b", CefrLevel::C1),
    ("inversion", r"(?i)\b(inversion|inversi[óo]n)\b", CefrLevel::C1),
    ("cleft sentence", r"(?i)\bcleft sentences?\b", CefrLevel::C1),
];

/// Checks that content matches its declared CEFR level.
#[derive(Debug, Clone)]
pub struct CefrConsistencyGate {
    topics: Vec<(String, Regex, CefrLevel)>,
}

impl Default for CefrConsistencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CefrConsistencyGate {
    pub fn new() -> Self {
        let topics = ADVANCED_TOPICS
            .iter()
            .filter_map(|(topic, pattern, level)| {
                Regex::new(pattern)
                    .ok()
                    .map(|re| (topic.to_string(), re, *level))
            })
            .collect();
        Self { topics }
    }

    /// Every criterion the input violates at `level`.
    fn issues(&self, input: &GateInput, view: &CefrView, level: CefrLevel) -> Vec<String> {
        let limits = limits_for(level);
        let mut issues = Vec::new();

        if input.content_type == ContentType::Word {
            let longest = input
                .text
                .split_whitespace()
                .map(|w| w.chars().filter(|c| c.is_alphabetic()).count())
                .max()
                .unwrap_or(0);
            if longest > limits.max_word_length {
                issues.push(format!(
                    "word length {} exceeds {} maximum of {}",
                    longest, level, limits.max_word_length
                ));
            }
        }

        if let Some(rank) = view.frequency_rank {
            if rank > limits.max_frequency_rank {
                issues.push(format!(
                    "frequency rank {} exceeds {} maximum of {}",
                    rank, level, limits.max_frequency_rank
                ));
            }
        }

        if let Some(explanation) = view.explanation.as_deref() {
            let words = explanation.split_whitespace().count();
            if words > limits.max_explanation_words {
                issues.push(format!(
                    "explanation has {} words, {} maximum is {}",
                    words, level, limits.max_explanation_words
                ));
            }
            let sentences = count_sentences(explanation);
            if sentences > limits.max_explanation_sentences {
                issues.push(format!(
                    "explanation has {} sentences, {} maximum is {}",
                    sentences, level, limits.max_explanation_sentences
                ));
            }
        }

        let haystack = match view.explanation.as_deref() {
            Some(explanation) => format!("{} {}", input.text, explanation),
            None => input.text.clone(),
        };
        for (topic, pattern, min_level) in &self.topics {
            if level < *min_level && pattern.is_match(&haystack) {
                issues.push(format!(
                    "advanced grammar topic '{}' is not allowed at {} (introduced at {})",
                    topic, level, min_level
                ));
            }
        }

        issues
    }
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

#[async_trait]
impl QualityGate for CefrConsistencyGate {
    fn name(&self) -> &str {
        names::CEFR
    }

    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let view: CefrView = match input.extension() {
            Ok(view) => view,
            Err(e) => {
                return QualityGateResult::fail(names::CEFR, format!("unreadable CEFR fields: {}", e))
            }
        };

        let Some(level) = view.level else {
            return QualityGateResult::pass(names::CEFR)
                .with_reason("no CEFR level declared; consistency not checked");
        };

        let issues = self.issues(input, &view, level);
        if issues.is_empty() {
            return QualityGateResult::pass(names::CEFR);
        }

        tracing::debug!(level = %level, count = issues.len(), "CEFR consistency violations");
        QualityGateResult::fail(
            names::CEFR,
            format!("content exceeds {} level: {}", level, issues.join("; ")),
        )
        .with_details(serde_json::json!({ "level": level.as_str(), "issues": issues }))
    }
}
