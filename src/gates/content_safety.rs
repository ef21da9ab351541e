//! Content safety gate.
//!
//! A lexical screen across four categories. Stem patterns match inside longer
//! words on purpose, so a whitelist of benign tokens ("skill", "grape",
//! "Sussex") is consulted against the whole token that contains each match.
//! Patterns and benign tokens can be scoped to one language, so English slang
//! is not applied to German "dick" and Portuguese "sexta" is not a stem hit.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::core::GateInput;
use crate::gates::{names, QualityGate, QualityGateResult, Tier};

/// Category of unsafe content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Profanity,
    Violence,
    Inappropriate,
    Hate,
}

impl std::fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyCategory::Profanity => write!(f, "profanity"),
            SafetyCategory::Violence => write!(f, "violence"),
            SafetyCategory::Inappropriate => write!(f, "inappropriate"),
            SafetyCategory::Hate => write!(f, "hate"),
        }
    }
}

/// (language or `None` for every language, category, pattern)
const PATTERNS: &[(Option<&str>, SafetyCategory, &str)] = &[
    (None, SafetyCategory::Profanity, r"(?i)fuck|shit|bitch|cunt|bastard"),
    (Some("en"), SafetyCategory::Profanity, r"(?i)\b(ass|asshole|dick|cock|piss)\b"),
    (None, SafetyCategory::Profanity, r"(?i)\b(mierda|puta|joder|coño|merde|putain|scheiße|scheisse|cazzo)\b"),
    (None, SafetyCategory::Violence, r"(?i)kill|murder|rap(e|ist)|massacre|behead|slaughter"),
    (Some("en"), SafetyCategory::Violence, r"(?i)\b(stab|stabbed|stabbing|shoot him|shoot her|torture)\b"),
    (None, SafetyCategory::Violence, r"(?i)\b(matar|asesinar|tuer|töten|uccidere)\b"),
    (None, SafetyCategory::Inappropriate, r"(?i)porn|nude|sex|xxx"),
    (None, SafetyCategory::Inappropriate, r"(?i)\b(cocaine|heroin|meth)\b"),
    (None, SafetyCategory::Hate, r"(?i)nazi|subhuman|white power|ethnic cleansing"),
    (Some("en"), SafetyCategory::Hate, r"(?i)\b(kill all|death to)\b"),
];

/// Tokens that contain a flagged substring but are benign.
const WHITELIST: &[&str] = &[
    "skill", "skills", "skilled", "skillful", "skillet", "killarney",
    "grape", "grapes", "drape", "drapes", "scrape", "scraped", "trapeze",
    "therapist", "therapists",
    "sextet", "sextant", "sexton", "sussex", "essex", "middlesex", "sexagesimal",
    "cocktail", "cocktails", "peacock", "hancock", "shuttlecock",
    "scunthorpe", "shiitake", "penistone",
    "assassin", "bassist", "dickens", "pissarro",
];

/// Benign tokens that only apply to one language.
const LANGUAGE_WHITELIST: &[(&str, &[&str])] = &[
    ("es", &["sexto", "sexta", "sextos", "sextas", "sexteto", "sexenio"]),
    ("pt", &["sexto", "sexta", "sextos", "sextas", "sexteto", "sexênio"]),
    ("it", &["sestetto", "sextant"]),
    ("de", &["nudel", "nudeln", "sextett", "sextette"]),
    ("fr", &["sextuor", "sextuple"]),
];

/// Screens text for profanity, violence, inappropriate and hateful content.
pub struct ContentSafetyGate {
    patterns: Vec<(Option<&'static str>, SafetyCategory, Regex)>,
    whitelist: HashSet<String>,
    language_whitelist: HashMap<&'static str, HashSet<&'static str>>,
}

impl std::fmt::Debug for ContentSafetyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSafetyGate")
            .field("patterns", &self.patterns.len())
            .field("whitelist", &self.whitelist.len())
            .field("language_whitelist", &self.language_whitelist.len())
            .finish()
    }
}

impl Default for ContentSafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// A flagged occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyMatch {
    pub category: SafetyCategory,
    /// The substring the pattern matched.
    pub matched: String,
    /// The full token containing the match.
    pub token: String,
}

impl ContentSafetyGate {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|(language, category, pattern)| {
                Regex::new(pattern).ok().map(|re| (*language, *category, re))
            })
            .collect();
        let whitelist = WHITELIST.iter().map(|w| w.to_string()).collect();
        let language_whitelist = LANGUAGE_WHITELIST
            .iter()
            .map(|(language, words)| (*language, words.iter().copied().collect()))
            .collect();
        Self {
            patterns,
            whitelist,
            language_whitelist,
        }
    }

    /// Add benign tokens to the whitelist.
    pub fn with_whitelist<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    /// All non-whitelisted matches in `text` written in `language`.
    pub fn scan(&self, text: &str, language: &str) -> Vec<SafetyMatch> {
        let language = primary_subtag(language);
        let local = self.language_whitelist.get(language.as_str());
        let mut found = Vec::new();
        for (scope, category, pattern) in &self.patterns {
            if scope.is_some_and(|scope| scope != language) {
                continue;
            }
            for m in pattern.find_iter(text) {
                let token = containing_token(text, m.start(), m.end());
                let lowered = token.to_lowercase();
                if self.whitelist.contains(&lowered)
                    || local.is_some_and(|words| words.contains(lowered.as_str()))
                {
                    continue;
                }
                found.push(SafetyMatch {
                    category: *category,
                    matched: m.as_str().to_string(),
                    token: token.to_string(),
                });
            }
        }
        found
    }
}

/// `"pt-BR"` and `"PT"` both scope as `"pt"`.
fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Expand a match to the alphabetic token around it.
fn containing_token(text: &str, start: usize, end: usize) -> &str {
    let token_start = text[..start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let token_end = text[end..]
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric())
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[token_start..token_end]
}

#[async_trait]
impl QualityGate for ContentSafetyGate {
    fn name(&self) -> &str {
        names::CONTENT_SAFETY
    }

    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let matches = self.scan(&input.text, &input.language);
        if matches.is_empty() {
            return QualityGateResult::pass(names::CONTENT_SAFETY);
        }

        let mut categories: Vec<String> = Vec::new();
        for m in &matches {
            let category = m.category.to_string();
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        tracing::debug!(categories = ?categories, "content safety screen flagged input");
        QualityGateResult::fail(
            names::CONTENT_SAFETY,
            format!("unsafe content detected ({})", categories.join(", ")),
        )
        .with_details(serde_json::json!({
            "categories": categories,
            "matches": matches,
        }))
    }
}
