//! Regional language standard gate.
//!
//! The corpus teaches one regional standard per language. Spellings from other
//! regional variants are rejected. Languages without a configured standard
//! pass.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;

use crate::core::GateInput;
use crate::gates::{names, QualityGate, QualityGateResult, Tier};

/// (language, standard name, [(variant pattern, description)])
const STANDARDS: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "en",
        "US English",
        &[
            (
                r"(?i)\b(colour|flavour|favour|honour|labour|neighbour|behaviour|humour|harbour|rumour|vapour)(s|ed|ing|ite|ites|able)?\b",
                "British -our spelling",
            ),
            (
                r"(?i)\b(centre|theatre|metre|litre|fibre|calibre|sombre|spectre)s?\b",
                "British -re spelling",
            ),
            (
                r"(?i)\b(organ|real|recogn|apolog|critic|summar|memor|special|categor|priorit)is(e|ed|es|ing|ation|ations)\b",
                "British -ise spelling",
            ),
            (
                r"(?i)\b(analys|paralys|catalys)(e|ed|es|ing)\b",
                "British -yse spelling",
            ),
            (
                r"(?i)\b(travell|cancell|labell|modell|fuell|signall)(ed|ing|er|ers)\b",
                "British doubled consonant",
            ),
            (
                r"(?i)\b(defence|offence|licence|pretence|catalogue|dialogue|programme|cheque|grey|tyre|aluminium|jewellery)s?\b",
                "British spelling",
            ),
        ],
    ),
    (
        "pt",
        "Portuguese (1990 Orthographic Agreement)",
        &[
            (
                r"(?i)\b(ac[çc][ãa]o|direc[çc][ãa]o|colec[çc][ãa]o|correc[çc][ãa]o|protec[çc][ãa]o|selec[çc][ãa]o)(es|ões)?\b",
                "pre-agreement silent consonant",
            ),
            (
                r"(?i)\b([óo]ptim[oa]s?|actual|actualmente|exacto|exacta|baptismo|adopção)\b",
                "pre-agreement silent consonant",
            ),
            (r"(?i)\b(vôo|enjôo|crêem|lêem|vêem|dêem)\b", "pre-agreement circumflex"),
            (r"(?i)\b(idéia|assembléia|européia|heróico|jóia)s?\b", "pre-agreement acute accent"),
            (r"(?i)\w*ü\w*", "pre-agreement trema"),
        ],
    ),
];

struct Standard {
    name: &'static str,
    variants: Vec<(Regex, &'static str)>,
}

/// Rejects regional variants outside the configured standard.
pub struct LanguageStandardGate {
    standards: HashMap<&'static str, Standard>,
}

impl std::fmt::Debug for LanguageStandardGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.standards.keys().collect();
        languages.sort();
        f.debug_struct("LanguageStandardGate")
            .field("languages", &languages)
            .finish()
    }
}

impl Default for LanguageStandardGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageStandardGate {
    pub fn new() -> Self {
        let standards = STANDARDS
            .iter()
            .map(|(language, name, variants)| {
                let variants = variants
                    .iter()
                    .filter_map(|(pattern, description)| {
                        Regex::new(pattern).ok().map(|re| (re, *description))
                    })
                    .collect();
                (
                    *language,
                    Standard {
                        name: *name,
                        variants,
                    },
                )
            })
            .collect();
        Self { standards }
    }

    /// Name of the standard enforced for `language`, if any.
    pub fn standard_for(&self, language: &str) -> Option<&'static str> {
        self.standards.get(language).map(|s| s.name)
    }
}

#[async_trait]
impl QualityGate for LanguageStandardGate {
    fn name(&self) -> &str {
        names::LANGUAGE_STANDARD
    }

    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let Some(standard) = self.standards.get(input.language.as_str()) else {
            return QualityGateResult::pass(names::LANGUAGE_STANDARD).with_reason(format!(
                "no regional standard configured for '{}'",
                input.language
            ));
        };

        let mut issues = Vec::new();
        for (pattern, description) in &standard.variants {
            for m in pattern.find_iter(&input.text) {
                issues.push(format!("{}: '{}'", description, m.as_str()));
            }
        }

        if issues.is_empty() {
            return QualityGateResult::pass(names::LANGUAGE_STANDARD);
        }

        QualityGateResult::fail(
            names::LANGUAGE_STANDARD,
            format!("does not follow {}: {}", standard.name, issues.join("; ")),
        )
        .with_details(serde_json::json!({ "standard": standard.name, "issues": issues }))
    }
}
