//! Orthography gate.
//!
//! Each supported language has a whitelist character class (its alphabet plus
//! shared punctuation) and a cross-contamination blacklist of diacritics that
//! belong to other languages. Unknown languages pass with a note.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;

use crate::core::GateInput;
use crate::gates::{names, QualityGate, QualityGateResult, Tier};

/// Punctuation, digits and whitespace allowed in every language.
/// Exercise blanks are written as runs of underscores.
const COMMON: &str = r#"0-9\s.,;:!?'’“”«»()_"/%…\-"#;

/// (language, extra alphabet characters, foreign marks, foreign-mark label)
const ALPHABETS: &[(&str, &str, &str, &str)] = &[
    ("en", "", "", ""),
    (
        "es",
        "áéíóúüñÁÉÍÓÚÜÑ¿¡",
        "àèìòùâêîôûçœæßäöãõÀÈÌÒÙÂÊÎÔÛÇŒÆÄÖÃÕ",
        "French, German or Portuguese",
    ),
    (
        "fr",
        "àâæçéèêëîïôœùûüÿÀÂÆÇÉÈÊËÎÏÔŒÙÛÜŸ",
        "ñáíóúäößãõ¿¡ÑÁÍÓÚÄÖÃÕ",
        "Spanish, German or Portuguese",
    ),
    (
        "de",
        "äöüßÄÖÜẞ",
        "ñáéíóúàèìòùâêîôûçœãõ¿¡ÑÁÉÍÓÚÀÈÌÒÙÂÊÎÔÛÇŒÃÕ",
        "Spanish, French or Portuguese",
    ),
    (
        "it",
        "àèéìíîòóùúÀÈÉÌÍÎÒÓÙÚ",
        "ñäöüßçœâêôûãõ¿¡ÑÄÖÜÇŒÂÊÔÛÃÕ",
        "Spanish, German, French or Portuguese",
    ),
    (
        "pt",
        "áâãàçéêíóôõúüÁÂÃÀÇÉÊÍÓÔÕÚÜ",
        "ñäößèìòùîûœ¿¡ÑÄÖÈÌÒÙÎÛŒ",
        "Spanish, German or French",
    ),
];

struct Alphabet {
    /// Matches a single character outside the language's alphabet.
    outside: Regex,
    /// Matches a single diacritic belonging to another language.
    foreign: Option<(Regex, &'static str)>,
}

/// Checks that text only uses its language's writing system.
pub struct OrthographyGate {
    alphabets: HashMap<&'static str, Alphabet>,
}

impl std::fmt::Debug for OrthographyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.alphabets.keys().collect();
        languages.sort();
        f.debug_struct("OrthographyGate")
            .field("languages", &languages)
            .finish()
    }
}

impl Default for OrthographyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OrthographyGate {
    pub fn new() -> Self {
        let mut alphabets = HashMap::new();
        for (language, extra, foreign, label) in ALPHABETS {
            let outside = Regex::new(&format!("[^a-zA-Z{}{}]", extra, COMMON));
            let foreign = if foreign.is_empty() {
                None
            } else {
                Regex::new(&format!("[{}]", foreign))
                    .ok()
                    .map(|re| (re, *label))
            };
            if let Ok(outside) = outside {
                alphabets.insert(*language, Alphabet { outside, foreign });
            }
        }
        Self { alphabets }
    }

    /// Languages this gate knows.
    pub fn supports(&self, language: &str) -> bool {
        self.alphabets.contains_key(language)
    }
}

fn distinct_matches(re: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().to_string();
        if !found.contains(&s) {
            found.push(s);
        }
    }
    found
}

#[async_trait]
impl QualityGate for OrthographyGate {
    fn name(&self) -> &str {
        names::ORTHOGRAPHY
    }

    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn check(&self, input: &GateInput) -> QualityGateResult {
        let Some(alphabet) = self.alphabets.get(input.language.as_str()) else {
            return QualityGateResult::pass(names::ORTHOGRAPHY).with_reason(format!(
                "no orthography rules for language '{}'",
                input.language
            ));
        };

        let mut issues = Vec::new();

        if let Some((foreign, label)) = &alphabet.foreign {
            let marks = distinct_matches(foreign, &input.text);
            if !marks.is_empty() {
                issues.push(format!(
                    "characters from {} found in '{}' text: {}",
                    label,
                    input.language,
                    marks.join(" ")
                ));
            }
        }

        let outside: Vec<String> = distinct_matches(&alphabet.outside, &input.text)
            .into_iter()
            .filter(|c| {
                alphabet
                    .foreign
                    .as_ref()
                    .map(|(re, _)| !re.is_match(c))
                    .unwrap_or(true)
            })
            .collect();
        if !outside.is_empty() {
            issues.push(format!(
                "characters outside the '{}' alphabet: {}",
                input.language,
                outside.join(" ")
            ));
        }

        QualityGateResult::from_issues(names::ORTHOGRAPHY, "Orthography violations", issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContentType;

    async fn check(text: &str, language: &str) -> QualityGateResult {
        OrthographyGate::new()
            .check(&GateInput::new(text, language, ContentType::Sentence))
            .await
    }

    #[test]
    fn test_every_alphabet_compiles() {
        let gate = OrthographyGate::new();
        for (language, ..) in ALPHABETS {
            assert!(gate.supports(language), "{}", language);
        }
    }

    #[tokio::test]
    async fn test_spanish_text_passes() {
        assert!(check("¿Dónde está el niño?", "es").await.passed);
    }

    #[tokio::test]
    async fn test_french_accent_in_spanish_fails() {
        let result = check("el café crème", "es").await;
        assert!(!result.passed);
        let reason = result.reason.unwrap();
        assert!(reason.contains("French"));
        assert!(reason.contains('è'));
        assert!(!reason.contains("outside"));
    }

    #[tokio::test]
    async fn test_german_eszett_in_french_fails() {
        let result = check("la straße", "fr").await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains('ß'));
    }

    #[tokio::test]
    async fn test_english_rejects_any_diacritic() {
        let result = check("naïve café", "en").await;
        assert!(!result.passed);
        let issues = result.details.unwrap()["issues"].clone();
        assert_eq!(issues.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_latin_script_fails() {
        let result = check("привет", "de").await;
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("outside the 'de' alphabet"));
    }

    #[tokio::test]
    async fn test_exercise_blank_passes() {
        let result = OrthographyGate::new()
            .check(&GateInput::new("Yo ___ español.", "es", ContentType::Exercise))
            .await;
        assert!(result.passed, "{:?}", result.reason);
    }

    #[tokio::test]
    async fn test_shared_punctuation_passes() {
        assert!(check("Ella dijo \"hola\".", "es").await.passed);
        assert!(check("50% off, and/or more…", "en").await.passed);
    }

    #[tokio::test]
    async fn test_unknown_language_passes_with_note() {
        let result = check("こんにちは", "ja").await;
        assert!(result.passed);
        assert!(result.reason.unwrap().contains("'ja'"));
    }
}
