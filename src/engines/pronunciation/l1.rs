use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DetectedPattern, WordScore};

use super::model::PronunciationError;

/// Occurrences needed for full pattern confidence.
const FULL_CONFIDENCE_COUNT: f64 = 3.0;

/// Maximum example words attached to a pattern.
const MAX_EXAMPLE_WORDS: usize = 3;

/// Commonly substituted phonemes for learners with one native language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct L1ConfusionTable {
    /// Canonical language name, e.g. `"spanish"`.
    pub language: String,
    /// Target phoneme -> substitutes, most likely first.
    pub confusions: BTreeMap<String, Vec<String>>,
}

impl L1ConfusionTable {
    pub fn contains(&self, phoneme: &str) -> bool {
        self.confusions.contains_key(phoneme)
    }

    pub fn substitutes(&self, phoneme: &str) -> Option<&[String]> {
        self.confusions.get(phoneme).map(Vec::as_slice)
    }

    pub fn most_likely_substitute(&self, phoneme: &str) -> Option<&str> {
        self.substitutes(phoneme)
            .and_then(|s| s.first())
            .map(String::as_str)
    }

    /// Language name for display ("spanish" -> "Spanish").
    pub fn display_name(&self) -> String {
        let mut chars = self.language.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Problem phonemes gathered across an utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemTally {
    counts: BTreeMap<String, usize>,
    /// Phonemes in order of first occurrence.
    order: Vec<String>,
    examples: BTreeMap<String, Vec<String>>,
    substitutions: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ProblemTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tally carrying only occurrence counts.
    pub fn from_counts(counts: &BTreeMap<String, usize>) -> Self {
        let mut tally = Self::new();
        for (phoneme, &count) in counts {
            if count == 0 {
                continue;
            }
            tally.order.push(phoneme.clone());
            tally.counts.insert(phoneme.clone(), count);
        }
        tally
    }

    pub fn from_word_scores(scores: &[WordScore]) -> Self {
        let mut tally = Self::new();
        for score in scores {
            for phoneme in &score.problem_phonemes {
                tally.record(phoneme, &score.word);
            }
            for sub in &score.substitutions {
                tally.record_substitution(&sub.expected, &sub.recognized);
            }
        }
        tally
    }

    pub fn record(&mut self, phoneme: &str, word: &str) {
        let count = self.counts.entry(phoneme.to_string()).or_insert(0);
        if *count == 0 {
            self.order.push(phoneme.to_string());
        }
        *count += 1;

        let examples = self.examples.entry(phoneme.to_string()).or_default();
        if examples.len() < MAX_EXAMPLE_WORDS && !examples.iter().any(|w| w == word) {
            examples.push(word.to_string());
        }
    }

    pub fn record_substitution(&mut self, expected: &str, recognized: &str) {
        *self
            .substitutions
            .entry(expected.to_string())
            .or_default()
            .entry(recognized.to_string())
            .or_insert(0) += 1;
    }

    pub fn count(&self, phoneme: &str) -> usize {
        self.counts.get(phoneme).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Phonemes by count descending, then first occurrence.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .order
            .iter()
            .map(|p| (p.as_str(), self.count(p)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn example_words(&self, phoneme: &str) -> &[String] {
        self.examples.get(phoneme).map(Vec::as_slice).unwrap_or(&[])
    }

    fn observed_substitutions(&self, phoneme: &str) -> Option<&BTreeMap<String, usize>> {
        self.substitutions.get(phoneme)
    }
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    aliases: Vec<String>,
    confusions: BTreeMap<String, Vec<String>>,
}

/// Native-language confusion tables, keyed by canonical language name.
///
/// Built once by the caller and shared read-only across requests.
#[derive(Debug, Clone, Default)]
pub struct L1Registry {
    tables: BTreeMap<String, L1ConfusionTable>,
    aliases: BTreeMap<String, String>,
}

impl L1Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in tables.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (language, aliases, confusions) in BUILTIN_TABLES {
            registry.insert(L1ConfusionTable {
                language: language.to_string(),
                confusions: confusions
                    .iter()
                    .map(|(target, subs)| {
                        (
                            target.to_string(),
                            subs.iter().map(|s| s.to_string()).collect(),
                        )
                    })
                    .collect(),
            });
            for alias in aliases.iter() {
                registry.add_alias(alias, language);
            }
        }
        registry
    }

    /// Built-in tables extended (or overridden) by a JSON file.
    ///
    /// The file maps language names to `{"aliases": [...], "confusions": {...}}`.
    pub fn load_json(path: &Path) -> Result<Self, PronunciationError> {
        let content = std::fs::read_to_string(path)?;
        let mut registry = Self::builtin();
        registry.merge_json_str(&content)?;
        log::info!(
            "Loaded L1 confusion tables from {} ({} languages)",
            path.display(),
            registry.tables.len()
        );
        Ok(registry)
    }

    pub fn merge_json_str(&mut self, json: &str) -> Result<(), PronunciationError> {
        let files: BTreeMap<String, TableFile> = serde_json::from_str(json)?;
        for (language, file) in files {
            let language = normalize_language(&language);
            if language.is_empty() {
                return Err(PronunciationError::ConfusionTable {
                    language,
                    reason: "empty language name".to_string(),
                });
            }
            if let Some((target, _)) = file.confusions.iter().find(|(_, subs)| subs.is_empty()) {
                return Err(PronunciationError::ConfusionTable {
                    language,
                    reason: format!("no substitutes listed for {target:?}"),
                });
            }
            self.insert(L1ConfusionTable {
                language: language.clone(),
                confusions: file.confusions,
            });
            for alias in &file.aliases {
                self.add_alias(alias, &language);
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, table: L1ConfusionTable) {
        let key = normalize_language(&table.language);
        self.tables.insert(key, table);
    }

    pub fn add_alias(&mut self, alias: &str, language: &str) {
        self.aliases
            .insert(normalize_language(alias), normalize_language(language));
    }

    /// Table for a language name or code, case-insensitive.
    pub fn table(&self, language: &str) -> Option<&L1ConfusionTable> {
        let key = normalize_language(language);
        self.tables.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|canonical| self.tables.get(canonical))
        })
    }

    pub fn languages(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Rank interference patterns from raw problem-phoneme counts.
    pub fn detect(
        &self,
        problem_counts: &BTreeMap<String, usize>,
        native_language: &str,
    ) -> Vec<DetectedPattern> {
        self.detect_from_tally(&ProblemTally::from_counts(problem_counts), native_language)
    }

    /// Rank interference patterns, using observed substitutions and example
    /// words when the tally carries them. Unsupported languages yield nothing.
    pub fn detect_from_tally(
        &self,
        tally: &ProblemTally,
        native_language: &str,
    ) -> Vec<DetectedPattern> {
        let Some(table) = self.table(native_language) else {
            log::debug!("No L1 confusion table for {native_language:?}");
            return Vec::new();
        };

        let mut patterns: Vec<DetectedPattern> = table
            .confusions
            .iter()
            .filter_map(|(target, substitutes)| {
                let count = tally.count(target);
                if count == 0 {
                    return None;
                }
                Some(DetectedPattern {
                    target_phoneme: target.clone(),
                    substituted_phoneme: pick_substitute(substitutes, tally.observed_substitutions(target)),
                    confidence: pattern_confidence(count),
                    example_words: tally.example_words(target).to_vec(),
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.target_phoneme.cmp(&b.target_phoneme))
        });
        patterns
    }
}

/// `min(1, count / 3)`.
pub fn pattern_confidence(count: usize) -> f64 {
    (count as f64 / FULL_CONFIDENCE_COUNT).min(1.0)
}

/// Most frequently observed listed substitute, table order breaking ties;
/// the table's first entry when nothing listed was observed.
fn pick_substitute(listed: &[String], observed: Option<&BTreeMap<String, usize>>) -> String {
    let best_observed = observed.and_then(|observed| {
        listed
            .iter()
            .filter_map(|s| observed.get(s).map(|&n| (s, n)))
            .fold(None, |best: Option<(&String, usize)>, (s, n)| match best {
                Some((_, best_n)) if best_n >= n => best,
                _ => Some((s, n)),
            })
    });

    best_observed
        .map(|(s, _)| s.clone())
        .or_else(|| listed.first().cloned())
        .unwrap_or_default()
}

fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase().replace('_', "-")
}

type BuiltinTable = (&'static str, &'static [&'static str], &'static [(&'static str, &'static [&'static str])]);

const BUILTIN_TABLES: &[BuiltinTable] = &[
    (
        "spanish",
        &["es", "es-es", "es-mx", "spa", "español", "espanol"],
        &[
            ("θ", &["t", "s"]),
            ("ð", &["d"]),
            ("v", &["b"]),
            ("z", &["s"]),
            ("ʃ", &["tʃ", "s"]),
            ("dʒ", &["j", "tʃ"]),
            ("ɪ", &["i"]),
            ("æ", &["ɑ", "ɛ"]),
            ("ʌ", &["ɑ"]),
            ("ʊ", &["u"]),
            ("ɹ", &["ɾ"]),
            ("h", &["x"]),
            ("ŋ", &["n"]),
        ],
    ),
    (
        "mandarin",
        &["zh", "zh-cn", "cmn", "chinese"],
        &[
            ("θ", &["s", "f"]),
            ("ð", &["d", "z"]),
            ("v", &["w", "f"]),
            ("ɹ", &["l"]),
            ("l", &["ɹ", "n"]),
            ("n", &["l"]),
            ("ɪ", &["i"]),
            ("æ", &["ɛ"]),
            ("ʒ", &["ʃ", "ɹ"]),
            ("z", &["s"]),
            ("ʃ", &["s"]),
        ],
    ),
    (
        "japanese",
        &["ja", "jp"],
        &[
            ("ɹ", &["l", "ɾ"]),
            ("l", &["ɹ", "ɾ"]),
            ("θ", &["s"]),
            ("ð", &["z", "d"]),
            ("v", &["b"]),
            ("f", &["h"]),
            ("ɪ", &["i"]),
            ("æ", &["ɑ"]),
            ("ʌ", &["ɑ"]),
            ("ɚ", &["ɑ"]),
            ("w", &["u"]),
        ],
    ),
    (
        "korean",
        &["ko"],
        &[
            ("f", &["p"]),
            ("v", &["b"]),
            ("z", &["dʒ"]),
            ("θ", &["s", "t"]),
            ("ð", &["d"]),
            ("ɹ", &["l"]),
            ("l", &["ɹ"]),
            ("ʒ", &["dʒ"]),
            ("ɪ", &["i"]),
            ("æ", &["ɛ"]),
        ],
    ),
    (
        "hindi",
        &["hi"],
        &[
            ("v", &["w"]),
            ("w", &["v"]),
            ("θ", &["t"]),
            ("ð", &["d"]),
            ("z", &["dʒ"]),
            ("ʒ", &["dʒ", "z"]),
            ("æ", &["ɛ"]),
            ("ɔ", &["ɑ"]),
            ("ʌ", &["ə"]),
        ],
    ),
    (
        "arabic",
        &["ar"],
        &[
            ("p", &["b"]),
            ("v", &["f"]),
            ("tʃ", &["ʃ"]),
            ("ɪ", &["i", "ɛ"]),
            ("ɛ", &["ɪ"]),
            ("ʊ", &["u"]),
            ("oʊ", &["ɔ"]),
            ("ŋ", &["n"]),
        ],
    ),
    (
        "portuguese",
        &["pt", "pt-br", "pt-pt", "brazilian portuguese"],
        &[
            ("θ", &["f", "t", "s"]),
            ("ð", &["d", "v"]),
            ("ɪ", &["i"]),
            ("æ", &["ɛ"]),
            ("ʊ", &["u"]),
            ("ɹ", &["h"]),
            ("h", &["ɹ"]),
            ("ŋ", &["n"]),
            ("tʃ", &["ʃ"]),
        ],
    ),
    (
        "french",
        &["fr", "fr-fr", "fr-ca"],
        &[
            ("θ", &["s", "z"]),
            ("ð", &["z"]),
            ("ɪ", &["i"]),
            ("ʊ", &["u"]),
            ("ɹ", &["ʁ"]),
            ("tʃ", &["ʃ"]),
            ("dʒ", &["ʒ"]),
            ("æ", &["ɛ"]),
        ],
    ),
    (
        "german",
        &["de", "de-de"],
        &[
            ("w", &["v"]),
            ("v", &["f"]),
            ("θ", &["s"]),
            ("ð", &["z", "d"]),
            ("z", &["s"]),
            ("dʒ", &["tʃ"]),
            ("æ", &["ɛ"]),
            ("ɹ", &["ʁ"]),
        ],
    ),
    (
        "russian",
        &["ru"],
        &[
            ("θ", &["s", "t"]),
            ("ð", &["z", "d"]),
            ("w", &["v"]),
            ("h", &["x"]),
            ("ɪ", &["i"]),
            ("æ", &["ɛ"]),
            ("ŋ", &["n"]),
        ],
    ),
    (
        "vietnamese",
        &["vi"],
        &[
            ("θ", &["t"]),
            ("ð", &["d", "z"]),
            ("ʃ", &["s"]),
            ("ʒ", &["z"]),
            ("l", &["n"]),
            ("ɹ", &["z"]),
            ("z", &["s"]),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, usize)]) -> BTreeMap<String, usize> {
        entries.iter().map(|(p, n)| (p.to_string(), *n)).collect()
    }

    #[test]
    fn resolves_names_and_codes_case_insensitively() {
        let registry = L1Registry::builtin();
        assert_eq!(registry.table("Spanish").map(|t| t.language.as_str()), Some("spanish"));
        assert_eq!(registry.table("es").map(|t| t.language.as_str()), Some("spanish"));
        assert_eq!(registry.table("zh_CN").map(|t| t.language.as_str()), Some("mandarin"));
        assert!(registry.table("klingon").is_none());
    }

    #[test]
    fn confidence_is_monotonic_and_capped() {
        let mut previous = 0.0;
        for count in 0..10 {
            let confidence = pattern_confidence(count);
            assert!(confidence >= previous);
            assert!(confidence <= 1.0);
            previous = confidence;
        }
        assert_eq!(pattern_confidence(3), 1.0);
        assert_eq!(pattern_confidence(7), 1.0);
    }

    #[test]
    fn patterns_sort_by_confidence_then_symbol() {
        let registry = L1Registry::builtin();
        let patterns = registry.detect(&counts(&[("ð", 1), ("θ", 1), ("v", 2), ("k", 5)]), "spanish");
        let targets: Vec<&str> = patterns.iter().map(|p| p.target_phoneme.as_str()).collect();
        assert_eq!(targets, vec!["v", "ð", "θ"]);
        assert!((patterns[0].confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(patterns[0].substituted_phoneme, "b");
    }

    #[test]
    fn unknown_language_yields_no_patterns() {
        let registry = L1Registry::builtin();
        assert!(registry.detect(&counts(&[("θ", 3)]), "klingon").is_empty());
    }

    #[test]
    fn observed_substitution_wins_over_table_order() {
        let registry = L1Registry::builtin();
        let mut tally = ProblemTally::new();
        tally.record("θ", "think");
        tally.record("θ", "three");
        tally.record_substitution("θ", "s");
        tally.record_substitution("θ", "s");
        tally.record_substitution("θ", "t");

        let patterns = registry.detect_from_tally(&tally, "es");
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].substituted_phoneme, "s");
        assert_eq!(patterns[0].example_words, vec!["think", "three"]);
    }

    #[test]
    fn example_words_are_distinct_and_capped() {
        let mut tally = ProblemTally::new();
        for word in ["this", "this", "that", "the", "then"] {
            tally.record("ð", word);
        }
        assert_eq!(tally.count("ð"), 5);
        assert_eq!(tally.example_words("ð"), &["this", "that", "the"]);
    }

    #[test]
    fn tally_ranks_by_count_then_first_occurrence() {
        let mut tally = ProblemTally::new();
        tally.record("v", "very");
        tally.record("ɔ", "water");
        tally.record("ɚ", "water");
        tally.record("ɚ", "butter");
        assert_eq!(tally.ranked(), vec![("ɚ", 2), ("v", 1), ("ɔ", 1)]);
    }

    #[test]
    fn json_tables_extend_the_builtin_set() {
        let mut registry = L1Registry::builtin();
        registry
            .merge_json_str(r#"{"Turkish": {"aliases": ["tr"], "confusions": {"w": ["v"], "θ": ["t"]}}}"#)
            .expect("valid table");
        let table = registry.table("tr").expect("alias registered");
        assert_eq!(table.most_likely_substitute("w"), Some("v"));
        assert_eq!(table.display_name(), "Turkish");
        assert!(registry.table("spanish").is_some());
    }

    #[test]
    fn json_tables_reject_empty_substitute_lists() {
        let mut registry = L1Registry::empty();
        let err = registry
            .merge_json_str(r#"{"turkish": {"confusions": {"w": []}}}"#)
            .unwrap_err();
        assert!(matches!(err, PronunciationError::ConfusionTable { .. }));
    }
}
