//! # pronounce-rs
//!
//! A Rust library for phoneme-level pronunciation assessment of spoken English.
//!
//! ## Features
//!
//! - **Word & phoneme alignment**: edit-distance alignment with similarity-aware
//!   substitution costs and deterministic backtracking
//! - **Tiered scoring**: recognized phonemes, G2P-approximated phonemes, or an
//!   ASR-confidence fallback, all behind one interface
//! - **L1 interference detection**: native-language confusion tables for common
//!   learner substitutions (Spanish, Mandarin, Japanese, ...)
//! - **Feedback synthesis**: ranked tips, audio-quality adjustment and
//!   longitudinal trend from an attempt-history store
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! pronounce-rs = { version = "2026.10" }
//! ```
//!
//! ```ignore
//! use pronounce_rs::{engines::pronunciation::{AssessmentRequest, PronunciationEngine}, PronunciationAssessor};
//!
//! let engine = PronunciationEngine::new();
//! let request = AssessmentRequest::from_transcript("think this", "tink dis")
//!     .with_native_language("spanish");
//!
//! let assessment = engine.assess(&request);
//! println!("{}", assessment.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engines;

use serde::{Deserialize, Serialize};

/// A diagnostic tag attached to a scored word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordIssue {
    /// The word was not heard at all.
    Missing,
    /// One or more expected phonemes were substituted or dropped.
    Mispronounced,
    /// The learner produced sounds that are not part of the word.
    ExtraSounds,
    /// The recognizer was unsure about this word.
    LowConfidence,
    /// A problem phoneme matches the learner's native-language confusion table.
    L1Interference,
}

/// Per-phoneme score in expected-sequence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeScore {
    pub phoneme: String,
    pub score: f64,
}

/// An expected phoneme paired with what was heard (or predicted) in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    pub expected: String,
    pub recognized: String,
}

/// Score for a single expected word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScore {
    pub word: String,
    /// Score in `[0, 100]`.
    pub score: f64,
    pub issues: Vec<WordIssue>,
    /// Problem phonemes in expected-sequence order. Duplicates are kept.
    pub problem_phonemes: Vec<String>,
    #[serde(default)]
    pub phoneme_scores: Vec<PhonemeScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
}

impl WordScore {
    pub fn has_issue(&self, issue: WordIssue) -> bool {
        self.issues.contains(&issue)
    }
}

/// A single piece of actionable feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic_notation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example_words: Vec<String>,
}

/// A native-language interference pattern found in the utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPattern {
    pub target_phoneme: String,
    pub substituted_phoneme: String,
    /// Confidence in `[0, 1]`, grows with the number of occurrences.
    pub confidence: f64,
    /// Up to three words where the target phoneme was a problem.
    pub example_words: Vec<String>,
}

/// The result of assessing one utterance.
///
/// Built fresh for every request; the caller owns it once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceAssessment {
    /// Overall score in `[0, 100]`, rounded to one decimal.
    pub overall_score: f64,
    /// Word scores in reference-phrase order.
    #[serde(rename = "orderedWordScores")]
    pub word_scores: Vec<WordScore>,
    /// At most three tips, most important first.
    pub ranked_tips: Vec<Tip>,
    pub detected_patterns: Vec<DetectedPattern>,
    /// True when the overall score was raised to compensate for poor audio.
    pub audio_quality_adjusted: bool,
    pub encouragement: String,
}

impl UtteranceAssessment {
    /// Serialize the assessment to its JSON output payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// All problem phonemes across the utterance, in word order.
    pub fn problem_phonemes(&self) -> impl Iterator<Item = &str> {
        self.word_scores
            .iter()
            .flat_map(|w| w.problem_phonemes.iter().map(String::as_str))
    }
}

/// Common interface for pronunciation assessment engines.
///
/// An assessment never fails: degraded inputs (missing words, unavailable
/// collaborators, unknown native language) still produce a complete
/// [`UtteranceAssessment`].
pub trait PronunciationAssessor {
    /// Per-request input (reference text, recognized words, learner context).
    type Request;

    /// Assess one utterance against its reference phrase.
    fn assess(&self, request: &Self::Request) -> UtteranceAssessment;

    /// Assess one utterance and serialize the result.
    ///
    /// Default implementation calls `assess()` then `UtteranceAssessment::to_json()`.
    fn assess_to_json(&self, request: &Self::Request) -> Result<String, serde_json::Error> {
        self.assess(request).to_json()
    }
}
