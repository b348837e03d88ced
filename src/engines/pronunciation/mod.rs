//! Phoneme-level pronunciation assessment engine.
//!
//! This module scores a learner's utterance against a reference phrase. The
//! recognizer output (words, optional confidences, optional phonemes) is
//! aligned to the reference word by word, each word is scored at the phoneme
//! level, recurring problem phonemes are matched against the learner's
//! native-language confusion table, and everything is merged into a single
//! [`UtteranceAssessment`](crate::UtteranceAssessment) with ranked tips.
//!
//! # Pipeline
//!
//! ```text
//! reference text ──► tokenize ──┐
//!                               ├─► align_words ──► WordScorer (per word, parallel)
//! recognized words ─────────────┘                      │
//!                                                      ├─► L1Registry::detect_from_tally
//!                                                      └─► FeedbackSynthesizer ──► UtteranceAssessment
//! ```
//!
//! # Scoring Tiers
//!
//! | Input for the word | Scored by |
//! |---|---|
//! | Recognizer supplied phonemes | Phoneme alignment against the reference phonemes |
//! | Exact text match, confidence below 0.9 | Confidence fallback with hard-phoneme and L1 penalties |
//! | Anything else heard | Phoneme alignment against G2P of the recognized text |
//! | Nothing heard | Score 0, every phoneme flagged |
//!
//! # System Requirements
//!
//! With the `espeak` feature, reference words can be converted by
//! **espeak-ng**. It is optional; the built-in dictionary and spelling rules
//! are used whenever it is missing, slow or fails:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use pronounce_rs::{PronunciationAssessor, engines::pronunciation::{AssessmentRequest, PronunciationEngine}};
//!
//! let engine = PronunciationEngine::new();
//! let request = AssessmentRequest::from_transcript("think this", "tink dis")
//!     .with_native_language("spanish");
//!
//! let assessment = engine.assess(&request);
//! for tip in &assessment.ranked_tips {
//!     println!("{}", tip.text);
//! }
//! ```
//!
//! ## With Custom Config and History
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pronounce_rs::{PronunciationAssessor, engines::pronunciation::{
//!     AssessmentConfigBuilder, AssessmentRequest, JsonlHistory, PronunciationEngine,
//! }};
//!
//! let config = AssessmentConfigBuilder::default()
//!     .low_score_threshold(75.0)
//!     .build()?;
//!
//! let engine = PronunciationEngine::new()
//!     .with_config(config)?
//!     .with_history(Arc::new(JsonlHistory::new("data/attempts.jsonl")));
//!
//! let request = AssessmentRequest::from_transcript("good morning", "good mornin")
//!     .with_learner("learner-42");
//! println!("{}", engine.assess_to_json(&request)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod align;
pub mod engine;
pub mod feedback;
pub mod g2p;
pub mod history;
pub mod l1;
pub mod model;
pub mod phonemes;
pub mod scoring;
pub mod tips;

pub use engine::{
    AssessmentConfig, AssessmentConfigBuilder, AssessmentRequest, AssessmentRequestBuilder,
    AudioQuality, AudioReport, PronunciationEngine, RecognizedWord,
};
pub use feedback::FeedbackSynthesizer;
pub use g2p::{G2pBridge, G2pConverter};
#[cfg(feature = "espeak")]
pub use g2p::{EspeakConfig, EspeakConverter};
pub use history::{AttemptHistory, AttemptRecord, InMemoryHistory, JsonlHistory};
pub use l1::{L1ConfusionTable, L1Registry};
pub use model::{G2pError, HistoryError, PronunciationError};
pub use tips::TipLibrary;
