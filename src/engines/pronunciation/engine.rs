use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "espeak")]
use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{PronunciationAssessor, UtteranceAssessment};

use super::align::{align_words, normalize_word, tokenize};
use super::feedback::FeedbackSynthesizer;
use super::g2p::{G2pBridge, G2pConverter};
#[cfg(feature = "espeak")]
use super::g2p::{EspeakConfig, EspeakConverter};
use super::history::{AttemptHistory, AttemptRecord};
use super::l1::{L1Registry, ProblemTally};
use super::model::{PronunciationError, WordScorer};
use super::tips::TipLibrary;

/// Audio-quality verdict from the upstream audio analyser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AudioQuality {
    Good,
    Fair,
    Poor,
    /// Missing or unrecognized verdict; treated as neutral.
    #[default]
    Unknown,
}

impl AudioQuality {
    /// Parse a verdict label leniently. Anything unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "good" => Self::Good,
            "fair" => Self::Fair,
            "poor" => Self::Poor,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for AudioQuality {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// Audio-quality verdict plus the signal-to-noise estimate it was based on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioReport {
    #[serde(default)]
    pub quality: AudioQuality,
    #[serde(default)]
    pub snr_db: Option<f32>,
}

impl AudioReport {
    pub fn new(quality: AudioQuality) -> Self {
        Self {
            quality,
            snr_db: None,
        }
    }
}

/// One word as reported by the speech recognizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedWord {
    pub text: String,
    /// Recognizer confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub start_ms: Option<u64>,
    #[serde(default)]
    pub end_ms: Option<u64>,
    /// IPA symbols, when the recognizer emits a phoneme lattice.
    #[serde(default)]
    pub phonemes: Option<Vec<String>>,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_span(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.start_ms = Some(start_ms);
        self.end_ms = Some(end_ms);
        self
    }
}

/// Tunable thresholds for scoring and feedback.
///
/// Every field has a default; a JSON config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct AssessmentConfig {
    /// Words scoring below this get word-specific tips.
    pub low_score_threshold: f64,
    /// Minimum pattern confidence for an L1 tip.
    pub pattern_tip_min_confidence: f64,
    pub max_tips: usize,
    /// Added to the overall score when the audio was poor.
    pub poor_audio_bonus: f64,
    /// Overall score needed for the positive-reinforcement tip.
    pub positive_reinforcement_min: f64,
    /// History records needed before a trend is reported.
    pub trend_min_records: usize,
    /// Records per trend window (recent vs. preceding).
    pub trend_window: usize,
    /// Improvement, in points, that earns a trend clause.
    pub trend_min_delta: f64,
    /// Per-word budget for the external G2P converter.
    pub g2p_timeout_ms: u64,
    /// Exact matches at or above this confidence are trusted outright.
    pub trust_confidence_above: f64,
    /// Words below this confidence are tagged `low_confidence`.
    pub low_confidence_below: f64,
    /// Score words on separate threads.
    pub parallel_scoring: bool,
    /// Append an attempt record when a learner id and history store are present.
    pub record_attempts: bool,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            low_score_threshold: 70.0,
            pattern_tip_min_confidence: 0.3,
            max_tips: 3,
            poor_audio_bonus: 5.0,
            positive_reinforcement_min: 90.0,
            trend_min_records: 6,
            trend_window: 5,
            trend_min_delta: 5.0,
            g2p_timeout_ms: 200,
            trust_confidence_above: 0.9,
            low_confidence_below: 0.6,
            parallel_scoring: true,
            record_attempts: true,
        }
    }
}

impl AssessmentConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PronunciationError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        log::info!("Loaded assessment config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, PronunciationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PronunciationError> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PronunciationError::Config(format!("{name} must be in [0, 1], got {value}")))
            }
        };
        let percent = |name: &str, value: f64| {
            if (0.0..=100.0).contains(&value) {
                Ok(())
            } else {
                Err(PronunciationError::Config(format!("{name} must be in [0, 100], got {value}")))
            }
        };

        percent("low_score_threshold", self.low_score_threshold)?;
        percent("poor_audio_bonus", self.poor_audio_bonus)?;
        percent("positive_reinforcement_min", self.positive_reinforcement_min)?;
        unit("pattern_tip_min_confidence", self.pattern_tip_min_confidence)?;
        unit("trust_confidence_above", self.trust_confidence_above)?;
        unit("low_confidence_below", self.low_confidence_below)?;

        if self.trend_window == 0 {
            return Err(PronunciationError::Config("trend_window must be at least 1".to_string()));
        }
        if self.trend_min_records <= self.trend_window {
            return Err(PronunciationError::Config(format!(
                "trend_min_records ({}) must exceed trend_window ({})",
                self.trend_min_records, self.trend_window
            )));
        }
        Ok(())
    }

    pub fn g2p_timeout(&self) -> Duration {
        Duration::from_millis(self.g2p_timeout_ms)
    }
}

impl AssessmentConfigBuilder {
    /// Validates the config `build` would produce; unset fields take their defaults.
    fn validate(&self) -> Result<(), String> {
        let defaults = AssessmentConfig::default();
        let candidate = AssessmentConfig {
            low_score_threshold: self.low_score_threshold.unwrap_or(defaults.low_score_threshold),
            pattern_tip_min_confidence: self
                .pattern_tip_min_confidence
                .unwrap_or(defaults.pattern_tip_min_confidence),
            max_tips: self.max_tips.unwrap_or(defaults.max_tips),
            poor_audio_bonus: self.poor_audio_bonus.unwrap_or(defaults.poor_audio_bonus),
            positive_reinforcement_min: self
                .positive_reinforcement_min
                .unwrap_or(defaults.positive_reinforcement_min),
            trend_min_records: self.trend_min_records.unwrap_or(defaults.trend_min_records),
            trend_window: self.trend_window.unwrap_or(defaults.trend_window),
            trend_min_delta: self.trend_min_delta.unwrap_or(defaults.trend_min_delta),
            g2p_timeout_ms: self.g2p_timeout_ms.unwrap_or(defaults.g2p_timeout_ms),
            trust_confidence_above: self
                .trust_confidence_above
                .unwrap_or(defaults.trust_confidence_above),
            low_confidence_below: self.low_confidence_below.unwrap_or(defaults.low_confidence_below),
            parallel_scoring: self.parallel_scoring.unwrap_or(defaults.parallel_scoring),
            record_attempts: self.record_attempts.unwrap_or(defaults.record_attempts),
        };
        candidate.validate().map_err(|e| e.to_string())
    }
}

/// Input for one assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), default)]
pub struct AssessmentRequest {
    pub reference_text: String,
    #[serde(default)]
    pub recognized: Vec<RecognizedWord>,
    /// Learner's native language, as a name or code (`"spanish"`, `"es"`).
    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub native_language: Option<String>,
    #[serde(default)]
    pub audio: AudioReport,
    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub learner_id: Option<String>,
}

impl AssessmentRequest {
    /// A request from a plain transcript, one recognized word per token and
    /// no confidences.
    pub fn from_transcript(reference_text: impl Into<String>, transcript: &str) -> Self {
        Self {
            reference_text: reference_text.into(),
            recognized: transcript.split_whitespace().map(RecognizedWord::new).collect(),
            ..Default::default()
        }
    }

    pub fn with_native_language(mut self, language: impl Into<String>) -> Self {
        self.native_language = Some(language.into());
        self
    }

    pub fn with_audio(mut self, audio: AudioReport) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_learner(mut self, learner_id: impl Into<String>) -> Self {
        self.learner_id = Some(learner_id.into());
        self
    }
}

/// Pronunciation assessment engine.
///
/// Holds read-only configuration and content; a single engine can serve any
/// number of concurrent requests.
///
/// # Quick Start
///
/// ```rust,no_run
/// use pronounce_rs::{PronunciationAssessor, engines::pronunciation::{AssessmentRequest, PronunciationEngine}};
///
/// let engine = PronunciationEngine::new();
/// let request = AssessmentRequest::from_transcript("very water", "wery wata");
/// let assessment = engine.assess(&request);
/// println!("overall: {}", assessment.overall_score);
/// ```
///
/// # With espeak-ng
///
/// ```rust,no_run
/// use pronounce_rs::engines::pronunciation::PronunciationEngine;
/// use std::path::PathBuf;
///
/// // Point to a bundled espeak-ng binary and data directory
/// let engine = PronunciationEngine::with_espeak(
///     Some(PathBuf::from("/app/resources/espeak-ng/espeak-ng")),
///     Some(PathBuf::from("/app/resources/espeak-ng-data")),
/// );
/// ```
pub struct PronunciationEngine {
    config: AssessmentConfig,
    g2p: G2pBridge,
    l1: L1Registry,
    tips: TipLibrary,
    history: Option<Arc<dyn AttemptHistory>>,
}

impl Default for PronunciationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PronunciationEngine {
    /// Engine with default config, built-in tables and the fallback G2P only.
    pub fn new() -> Self {
        Self {
            config: AssessmentConfig::default(),
            g2p: G2pBridge::fallback_only(),
            l1: L1Registry::builtin(),
            tips: TipLibrary::builtin(),
            history: None,
        }
    }

    /// Engine that converts reference words with espeak-ng.
    ///
    /// Either path can be `None` to use the system default.
    #[cfg(feature = "espeak")]
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        let converter = EspeakConverter::with_config(EspeakConfig { bin_path, data_path });
        Self::new().with_g2p_converter(Arc::new(converter))
    }

    /// Replaces the config. Fails without changing the engine when `config`
    /// does not validate.
    pub fn with_config(mut self, config: AssessmentConfig) -> Result<Self, PronunciationError> {
        config.validate()?;
        self.g2p = self.g2p.with_timeout(config.g2p_timeout());
        self.config = config;
        Ok(self)
    }

    pub fn with_g2p_converter(mut self, converter: Arc<dyn G2pConverter>) -> Self {
        self.g2p = G2pBridge::with_converter(converter, self.config.g2p_timeout());
        self
    }

    pub fn with_l1_registry(mut self, registry: L1Registry) -> Self {
        self.l1 = registry;
        self
    }

    pub fn with_tip_library(mut self, tips: TipLibrary) -> Self {
        self.tips = tips;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn AttemptHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    pub fn l1_registry(&self) -> &L1Registry {
        &self.l1
    }

    fn recent_history(&self, learner_id: &str) -> Option<Vec<AttemptRecord>> {
        let history = self.history.as_ref()?;
        match history.query_recent(learner_id, self.config.trend_window * 2) {
            Ok(records) => Some(records),
            Err(e) => {
                log::warn!("Attempt history unavailable for {learner_id:?}, skipping trend: {e}");
                None
            }
        }
    }

    fn record_attempt(&self, learner_id: &str, phrase: &str, assessment: &UtteranceAssessment) {
        let Some(history) = &self.history else {
            return;
        };
        let record = AttemptRecord::from_assessment(learner_id, phrase, assessment);
        if let Err(e) = history.append(record) {
            log::warn!("Failed to record attempt for {learner_id:?}: {e}");
        }
    }
}

impl PronunciationAssessor for PronunciationEngine {
    type Request = AssessmentRequest;

    fn assess(&self, request: &AssessmentRequest) -> UtteranceAssessment {
        let expected = tokenize(&request.reference_text);
        let heard: Vec<&RecognizedWord> = request
            .recognized
            .iter()
            .filter(|w| !normalize_word(&w.text).is_empty())
            .collect();
        let heard_texts: Vec<String> = heard.iter().map(|w| normalize_word(&w.text)).collect();

        let pairs = align_words(&expected, &heard_texts);
        log::debug!(
            "Aligned {} expected words against {} recognized",
            expected.len(),
            heard_texts.len()
        );

        let confusions = request.native_language.as_deref().and_then(|language| {
            let table = self.l1.table(language);
            if table.is_none() {
                log::debug!("Unsupported native language {language:?}, skipping L1 analysis");
            }
            table
        });

        let scorer = WordScorer {
            g2p: &self.g2p,
            confusions,
            config: &self.config,
        };
        let word_scores = scorer.score_all(&pairs, &heard);

        let detected_patterns = match confusions {
            Some(table) => self
                .l1
                .detect_from_tally(&ProblemTally::from_word_scores(&word_scores), &table.language),
            None => Vec::new(),
        };

        let history = request
            .learner_id
            .as_deref()
            .and_then(|learner| self.recent_history(learner));

        let mut synthesizer = FeedbackSynthesizer::new(&self.config, &self.tips);
        if let Some(table) = confusions {
            synthesizer = synthesizer.with_native_language(table.display_name());
        }
        let assessment = synthesizer.synthesize(
            word_scores,
            detected_patterns,
            request.audio.quality,
            history.as_deref(),
        );

        if self.config.record_attempts {
            if let Some(learner) = request.learner_id.as_deref() {
                self.record_attempt(learner, &request.reference_text, &assessment);
            }
        }

        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::pronunciation::history::InMemoryHistory;
    use crate::engines::pronunciation::model::HistoryError;
    use crate::WordIssue;

    struct UnavailableHistory;

    impl AttemptHistory for UnavailableHistory {
        fn append(&self, _record: AttemptRecord) -> Result<(), HistoryError> {
            Err(HistoryError::Unavailable("offline".to_string()))
        }
        fn query_recent(&self, _learner_id: &str, _n: usize) -> Result<Vec<AttemptRecord>, HistoryError> {
            Err(HistoryError::Unavailable("offline".to_string()))
        }
    }

    fn past(score: f64, timestamp_ms: u64) -> AttemptRecord {
        AttemptRecord {
            learner_id: "ana".to_string(),
            phrase: "hello".to_string(),
            phoneme_scores: Default::default(),
            overall_score: score,
            timestamp_ms,
        }
    }

    #[test]
    fn identical_input_scores_full_marks() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript(
            "Good morning, how are you?",
            "good morning how are you",
        ));
        assert_eq!(assessment.overall_score, 100.0);
        assert_eq!(assessment.problem_phonemes().count(), 0);
        assert_eq!(assessment.word_scores.len(), 5);
    }

    #[test]
    fn scenario_spanish_th_stopping() {
        let engine = PronunciationEngine::new();
        let request = AssessmentRequest::from_transcript("think this", "tink dis").with_native_language("spanish");
        let assessment = engine.assess(&request);

        let problems: Vec<&str> = assessment.problem_phonemes().collect();
        assert!(problems.contains(&"θ"));
        assert!(problems.contains(&"ð"));
        assert!(assessment.overall_score > 0.0 && assessment.overall_score < 100.0);

        for target in ["θ", "ð"] {
            let pattern = assessment
                .detected_patterns
                .iter()
                .find(|p| p.target_phoneme == target)
                .unwrap_or_else(|| panic!("no pattern for {target}"));
            assert!((pattern.confidence - 1.0 / 3.0).abs() < 0.01);
        }
        assert!(!assessment.ranked_tips.is_empty());
        assert!(assessment.ranked_tips.len() <= 3);
        assert!(assessment.ranked_tips[0].text.contains("Speakers of Spanish"));
    }

    #[test]
    fn scenario_clean_single_word() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript("hello", "hello"));
        assert_eq!(assessment.overall_score, 100.0);
        assert_eq!(assessment.problem_phonemes().count(), 0);
        assert_eq!(assessment.ranked_tips.len(), 1);
        assert_eq!(assessment.ranked_tips[0].text, TipLibrary::builtin().positive_message());
    }

    #[test]
    fn scenario_v_w_without_native_language() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript("very water", "wery wata"));
        assert!(assessment.detected_patterns.is_empty());
        assert!(assessment
            .ranked_tips
            .iter()
            .any(|t| t.phonetic_notation.as_deref().is_some_and(|n| n.contains("/v/"))));
    }

    #[test]
    fn scenario_poor_audio_lifts_only_overall() {
        let engine = PronunciationEngine::new();
        let base = AssessmentRequest::from_transcript("very water", "wery wata");
        let good = engine.assess(&base.clone().with_audio(AudioReport::new(AudioQuality::Good)));
        let poor = engine.assess(&base.with_audio(AudioReport::new(AudioQuality::Poor)));

        assert!(!good.audio_quality_adjusted);
        assert!(poor.audio_quality_adjusted);
        assert_eq!(poor.overall_score, round1((good.overall_score + 5.0).min(100.0)));
        assert_eq!(poor.word_scores, good.word_scores);
    }

    fn round1(x: f64) -> f64 {
        (x * 10.0).round() / 10.0
    }

    #[test]
    fn scenario_nothing_heard() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript("good morning", ""));
        assert_eq!(assessment.overall_score, 0.0);
        assert_eq!(assessment.word_scores.len(), 2);
        assert!(assessment.word_scores.iter().all(|w| w.has_issue(WordIssue::Missing)));
    }

    #[test]
    fn unknown_audio_label_is_neutral() {
        assert_eq!(AudioQuality::from_label(" POOR "), AudioQuality::Poor);
        assert_eq!(AudioQuality::from_label("crackly"), AudioQuality::Unknown);

        let report: AudioReport = serde_json::from_str(r#"{"quality": "muffled", "snrDb": 3.5}"#).unwrap();
        assert_eq!(report.quality, AudioQuality::Unknown);

        let engine = PronunciationEngine::new();
        let request = AssessmentRequest::from_transcript("hello", "hello").with_audio(report);
        assert!(!engine.assess(&request).audio_quality_adjusted);
    }

    #[test]
    fn empty_reference_is_neutral() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript("", "anything at all"));
        assert!(assessment.word_scores.is_empty());
        assert_eq!(assessment.overall_score, 50.0);
    }

    #[test]
    fn unsupported_native_language_still_scores() {
        let engine = PronunciationEngine::new();
        let request = AssessmentRequest::from_transcript("think this", "tink dis").with_native_language("klingon");
        let assessment = engine.assess(&request);
        assert!(assessment.detected_patterns.is_empty());
        assert!(assessment.overall_score < 100.0);
        assert!(!assessment.ranked_tips.is_empty());
    }

    #[test]
    fn repeated_assessment_is_byte_identical() {
        let engine = PronunciationEngine::new();
        let request = AssessmentRequest::from_transcript(
            "the three brothers thought about the weather",
            "de tree broders tot about weder weder",
        )
        .with_native_language("es");

        let first = engine.assess_to_json(&request).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.assess_to_json(&request).unwrap(), first);
        }
    }

    #[test]
    fn scores_stay_in_bounds() {
        let engine = PronunciationEngine::new();
        let cases = [
            ("strength", "s"),
            ("a", "extraordinarily long unrelated utterance"),
            ("I think that is very good", "ai sink zat is wery goot goot"),
            ("hello", "!!! ???"),
        ];
        for (reference, transcript) in cases {
            let assessment = engine.assess(&AssessmentRequest::from_transcript(reference, transcript));
            assert!((0.0..=100.0).contains(&assessment.overall_score));
            for word in &assessment.word_scores {
                assert!((0.0..=100.0).contains(&word.score), "{reference}: {word:?}");
            }
        }
    }

    #[test]
    fn low_scoring_word_yields_a_tip() {
        let engine = PronunciationEngine::new();
        let assessment = engine.assess(&AssessmentRequest::from_transcript("water", "wata"));
        assert!(assessment.word_scores[0].score < 70.0);
        assert!(assessment.ranked_tips.iter().any(|t| t.example_words == vec!["water"]));
    }

    #[test]
    fn uncertain_easy_word_still_yields_a_tip() {
        let engine = PronunciationEngine::new();
        let request = AssessmentRequestBuilder::default()
            .reference_text("bed")
            .recognized(vec![RecognizedWord::new("bed").with_confidence(0.3)])
            .build()
            .unwrap();
        let assessment = engine.assess(&request);
        assert!(assessment.word_scores[0].score < 70.0);
        assert!(!assessment.ranked_tips.is_empty());
    }

    #[test]
    fn confidence_tier_applies_to_uncertain_exact_matches() {
        let engine = PronunciationEngine::new();
        let request = AssessmentRequestBuilder::default()
            .reference_text("think")
            .recognized(vec![RecognizedWord::new("think").with_confidence(0.5)])
            .native_language("spanish")
            .build()
            .unwrap();
        let assessment = engine.assess(&request);
        let word = &assessment.word_scores[0];
        assert!(word.score < 60.0);
        assert!(word.has_issue(WordIssue::LowConfidence));
        assert!(word.has_issue(WordIssue::L1Interference));
    }

    #[test]
    fn attempts_are_recorded_and_trend_reported() {
        let mut records: Vec<AttemptRecord> = (1..=5).map(|t| past(60.0, t)).collect();
        records.extend((6..=10).map(|t| past(80.0, t)));
        let history = Arc::new(InMemoryHistory::with_records(records));
        let engine = PronunciationEngine::new().with_history(history.clone());

        let request = AssessmentRequest::from_transcript("hello", "hello").with_learner("ana");
        let assessment = engine.assess(&request);

        assert!(assessment.encouragement.contains("33%"), "{}", assessment.encouragement);
        assert_eq!(history.len(), 11);
        assert_eq!(history.query_recent("ana", 1).unwrap()[0].overall_score, 100.0);
    }

    #[test]
    fn recording_can_be_disabled() {
        let history = Arc::new(InMemoryHistory::new());
        let config = AssessmentConfigBuilder::default().record_attempts(false).build().unwrap();
        let engine = PronunciationEngine::new().with_config(config).unwrap().with_history(history.clone());

        engine.assess(&AssessmentRequest::from_transcript("hello", "hello").with_learner("ana"));
        assert!(history.is_empty());
    }

    #[test]
    fn unavailable_history_degrades_gracefully() {
        let engine = PronunciationEngine::new().with_history(Arc::new(UnavailableHistory));
        let request = AssessmentRequest::from_transcript("hello", "hello").with_learner("ana");
        let assessment = engine.assess(&request);
        assert_eq!(assessment.overall_score, 100.0);
        assert!(!assessment.encouragement.is_empty());
    }

    #[test]
    fn config_builder_keeps_unset_defaults() {
        let config = AssessmentConfigBuilder::default().max_tips(2usize).build().unwrap();
        assert_eq!(config.max_tips, 2);
        assert_eq!(config.low_score_threshold, 70.0);
        assert_eq!(config.g2p_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn config_builder_rejects_invalid_combinations() {
        // Default trend_window is 5, so 3 records can never form two windows.
        let err = AssessmentConfigBuilder::default().trend_min_records(3usize).build().unwrap_err();
        assert!(err.to_string().contains("trend_min_records"));

        assert!(AssessmentConfigBuilder::default().low_score_threshold(140.0).build().is_err());
    }

    #[test]
    fn with_config_rejects_invalid_config() {
        let config = AssessmentConfig {
            trend_window: 0,
            ..AssessmentConfig::default()
        };
        let err = PronunciationEngine::new().with_config(config).err().unwrap();
        assert!(matches!(err, PronunciationError::Config(_)));
    }

    #[test]
    fn config_json_fills_defaults_and_validates() {
        let config = AssessmentConfig::from_json_str(r#"{"low_score_threshold": 60.0}"#).unwrap();
        assert_eq!(config.low_score_threshold, 60.0);
        assert_eq!(config.trend_window, 5);

        let err = AssessmentConfig::from_json_str(r#"{"trust_confidence_above": 1.5}"#).unwrap_err();
        assert!(matches!(err, PronunciationError::Config(_)));
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assessment.json");
        std::fs::write(&path, r#"{"max_tips": 1, "parallel_scoring": false}"#).unwrap();

        let config = AssessmentConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_tips, 1);
        assert!(!config.parallel_scoring);
    }

    #[test]
    fn request_deserializes_from_camel_case_payload() {
        let request: AssessmentRequest = serde_json::from_str(
            r#"{
                "referenceText": "think",
                "recognized": [{"text": "tink", "confidence": 0.8, "startMs": 0, "endMs": 420}],
                "nativeLanguage": "es",
                "audio": {"quality": "fair", "snrDb": 12.0}
            }"#,
        )
        .unwrap();
        assert_eq!(request.recognized[0].end_ms, Some(420));
        assert_eq!(request.audio.quality, AudioQuality::Fair);
        assert!(request.learner_id.is_none());
    }
}
