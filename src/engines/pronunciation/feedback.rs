use crate::{DetectedPattern, Tip, UtteranceAssessment, WordScore};

use super::engine::{AssessmentConfig, AudioQuality};
use super::history::AttemptRecord;
use super::l1::ProblemTally;
use super::phonemes::{self, Difficulty};
use super::scoring::round_score;
use super::tips::TipLibrary;

/// Overall score for an utterance with no words to score.
pub const NEUTRAL_SCORE: f64 = 50.0;

const NOISE_NOTE: &str = "We adjusted your score slightly for background noise.";

/// Recent attempts compared with the window before them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub recent_mean: f64,
    pub previous_mean: f64,
}

impl Trend {
    pub fn delta(&self) -> f64 {
        self.recent_mean - self.previous_mean
    }

    /// Improvement relative to the earlier window, when it had a nonzero mean.
    pub fn percent(&self) -> Option<f64> {
        (self.previous_mean > 0.0).then(|| self.delta() / self.previous_mean * 100.0)
    }

    fn clause(&self) -> String {
        match self.percent() {
            Some(percent) => format!("You've improved {percent:.0}% over your recent attempts!"),
            None => format!("You're up {:.0} points over your recent attempts!", self.delta()),
        }
    }
}

/// Merges word scores and detected patterns into an [`UtteranceAssessment`].
pub struct FeedbackSynthesizer<'a> {
    config: &'a AssessmentConfig,
    tips: &'a TipLibrary,
    /// Display name used in pattern tips, e.g. "Spanish".
    native_language: Option<String>,
}

impl<'a> FeedbackSynthesizer<'a> {
    pub fn new(config: &'a AssessmentConfig, tips: &'a TipLibrary) -> Self {
        Self {
            config,
            tips,
            native_language: None,
        }
    }

    pub fn with_native_language(mut self, display_name: impl Into<String>) -> Self {
        self.native_language = Some(display_name.into());
        self
    }

    /// Build the assessment.
    ///
    /// `history` is the learner's recent records, most recent first. Poor
    /// audio raises only the overall score; word scores pass through as given.
    pub fn synthesize(
        &self,
        word_scores: Vec<WordScore>,
        detected_patterns: Vec<DetectedPattern>,
        audio: AudioQuality,
        history: Option<&[AttemptRecord]>,
    ) -> UtteranceAssessment {
        let raw = overall_score(&word_scores);
        let audio_quality_adjusted = audio == AudioQuality::Poor;
        let overall_score = if audio_quality_adjusted {
            let adjusted = round_score((raw + self.config.poor_audio_bonus).min(100.0));
            log::debug!("Poor audio: overall {raw} -> {adjusted}");
            adjusted
        } else {
            raw
        };

        let ranked_tips = self.rank_tips(&word_scores, &detected_patterns, overall_score);
        let trend = history.and_then(|h| self.trend(h));
        let encouragement = encouragement(overall_score, audio_quality_adjusted, trend);

        UtteranceAssessment {
            overall_score,
            word_scores,
            ranked_tips,
            detected_patterns,
            audio_quality_adjusted,
            encouragement,
        }
    }

    /// Tips in priority order: L1 patterns, word-specific advice, then
    /// generic phoneme guidance. A lone positive tip when nothing applies and
    /// the score is high.
    fn rank_tips(&self, word_scores: &[WordScore], patterns: &[DetectedPattern], overall: f64) -> Vec<Tip> {
        let tally = ProblemTally::from_word_scores(word_scores);
        let mut covered: Vec<&str> = Vec::new();
        let mut tips: Vec<Tip> = Vec::new();

        for pattern in patterns
            .iter()
            .filter(|p| p.confidence >= self.config.pattern_tip_min_confidence)
        {
            push_unique(&mut tips, self.pattern_tip(pattern));
            covered.push(&pattern.target_phoneme);
        }

        for score in word_scores
            .iter()
            .filter(|w| w.score < self.config.low_score_threshold)
        {
            if let Some(tip) = self.tips.word_tip(&score.word) {
                push_unique(
                    &mut tips,
                    Tip {
                        text: format!("{} Try it in a sentence: \"{}\"", tip.tip, tip.example),
                        phonetic_notation: Some(tip.phonetic.clone()),
                        example_words: vec![score.word.clone()],
                    },
                );
            }
        }

        for phoneme in self.weak_phonemes(word_scores, &tally) {
            if covered.contains(&phoneme) {
                continue;
            }
            if let Some(tip) = self.tips.phoneme_tip(phoneme) {
                let seen = tally.example_words(phoneme);
                push_unique(
                    &mut tips,
                    Tip {
                        text: tip.guidance.clone(),
                        phonetic_notation: Some(tip.phonetic.clone()),
                        example_words: if seen.is_empty() { tip.examples.clone() } else { seen.to_vec() },
                    },
                );
                covered.push(phoneme);
            }
        }

        if tips.is_empty() && overall >= self.config.positive_reinforcement_min {
            tips.push(Tip {
                text: self.tips.positive_message().to_string(),
                phonetic_notation: None,
                example_words: Vec::new(),
            });
        }

        tips.truncate(self.config.max_tips);
        tips
    }

    fn pattern_tip(&self, pattern: &DetectedPattern) -> Tip {
        let speakers = match &self.native_language {
            Some(language) => format!("Speakers of {language}"),
            None => "Many learners".to_string(),
        };
        let substitution = format!(
            "{speakers} often say /{}/ instead of /{}/.",
            pattern.substituted_phoneme, pattern.target_phoneme
        );

        match self.tips.phoneme_tip(&pattern.target_phoneme) {
            Some(tip) => Tip {
                text: format!("{substitution} {}", tip.guidance),
                phonetic_notation: Some(tip.phonetic.clone()),
                example_words: pattern.example_words.clone(),
            },
            None => Tip {
                text: substitution,
                phonetic_notation: Some(format!(
                    "/{}/ vs /{}/",
                    pattern.target_phoneme, pattern.substituted_phoneme
                )),
                example_words: pattern.example_words.clone(),
            },
        }
    }

    /// Problem phonemes by frequency, then the hard phonemes of low-scoring
    /// words, then the weakest phoneme with tip content in each low-scoring word.
    fn weak_phonemes<'s>(&self, word_scores: &'s [WordScore], tally: &'s ProblemTally) -> Vec<&'s str> {
        let mut weak: Vec<&str> = tally.ranked().into_iter().map(|(p, _)| p).collect();
        let low: Vec<&WordScore> = word_scores
            .iter()
            .filter(|w| w.score < self.config.low_score_threshold)
            .collect();

        let hard = low
            .iter()
            .copied()
            .flat_map(|w| w.phoneme_scores.iter())
            .map(|p| p.phoneme.as_str())
            .filter(|p| phonemes::difficulty(p) == Difficulty::Hard);
        for phoneme in hard {
            if !weak.contains(&phoneme) {
                weak.push(phoneme);
            }
        }

        // First of equally low scores wins.
        let weakest = low.iter().copied().filter_map(|w| {
            w.phoneme_scores
                .iter()
                .filter(|p| self.tips.phoneme_tip(&p.phoneme).is_some())
                .min_by(|a, b| a.score.total_cmp(&b.score))
                .map(|p| p.phoneme.as_str())
        });
        for phoneme in weakest {
            if !weak.contains(&phoneme) {
                weak.push(phoneme);
            }
        }
        weak
    }

    /// Improvement over the learner's earlier attempts, when large enough to mention.
    pub fn trend(&self, history: &[AttemptRecord]) -> Option<Trend> {
        let window = self.config.trend_window;
        if window == 0 || history.len() < self.config.trend_min_records {
            return None;
        }

        let recent = &history[..window.min(history.len())];
        let previous = &history[recent.len()..(window * 2).min(history.len())];
        if previous.is_empty() {
            return None;
        }

        let trend = Trend {
            recent_mean: mean_overall(recent),
            previous_mean: mean_overall(previous),
        };
        log::debug!(
            "Trend: recent {:.1} vs previous {:.1}",
            trend.recent_mean,
            trend.previous_mean
        );
        (trend.delta() > self.config.trend_min_delta).then_some(trend)
    }
}

/// Mean word score rounded to one decimal, or [`NEUTRAL_SCORE`] for no words.
pub fn overall_score(word_scores: &[WordScore]) -> f64 {
    if word_scores.is_empty() {
        return NEUTRAL_SCORE;
    }
    let sum: f64 = word_scores.iter().map(|w| w.score).sum();
    round_score(sum / word_scores.len() as f64)
}

fn mean_overall(records: &[AttemptRecord]) -> f64 {
    records.iter().map(|r| r.overall_score).sum::<f64>() / records.len() as f64
}

fn push_unique(tips: &mut Vec<Tip>, tip: Tip) {
    if !tips.iter().any(|t| t.text == tip.text) {
        tips.push(tip);
    }
}

fn encouragement(overall: f64, adjusted: bool, trend: Option<Trend>) -> String {
    let mut message = if overall >= 90.0 {
        "Excellent pronunciation! Your speech was clear and easy to understand."
    } else if overall >= 75.0 {
        "Good job! A little more practice on the highlighted sounds will make it even clearer."
    } else if overall >= 50.0 {
        "Nice effort. Work through the tips below and try the phrase again."
    } else {
        "Keep practicing! Slow down and focus on one sound at a time."
    }
    .to_string();

    if adjusted {
        message.push(' ');
        message.push_str(NOISE_NOTE);
    }
    if let Some(trend) = trend {
        message.push(' ');
        message.push_str(&trend.clause());
    }
    message
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::engines::pronunciation::engine::AssessmentConfigBuilder;
    use crate::{PhonemeScore, WordIssue};

    fn word(text: &str, score: f64, problems: &[&str]) -> WordScore {
        WordScore {
            word: text.to_string(),
            score,
            issues: if problems.is_empty() { vec![] } else { vec![WordIssue::Mispronounced] },
            problem_phonemes: problems.iter().map(|p| p.to_string()).collect(),
            phoneme_scores: problems
                .iter()
                .map(|p| PhonemeScore { phoneme: p.to_string(), score: 0.0 })
                .collect(),
            substitutions: vec![],
        }
    }

    fn record(score: f64) -> AttemptRecord {
        AttemptRecord {
            learner_id: "ana".to_string(),
            phrase: "hello".to_string(),
            phoneme_scores: BTreeMap::new(),
            overall_score: score,
            timestamp_ms: 0,
        }
    }

    /// Most recent first: `recent` repeated five times, then `previous` five times.
    fn history(recent: f64, previous: f64) -> Vec<AttemptRecord> {
        let mut records = vec![record(recent); 5];
        records.extend(vec![record(previous); 5]);
        records
    }

    #[test]
    fn overall_is_rounded_mean_or_neutral() {
        assert_eq!(overall_score(&[]), NEUTRAL_SCORE);
        assert_eq!(
            overall_score(&[word("a", 75.0, &[]), word("b", 66.6, &[])]),
            70.8
        );
    }

    #[test]
    fn poor_audio_adds_five_without_touching_words() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let synthesizer = FeedbackSynthesizer::new(&config, &tips);
        let words = vec![word("good", 50.0, &["ʊ"]), word("morning", 70.0, &[])];

        let assessment = synthesizer.synthesize(words.clone(), vec![], AudioQuality::Poor, None);
        assert_eq!(assessment.overall_score, 65.0);
        assert!(assessment.audio_quality_adjusted);
        assert_eq!(assessment.word_scores, words);
        assert!(assessment.encouragement.contains(NOISE_NOTE));
    }

    #[test]
    fn poor_audio_is_capped_at_one_hundred() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let assessment = FeedbackSynthesizer::new(&config, &tips).synthesize(
            vec![word("hello", 98.0, &[])],
            vec![],
            AudioQuality::Poor,
            None,
        );
        assert_eq!(assessment.overall_score, 100.0);
    }

    #[test]
    fn fair_and_unknown_audio_are_neutral() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let synthesizer = FeedbackSynthesizer::new(&config, &tips);
        for audio in [AudioQuality::Good, AudioQuality::Fair, AudioQuality::Unknown] {
            let assessment = synthesizer.synthesize(vec![word("hello", 60.0, &[])], vec![], audio, None);
            assert_eq!(assessment.overall_score, 60.0);
            assert!(!assessment.audio_quality_adjusted);
        }
    }

    #[test]
    fn pattern_tips_come_first_and_name_the_language() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let synthesizer = FeedbackSynthesizer::new(&config, &tips).with_native_language("Spanish");
        let patterns = vec![DetectedPattern {
            target_phoneme: "θ".to_string(),
            substituted_phoneme: "t".to_string(),
            confidence: 1.0 / 3.0,
            example_words: vec!["think".to_string()],
        }];

        let assessment = synthesizer.synthesize(
            vec![word("think", 75.0, &["θ"])],
            patterns,
            AudioQuality::Good,
            None,
        );
        let first = &assessment.ranked_tips[0];
        assert!(first.text.starts_with("Speakers of Spanish often say /t/ instead of /θ/."));
        assert_eq!(first.example_words, vec!["think"]);
        // θ is covered by the pattern tip; no generic θ tip follows.
        assert_eq!(assessment.ranked_tips.len(), 1);
    }

    #[test]
    fn weak_patterns_are_skipped() {
        let config = AssessmentConfigBuilder::default()
            .pattern_tip_min_confidence(0.5)
            .build()
            .unwrap();
        let tips = TipLibrary::empty();
        let patterns = vec![DetectedPattern {
            target_phoneme: "v".to_string(),
            substituted_phoneme: "b".to_string(),
            confidence: 1.0 / 3.0,
            example_words: vec![],
        }];
        let assessment = FeedbackSynthesizer::new(&config, &tips).synthesize(
            vec![word("very", 80.0, &["v"])],
            patterns,
            AudioQuality::Good,
            None,
        );
        assert!(assessment.ranked_tips.is_empty());
    }

    #[test]
    fn word_tips_follow_for_low_scores() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let assessment = FeedbackSynthesizer::new(&config, &tips).synthesize(
            vec![word("water", 62.5, &["ɔ", "ɚ"])],
            vec![],
            AudioQuality::Good,
            None,
        );
        let first = &assessment.ranked_tips[0];
        assert_eq!(first.example_words, vec!["water"]);
        assert!(first.text.contains("Can I have a glass of water?"));
        assert_eq!(first.phonetic_notation.as_deref(), Some("/ˈwɔ.tɚ/"));
    }

    #[test]
    fn tips_are_capped_and_distinct() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let words = vec![
            word("think", 20.0, &["θ", "ɪ"]),
            word("this", 20.0, &["ð", "ɪ"]),
            word("very", 20.0, &["v", "ɛ", "ɹ"]),
            word("water", 20.0, &["w", "ɔ", "ɚ"]),
        ];
        let assessment =
            FeedbackSynthesizer::new(&config, &tips).synthesize(words, vec![], AudioQuality::Good, None);
        assert_eq!(assessment.ranked_tips.len(), 3);
        let mut texts: Vec<&str> = assessment.ranked_tips.iter().map(|t| t.text.as_str()).collect();
        texts.dedup();
        assert_eq!(texts.len(), 3);
    }

    #[test]
    fn generic_tips_rank_frequent_phonemes_first() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let words = vec![word("van", 80.0, &["æ"]), word("vine", 80.0, &["v"]), word("vote", 80.0, &["v"])];
        let assessment =
            FeedbackSynthesizer::new(&config, &tips).synthesize(words, vec![], AudioQuality::Good, None);
        let v = tips.phoneme_tip("v").unwrap();
        assert_eq!(assessment.ranked_tips[0].text, v.guidance);
        assert_eq!(assessment.ranked_tips[0].example_words, vec!["vine", "vote"]);
    }

    #[test]
    fn positive_tip_only_when_nothing_else_applies() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let synthesizer = FeedbackSynthesizer::new(&config, &tips);

        let clean = synthesizer.synthesize(vec![word("hello", 100.0, &[])], vec![], AudioQuality::Good, None);
        assert_eq!(clean.ranked_tips.len(), 1);
        assert_eq!(clean.ranked_tips[0].text, tips.positive_message());

        let middling = synthesizer.synthesize(vec![word("hello", 85.0, &[])], vec![], AudioQuality::Good, None);
        assert!(middling.ranked_tips.is_empty());
    }

    #[test]
    fn trend_needs_enough_history_and_a_real_gain() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let synthesizer = FeedbackSynthesizer::new(&config, &tips);

        let improved = synthesizer.trend(&history(80.0, 60.0)).unwrap();
        assert_eq!(improved.delta(), 20.0);
        assert!((improved.percent().unwrap() - 33.333).abs() < 0.01);

        assert!(synthesizer.trend(&history(80.0, 60.0)[..5]).is_none());
        assert!(synthesizer.trend(&history(65.0, 60.0)).is_none());
        assert!(synthesizer.trend(&history(60.0, 80.0)).is_none());

        // Six records: five recent against a single earlier one.
        let six = &history(90.0, 70.0)[..6];
        assert_eq!(synthesizer.trend(six).map(|t| t.previous_mean), Some(70.0));
    }

    #[test]
    fn trend_clause_is_appended_to_encouragement() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let records = history(80.0, 60.0);
        let assessment = FeedbackSynthesizer::new(&config, &tips).synthesize(
            vec![word("hello", 100.0, &[])],
            vec![],
            AudioQuality::Good,
            Some(&records),
        );
        assert!(assessment.encouragement.starts_with("Excellent"));
        assert!(assessment.encouragement.ends_with("You've improved 33% over your recent attempts!"));
    }

    #[test]
    fn trend_from_zero_reports_points() {
        let trend = Trend { recent_mean: 40.0, previous_mean: 0.0 };
        assert_eq!(trend.percent(), None);
        assert!(trend.clause().contains("40 points"));
    }

    #[test]
    fn encouragement_bands() {
        assert!(encouragement(95.0, false, None).starts_with("Excellent"));
        assert!(encouragement(80.0, false, None).starts_with("Good job"));
        assert!(encouragement(55.0, false, None).starts_with("Nice effort"));
        assert!(encouragement(10.0, false, None).starts_with("Keep practicing"));
    }

    #[test]
    fn low_word_without_problems_still_gets_a_phoneme_tip() {
        let config = AssessmentConfig::default();
        let tips = TipLibrary::builtin();
        let bed = WordScore {
            word: "bed".to_string(),
            score: 30.0,
            issues: vec![WordIssue::LowConfidence],
            problem_phonemes: vec![],
            phoneme_scores: ["b", "ɛ", "d"]
                .iter()
                .map(|p| PhonemeScore { phoneme: p.to_string(), score: 30.0 })
                .collect(),
            substitutions: vec![],
        };

        let assessment =
            FeedbackSynthesizer::new(&config, &tips).synthesize(vec![bed], vec![], AudioQuality::Good, None);
        assert!(!assessment.ranked_tips.is_empty());
        assert!(assessment
            .ranked_tips
            .iter()
            .any(|t| t.text == tips.phoneme_tip("ɛ").unwrap().guidance));
    }
}
