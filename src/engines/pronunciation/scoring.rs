use crate::{PhonemeScore, Substitution, WordIssue, WordScore};

use super::align::align_phonemes;
use super::l1::L1ConfusionTable;
use super::phonemes::{self, Difficulty};

/// Floor for hard phonemes in the confidence fallback.
const HARD_PHONEME_FLOOR: f64 = 50.0;
const HARD_PHONEME_PENALTY: f64 = 10.0;

/// L1 penalty applies only below this per-phoneme score.
const L1_PENALTY_BELOW: f64 = 85.0;
const L1_PHONEME_FLOOR: f64 = 40.0;
const L1_PHONEME_PENALTY: f64 = 15.0;

/// Clamp to `[0, 100]` and round to one decimal.
pub fn round_score(score: f64) -> f64 {
    ((score * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

/// Score one word.
///
/// With a recognized phoneme sequence the score comes from alignment:
/// `100 * max(0, 1 - distance / max(m, n))`. Without one, the ASR confidence
/// is spread over the expected phonemes, lowered for hard phonemes and for
/// phonemes the learner's native language commonly replaces.
pub fn score_word(
    word: &str,
    expected: &[String],
    recognized: Option<&[String]>,
    asr_confidence: f64,
    confusions: Option<&L1ConfusionTable>,
) -> WordScore {
    match recognized {
        Some(recognized) => score_alignment(word, expected, recognized),
        None => score_from_confidence(word, expected, asr_confidence, confusions),
    }
}

/// A word that was not heard at all.
pub fn score_missing(word: &str, expected: &[String]) -> WordScore {
    WordScore {
        word: word.to_string(),
        score: 0.0,
        issues: vec![WordIssue::Missing],
        problem_phonemes: expected.to_vec(),
        phoneme_scores: zero_scores(expected),
        substitutions: Vec::new(),
    }
}

fn zero_scores(expected: &[String]) -> Vec<PhonemeScore> {
    expected
        .iter()
        .map(|p| PhonemeScore {
            phoneme: p.clone(),
            score: 0.0,
        })
        .collect()
}

fn score_alignment(word: &str, expected: &[String], recognized: &[String]) -> WordScore {
    if expected.is_empty() {
        return WordScore {
            word: word.to_string(),
            score: 100.0,
            issues: Vec::new(),
            problem_phonemes: Vec::new(),
            phoneme_scores: Vec::new(),
            substitutions: Vec::new(),
        };
    }

    if recognized.is_empty() {
        return WordScore {
            word: word.to_string(),
            score: 0.0,
            issues: vec![WordIssue::Mispronounced],
            problem_phonemes: expected.to_vec(),
            phoneme_scores: zero_scores(expected),
            substitutions: Vec::new(),
        };
    }

    let alignment = align_phonemes(expected, recognized);
    let longest = expected.len().max(recognized.len()) as f64;
    let score = 100.0 * (1.0 - alignment.distance / longest).max(0.0);

    let mut issues = Vec::new();
    if !alignment.problems.is_empty() {
        issues.push(WordIssue::Mispronounced);
    }
    if alignment.insertions > 0 {
        issues.push(WordIssue::ExtraSounds);
    }

    WordScore {
        word: word.to_string(),
        score: round_score(score),
        issues,
        problem_phonemes: alignment.problems,
        phoneme_scores: alignment.phoneme_scores,
        substitutions: alignment.substitutions,
    }
}

fn score_from_confidence(
    word: &str,
    expected: &[String],
    asr_confidence: f64,
    confusions: Option<&L1ConfusionTable>,
) -> WordScore {
    let confidence_score = asr_confidence.clamp(0.0, 1.0) * 100.0;

    let mut problem_phonemes = Vec::new();
    let mut substitutions = Vec::new();
    let mut phoneme_scores = Vec::with_capacity(expected.len());

    for phoneme in expected {
        let mut base = confidence_score;
        if phonemes::difficulty(phoneme) == Difficulty::Hard {
            base = (base - HARD_PHONEME_PENALTY).max(HARD_PHONEME_FLOOR);
        }
        if let Some(substitute) = confusions.and_then(|t| t.most_likely_substitute(phoneme)) {
            if base < L1_PENALTY_BELOW {
                base = (base - L1_PHONEME_PENALTY).max(L1_PHONEME_FLOOR);
                problem_phonemes.push(phoneme.clone());
                substitutions.push(Substitution {
                    expected: phoneme.clone(),
                    recognized: substitute.to_string(),
                });
            }
        }
        phoneme_scores.push(PhonemeScore {
            phoneme: phoneme.clone(),
            score: base,
        });
    }

    let score = if phoneme_scores.is_empty() {
        confidence_score
    } else {
        phoneme_scores.iter().map(|p| p.score).sum::<f64>() / phoneme_scores.len() as f64
    };

    let issues = if problem_phonemes.is_empty() {
        Vec::new()
    } else {
        vec![WordIssue::L1Interference]
    };

    WordScore {
        word: word.to_string(),
        score: round_score(score),
        issues,
        problem_phonemes,
        phoneme_scores,
        substitutions,
    }
}
