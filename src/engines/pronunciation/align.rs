//! Edit-distance alignment with deterministic backtracking.
//!
//! Both aligners share one dynamic program. When several predecessors reach a
//! cell at the same minimal cost, the backtrace prefers the diagonal move
//! (match or substitute), then "expected item unmatched", then "extra
//! recognized item skipped".

use serde::{Deserialize, Serialize};

use crate::{PhonemeScore, Substitution};

use super::phonemes;

const EPSILON: f64 = 1e-9;

/// One step of an alignment, indices into the input sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOp {
    Match { expected: usize, recognized: usize },
    Substitute { expected: usize, recognized: usize, cost: f64 },
    /// Expected item with no recognized counterpart.
    Delete { expected: usize },
    /// Recognized item with no expected counterpart.
    Insert { recognized: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub distance: f64,
    pub ops: Vec<EditOp>,
}

/// Align two sequences. Insertions and deletions cost 1; substitutions cost
/// whatever `substitution_cost` returns (0 means a match).
pub fn align_by_cost<E, R, F>(expected: &[E], recognized: &[R], substitution_cost: F) -> Alignment
where
    F: Fn(&E, &R) -> f64,
{
    let m = expected.len();
    let n = recognized.len();

    let mut dp = vec![vec![0.0f64; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i as f64;
    }
    for j in 0..=n {
        dp[0][j] = j as f64;
    }

    for i in 1..=m {
        for j in 1..=n {
            let diagonal = dp[i - 1][j - 1] + substitution_cost(&expected[i - 1], &recognized[j - 1]);
            let unmatched = dp[i - 1][j] + 1.0;
            let skipped = dp[i][j - 1] + 1.0;
            dp[i][j] = diagonal.min(unmatched).min(skipped);
        }
    }

    let mut ops = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let cost = substitution_cost(&expected[i - 1], &recognized[j - 1]);
            if (dp[i - 1][j - 1] + cost - dp[i][j]).abs() < EPSILON {
                ops.push(if cost < EPSILON {
                    EditOp::Match {
                        expected: i - 1,
                        recognized: j - 1,
                    }
                } else {
                    EditOp::Substitute {
                        expected: i - 1,
                        recognized: j - 1,
                        cost,
                    }
                });
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && (dp[i - 1][j] + 1.0 - dp[i][j]).abs() < EPSILON {
            ops.push(EditOp::Delete { expected: i - 1 });
            i -= 1;
            continue;
        }
        ops.push(EditOp::Insert { recognized: j - 1 });
        j -= 1;
    }
    ops.reverse();

    Alignment {
        distance: dp[m][n],
        ops,
    }
}

/// Lowercase a token and strip surrounding punctuation. Inner apostrophes and
/// hyphens are kept ("don't", "well-known").
pub fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Split a phrase into normalized words, dropping punctuation-only tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word substitution cost: normalized character edit distance.
pub fn word_substitution_cost(a: &str, b: &str) -> f64 {
    if a == b {
        return 0.0;
    }
    1.0 - strsim::normalized_levenshtein(a, b)
}

/// An expected word and the recognized word aligned to it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPair {
    pub expected: String,
    pub expected_index: usize,
    pub recognized: Option<String>,
    pub recognized_index: Option<usize>,
}

/// Align reference words to recognized words.
///
/// Every expected word appears exactly once, in order. Extra recognized
/// words are dropped.
pub fn align_words<S: AsRef<str>, T: AsRef<str>>(expected: &[S], recognized: &[T]) -> Vec<AlignmentPair> {
    if expected.is_empty() {
        return Vec::new();
    }

    let alignment = align_by_cost(expected, recognized, |e, r| {
        word_substitution_cost(e.as_ref(), r.as_ref())
    });

    let mut pairs = Vec::with_capacity(expected.len());
    for op in alignment.ops {
        match op {
            EditOp::Match { expected: e, recognized: r }
            | EditOp::Substitute { expected: e, recognized: r, .. } => pairs.push(AlignmentPair {
                expected: expected[e].as_ref().to_string(),
                expected_index: e,
                recognized: Some(recognized[r].as_ref().to_string()),
                recognized_index: Some(r),
            }),
            EditOp::Delete { expected: e } => pairs.push(AlignmentPair {
                expected: expected[e].as_ref().to_string(),
                expected_index: e,
                recognized: None,
                recognized_index: None,
            }),
            EditOp::Insert { recognized: r } => {
                log::trace!("skipping extra recognized word {:?}", recognized[r].as_ref());
            }
        }
    }
    pairs
}

/// Result of aligning expected phonemes against recognized ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PhonemeAlignment {
    pub distance: f64,
    /// Substituted or missing expected phonemes, in expected order.
    pub problems: Vec<String>,
    pub substitutions: Vec<Substitution>,
    /// Recognized phonemes with no expected counterpart.
    pub insertions: usize,
    /// One entry per expected phoneme.
    pub phoneme_scores: Vec<PhonemeScore>,
}

/// Align phoneme sequences using similarity-aware substitution costs.
pub fn align_phonemes<S: AsRef<str>, T: AsRef<str>>(expected: &[S], recognized: &[T]) -> PhonemeAlignment {
    let alignment = align_by_cost(expected, recognized, |e, r| {
        phonemes::substitution_cost(e.as_ref(), r.as_ref())
    });

    let mut problems = Vec::new();
    let mut substitutions = Vec::new();
    let mut insertions = 0;
    let mut phoneme_scores = Vec::with_capacity(expected.len());

    for op in alignment.ops {
        match op {
            EditOp::Match { expected: e, .. } => phoneme_scores.push(PhonemeScore {
                phoneme: expected[e].as_ref().to_string(),
                score: 100.0,
            }),
            EditOp::Substitute {
                expected: e,
                recognized: r,
                cost,
            } => {
                let phoneme = expected[e].as_ref().to_string();
                problems.push(phoneme.clone());
                substitutions.push(Substitution {
                    expected: phoneme.clone(),
                    recognized: recognized[r].as_ref().to_string(),
                });
                phoneme_scores.push(PhonemeScore {
                    phoneme,
                    score: 100.0 * (1.0 - cost),
                });
            }
            EditOp::Delete { expected: e } => {
                let phoneme = expected[e].as_ref().to_string();
                problems.push(phoneme.clone());
                phoneme_scores.push(PhonemeScore { phoneme, score: 0.0 });
            }
            EditOp::Insert { .. } => insertions += 1,
        }
    }

    PhonemeAlignment {
        distance: alignment.distance,
        problems,
        substitutions,
        insertions,
        phoneme_scores,
    }
}
