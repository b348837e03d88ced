use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use crate::{WordIssue, WordScore};

use super::align::{normalize_word, AlignmentPair};
use super::engine::{AssessmentConfig, RecognizedWord};
use super::g2p::G2pBridge;
use super::l1::L1ConfusionTable;
use super::phonemes;
use super::scoring::{score_missing, score_word};

#[derive(thiserror::Error, Debug)]
pub enum PronunciationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Invalid confusion table for '{language}': {reason}")]
    ConfusionTable { language: String, reason: String },
    #[error("Invalid tip library: {0}")]
    Tips(String),
    #[error("G2P error: {0}")]
    G2p(#[from] G2pError),
    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

#[derive(thiserror::Error, Debug)]
pub enum G2pError {
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Conversion failed: {0}")]
    Failed(String),
    #[error("{converter} did not answer within {timeout:?}")]
    Timeout {
        converter: &'static str,
        timeout: Duration,
    },
    #[error("{0} worker stopped without answering")]
    Disconnected(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("History store unavailable: {0}")]
    Unavailable(String),
}

/// Shared, read-only inputs for scoring the words of one utterance.
pub(crate) struct WordScorer<'a> {
    pub g2p: &'a G2pBridge,
    pub confusions: Option<&'a L1ConfusionTable>,
    pub config: &'a AssessmentConfig,
}

impl WordScorer<'_> {
    /// Score every aligned pair, in expected-word order.
    ///
    /// Words are split into contiguous chunks over at most
    /// `available_parallelism()` workers; chunk results are concatenated in
    /// input order regardless of completion order. A worker that cannot be
    /// spawned has its chunk scored on the calling thread.
    pub fn score_all(&self, pairs: &[AlignmentPair], heard: &[&RecognizedWord]) -> Vec<WordScore> {
        let workers = if self.config.parallel_scoring {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
                .min(pairs.len())
        } else {
            1
        };

        if workers < 2 {
            return self.score_chunk(pairs, heard);
        }

        let chunk_size = pairs.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = pairs
                .chunks(chunk_size)
                .map(|chunk| {
                    let spawned = thread::Builder::new()
                        .name("word-scorer".to_string())
                        .spawn_scoped(scope, move || self.score_chunk(chunk, heard));
                    (chunk, spawned)
                })
                .collect();

            let mut scores = Vec::with_capacity(pairs.len());
            for (chunk, spawned) in handles {
                let chunk_scores = match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        log::error!("Word scorer panicked, scoring {} words as missing", chunk.len());
                        chunk.iter().map(|pair| score_missing(&pair.expected, &[])).collect()
                    }),
                    Err(e) => {
                        log::warn!("Could not spawn word scorer, scoring inline: {e}");
                        self.score_chunk(chunk, heard)
                    }
                };
                scores.extend(chunk_scores);
            }
            scores
        })
    }

    fn score_chunk(&self, pairs: &[AlignmentPair], heard: &[&RecognizedWord]) -> Vec<WordScore> {
        pairs
            .iter()
            .map(|pair| {
                let recognized = pair.recognized_index.and_then(|i| heard.get(i).copied());
                self.score_pair(pair, recognized)
            })
            .collect()
    }

    /// Pick a scoring tier for one word.
    ///
    /// 1. Phonemes supplied by the recognizer are aligned directly.
    /// 2. A recognized word whose text matches the reference but came with a
    ///    low confidence is scored from that confidence.
    /// 3. Any other exact match is aligned against the reference phonemes.
    /// 4. Otherwise the recognized text is converted with the G2P bridge and
    ///    aligned as an approximation of what was said.
    pub fn score_pair(&self, pair: &AlignmentPair, recognized: Option<&RecognizedWord>) -> WordScore {
        let expected = self.g2p.to_phonemes(&pair.expected);

        let Some(heard) = recognized else {
            log::debug!("{:?}: not heard", pair.expected);
            return score_missing(&pair.expected, &expected);
        };

        let confidence = heard.confidence.map(|c| f64::from(c).clamp(0.0, 1.0));
        let exact = normalize_word(&heard.text) == pair.expected;

        let mut score = if let Some(supplied) = heard.phonemes.as_deref().filter(|p| !p.is_empty()) {
            log::debug!("{:?}: aligning recognizer phonemes", pair.expected);
            let supplied = phonemes::normalize_symbols(supplied);
            score_word(&pair.expected, &expected, Some(supplied.as_slice()), confidence.unwrap_or(1.0), self.confusions)
        } else if let Some(c) = confidence.filter(|&c| exact && c < self.config.trust_confidence_above) {
            log::debug!("{:?}: confidence fallback ({c:.2})", pair.expected);
            score_word(&pair.expected, &expected, None, c, self.confusions)
        } else if exact {
            log::debug!("{:?}: exact match, aligning reference phonemes", pair.expected);
            score_word(&pair.expected, &expected, Some(expected.as_slice()), confidence.unwrap_or(1.0), self.confusions)
        } else {
            log::debug!("{:?}: aligning G2P of {:?}", pair.expected, heard.text);
            let approximated = self.g2p.to_phonemes(&heard.text);
            score_word(&pair.expected, &expected, Some(approximated.as_slice()), confidence.unwrap_or(1.0), self.confusions)
        };

        if confidence.is_some_and(|c| c < self.config.low_confidence_below) {
            score.issues.push(WordIssue::LowConfidence);
        }
        if self.confusions.is_some_and(|table| score.problem_phonemes.iter().any(|p| table.contains(p)))
            && !score.has_issue(WordIssue::L1Interference)
        {
            score.issues.push(WordIssue::L1Interference);
        }
        score
    }
}
