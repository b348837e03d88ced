use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::UtteranceAssessment;

use super::model::HistoryError;

/// One past assessment of a learner, as stored by the history collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub learner_id: String,
    pub phrase: String,
    /// Mean score per phoneme over the utterance.
    pub phoneme_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl AttemptRecord {
    /// Summarize an assessment into a record stamped with the current time.
    pub fn from_assessment(learner_id: &str, phrase: &str, assessment: &UtteranceAssessment) -> Self {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for score in assessment
            .word_scores
            .iter()
            .flat_map(|w| w.phoneme_scores.iter())
        {
            let entry = sums.entry(score.phoneme.clone()).or_insert((0.0, 0));
            entry.0 += score.score;
            entry.1 += 1;
        }

        Self {
            learner_id: learner_id.to_string(),
            phrase: phrase.to_string(),
            phoneme_scores: sums
                .into_iter()
                .map(|(phoneme, (sum, n))| (phoneme, sum / n as f64))
                .collect(),
            overall_score: assessment.overall_score,
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Attempt-history store consumed by the engine.
///
/// The engine treats both operations as best-effort: failures are logged and
/// the assessment continues without trend data.
pub trait AttemptHistory: Send + Sync {
    fn append(&self, record: AttemptRecord) -> Result<(), HistoryError>;

    /// Up to `n` records for the learner, most recent first.
    fn query_recent(&self, learner_id: &str, n: usize) -> Result<Vec<AttemptRecord>, HistoryError>;
}

/// Most recent `n` of a learner's records. Later insertion wins timestamp ties.
fn most_recent<'a, I>(records: I, learner_id: &str, n: usize) -> Vec<AttemptRecord>
where
    I: DoubleEndedIterator<Item = &'a AttemptRecord>,
{
    let mut matching: Vec<AttemptRecord> = records
        .rev()
        .filter(|r| r.learner_id == learner_id)
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    matching.truncate(n);
    matching
}

/// Process-local store, mainly for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<AttemptRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AttemptRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttemptHistory for InMemoryHistory {
    fn append(&self, record: AttemptRecord) -> Result<(), HistoryError> {
        self.records
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }

    fn query_recent(&self, learner_id: &str, n: usize) -> Result<Vec<AttemptRecord>, HistoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?;
        Ok(most_recent(records.iter(), learner_id, n))
    }
}

/// File-backed store with one JSON record per line.
///
/// Appends are O(1). Queries parse the whole file, so their cost grows with
/// every attempt ever recorded; rotate or archive the file for long-lived
/// learners.
#[derive(Debug)]
pub struct JsonlHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistory {
    /// Use `path`, creating the file on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records of `learner_id` in file order. Other learners' records are
    /// parsed and dropped.
    fn read_learner(&self, learner_id: &str) -> Result<Vec<AttemptRecord>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AttemptRecord>(&line) {
                Ok(record) if record.learner_id == learner_id => records.push(record),
                Ok(_) => {}
                Err(e) => log::warn!(
                    "Skipping malformed history record at {}:{}: {e}",
                    self.path.display(),
                    line_no + 1
                ),
            }
        }
        Ok(records)
    }
}

impl AttemptHistory for JsonlHistory {
    fn append(&self, record: AttemptRecord) -> Result<(), HistoryError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn query_recent(&self, learner_id: &str, n: usize) -> Result<Vec<AttemptRecord>, HistoryError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?;
        let records = self.read_learner(learner_id)?;
        Ok(most_recent(records.iter(), learner_id, n))
    }
}
