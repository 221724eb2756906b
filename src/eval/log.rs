//! Append-only evaluation log
//!
//! One JSON record per line, flushed immediately after every append. The log
//! is the source of truth: summaries are derived by replaying it, never by
//! mutating a running total, so a crash at any point loses at most nothing.
//! Resuming a batch means reloading the log and skipping every
//! `(document, kind)` pair it already contains.

use crate::core::transform::TransformKind;
use crate::oracle::Review;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One scored variant, as persisted in the evaluation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRecord {
    /// Key of the owning document.
    pub document_id: String,
    /// Title of the owning document.
    pub title: String,
    /// The transform kind of the scored variant.
    pub transform_kind: TransformKind,
    /// The oracle's review.
    pub evaluation: Review,
    /// Character length of the scored text.
    pub text_length: usize,
    /// When the evaluation completed.
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    /// Resume-skip key: one evaluation per `(document, kind)` pair.
    pub fn key(&self) -> (String, String) {
        (self.document_id.clone(), self.transform_kind.to_string())
    }
}

/// Errors around the evaluation log.
#[derive(Debug)]
pub enum LogError {
    /// Underlying file I/O failed.
    Io {
        path: String,
        source: std::io::Error,
    },
    /// A record could not be serialized.
    Serialize { message: String },
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
            LogError::Serialize { message } => write!(f, "serialization error: {}", message),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Io { source, .. } => Some(source),
            LogError::Serialize { .. } => None,
        }
    }
}

/// Append-only JSONL log of evaluation records.
pub struct ResultLog {
    path: PathBuf,
    file: File,
}

impl ResultLog {
    /// Open (or create) the log at `path` for appending.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Self::io_err(path, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Self::io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn io_err(path: &Path, source: std::io::Error) -> LogError {
        LogError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk before returning. This is what
    /// makes the batch crash-resumable.
    pub fn append(&mut self, record: &EvaluationRecord) -> Result<(), LogError> {
        let line = serde_json::to_string(record).map_err(|e| LogError::Serialize {
            message: e.to_string(),
        })?;
        writeln!(self.file, "{}", line).map_err(|e| Self::io_err(&self.path, e))?;
        self.file.flush().map_err(|e| Self::io_err(&self.path, e))
    }

    /// Replay every record currently in the log. Malformed lines are skipped
    /// with a warning so a torn final write cannot poison a resume.
    pub fn load(&self) -> Result<Vec<EvaluationRecord>, LogError> {
        load_records(&self.path)
    }

    /// The set of `(document, kind)` pairs already evaluated - the resume
    /// skip-set, computed from a single snapshot of the log.
    pub fn completed_keys(&self) -> Result<HashSet<(String, String)>, LogError> {
        Ok(self.load()?.iter().map(EvaluationRecord::key).collect())
    }
}

/// Load evaluation records from a log file that may not be open as a
/// [`ResultLog`]. A missing file reads as an empty log.
pub fn load_records(path: &Path) -> Result<Vec<EvaluationRecord>, LogError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LogError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LogError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<EvaluationRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed log line");
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section::SectionKind;
    use std::io::Write as _;

    fn record(doc: &str, kind: TransformKind, rating: f64) -> EvaluationRecord {
        EvaluationRecord {
            document_id: doc.to_string(),
            title: format!("Paper {}", doc),
            transform_kind: kind,
            evaluation: Review::with_rating(rating, "Accept"),
            text_length: 1234,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.jsonl");
        let mut log = ResultLog::open(&path).unwrap();

        let first = record("p1", TransformKind::Original, 6.0);
        let second = record("p1", TransformKind::Remove(SectionKind::Abstract), 5.5);
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].document_id, "p1");
        assert_eq!(
            loaded[1].transform_kind,
            TransformKind::Remove(SectionKind::Abstract)
        );
    }

    #[test]
    fn test_reopen_appends_not_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.jsonl");

        {
            let mut log = ResultLog::open(&path).unwrap();
            log.append(&record("p1", TransformKind::Original, 6.0))
                .unwrap();
        }
        {
            let mut log = ResultLog::open(&path).unwrap();
            log.append(&record("p2", TransformKind::Original, 4.0))
                .unwrap();
        }

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_completed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.jsonl");
        let mut log = ResultLog::open(&path).unwrap();

        log.append(&record("p1", TransformKind::Original, 6.0))
            .unwrap();
        log.append(&record("p1", TransformKind::Remove(SectionKind::Methods), 5.0))
            .unwrap();

        let keys = log.completed_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&("p1".to_string(), "original".to_string())));
        assert!(keys.contains(&("p1".to_string(), "remove_methods".to_string())));
        assert!(!keys.contains(&("p2".to_string(), "original".to_string())));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = load_records(&dir.path().join("nope.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_torn_final_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.jsonl");

        {
            let mut log = ResultLog::open(&path).unwrap();
            log.append(&record("p1", TransformKind::Original, 6.0))
                .unwrap();
        }
        // Simulate a crash mid-write.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            write!(file, "{{\"document_id\": \"p2\", \"titl").unwrap();
        }

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].document_id, "p1");
    }

    #[test]
    fn test_timestamp_is_rfc3339_in_json() {
        let rec = record("p1", TransformKind::Original, 6.0);
        let json = serde_json::to_string(&rec).unwrap();
        // chrono serializes DateTime<Utc> as an RFC 3339 string.
        assert!(json.contains("\"timestamp\":\""));
        assert!(json.contains('T'));
    }
}
