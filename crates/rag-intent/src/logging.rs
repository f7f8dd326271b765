//! Append-only query logging (`query_logger.py`, SPEC_FULL.md §3):
//! `rejected_queries.jsonl`, `low_confidence_queries.jsonl`, and
//! `learning_queue.jsonl`, each one JSON object per line, plus startup
//! retention cleanup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One logged event, matching the documented per-line schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub intent: Option<String>,
    pub confidence: f32,
    pub language: Option<String>,
    pub complexity: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Owns the three log file paths and the retention window.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    rejected_path: PathBuf,
    low_confidence_path: PathBuf,
    learning_queue_path: PathBuf,
    retention_days: i64,
}

impl QueryLogger {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, retention_days: i64) -> Self {
        let dir = dir.as_ref();
        Self {
            rejected_path: dir.join("rejected_queries.jsonl"),
            low_confidence_path: dir.join("low_confidence_queries.jsonl"),
            learning_queue_path: dir.join("learning_queue.jsonl"),
            retention_days,
        }
    }

    pub fn log_rejected(&self, entry: &QueryLogEntry) -> Result<()> {
        append_line(&self.rejected_path, entry)
    }

    pub fn log_low_confidence(&self, entry: &QueryLogEntry) -> Result<()> {
        append_line(&self.low_confidence_path, entry)
    }

    pub fn log_learning(&self, entry: &QueryLogEntry) -> Result<()> {
        append_line(&self.learning_queue_path, entry)
    }

    /// Read non-expired entries back from `path` (used by the retrieval
    /// stats endpoint and by startup cleanup).
    pub fn read_recent(&self, path: &Path, since: DateTime<Utc>) -> Vec<QueryLogEntry> {
        read_entries(path).into_iter().filter(|e| e.timestamp >= since).collect()
    }

    #[must_use]
    pub fn rejected_path(&self) -> &Path {
        &self.rejected_path
    }

    #[must_use]
    pub fn low_confidence_path(&self) -> &Path {
        &self.low_confidence_path
    }

    /// Startup cleanup: rewrite each log file keeping only entries within
    /// `LOG_RETENTION_DAYS` (default 7).
    pub fn cleanup_expired(&self) -> Result<()> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        for path in [&self.rejected_path, &self.low_confidence_path, &self.learning_queue_path] {
            let kept = self.read_recent(path, cutoff);
            rewrite_atomic(path, &kept)?;
        }
        Ok(())
    }
}

fn append_line(path: &Path, entry: &QueryLogEntry) -> Result<()> {
    use std::io::Write;
    let body = serde_json::to_string(entry).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    writeln!(file, "{body}").map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    Ok(())
}

fn read_entries(path: &Path) -> Vec<QueryLogEntry> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

fn rewrite_atomic(path: &Path, entries: &[QueryLogEntry]) -> Result<()> {
    let body: String = entries
        .iter()
        .map(|e| serde_json::to_string(e).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");
    let body = if body.is_empty() { body } else { format!("{body}\n") };
    let tmp_path = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp_path, body).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(event_type: &str, timestamp: DateTime<Utc>) -> QueryLogEntry {
        QueryLogEntry {
            timestamp,
            query: "asdf zxcv".to_string(),
            intent: Some("factual_retrieval".to_string()),
            confidence: 0.3,
            language: Some("en".to_string()),
            complexity: Some("simple".to_string()),
            event_type: event_type.to_string(),
            reasoning: None,
            error_message: None,
        }
    }

    #[test]
    fn appended_entries_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let logger = QueryLogger::new(dir.path(), 7);
        logger.log_rejected(&sample_entry("rejected", Utc::now())).unwrap();
        logger.log_rejected(&sample_entry("rejected", Utc::now())).unwrap();
        let entries = read_entries(logger.rejected_path());
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn cleanup_drops_entries_older_than_retention() {
        let dir = tempfile::tempdir().unwrap();
        let logger = QueryLogger::new(dir.path(), 7);
        logger.log_rejected(&sample_entry("rejected", Utc::now() - chrono::Duration::days(10))).unwrap();
        logger.log_rejected(&sample_entry("rejected", Utc::now())).unwrap();
        logger.cleanup_expired().unwrap();
        let entries = read_entries(logger.rejected_path());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let logger = QueryLogger::new(dir.path(), 7);
        assert!(read_entries(logger.low_confidence_path()).is_empty());
    }
}
