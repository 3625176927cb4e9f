use crate::access::{AccessDecision, DecisionKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Read,
    List,
    Check,
}

/// One file access attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub action: AuditAction,
    pub requested_path: String,
    pub decision: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, requested_path: &str, decision: &AccessDecision) -> Self {
        let detail = match decision {
            AccessDecision::Permitted(_) => None,
            AccessDecision::Denied(reason) => Some(reason.to_string()),
        };
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            action,
            requested_path: requested_path.to_string(),
            decision: decision.kind(),
            normalized_path: decision
                .normalized_path()
                .map(|path| path.display().to_string()),
            detail,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only destination for audit records.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Writes one JSON object per line to a file opened in append mode.
pub struct JsonlAuditSink {
    log_path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self, AuditError> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log_path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        // Serialize outside the lock; the write itself is a single line.
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Emits each record as a structured `tracing` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            action = ?record.action,
            requested_path = %record.requested_path,
            decision = ?record.decision,
            normalized_path = record.normalized_path.as_deref().unwrap_or("-"),
            detail = record.detail.as_deref().unwrap_or("-"),
            "AUDIT"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DenyReason;
    use std::io::{BufRead, BufReader};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_record_from_denied_decision() {
        let decision = AccessDecision::Denied(DenyReason::OutsideAllowlist);
        let record = AuditRecord::new(AuditAction::Read, "/etc/passwd", &decision);
        assert_eq!(record.decision, DecisionKind::Denied);
        assert_eq!(record.normalized_path, None);
        assert_eq!(record.detail.as_deref(), Some("outside allowed directories"));
    }

    #[test]
    fn test_record_from_permitted_decision() {
        let decision = AccessDecision::Permitted(PathBuf::from("/srv/public/a.txt"));
        let record = AuditRecord::new(AuditAction::List, "public/a.txt", &decision);
        assert_eq!(record.decision, DecisionKind::Permitted);
        assert_eq!(record.normalized_path.as_deref(), Some("/srv/public/a.txt"));
        assert!(record.detail.is_none());
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("logs/audit.jsonl");
        let sink = JsonlAuditSink::new(&log_path).unwrap();

        let decision = AccessDecision::Denied(DenyReason::OutsideAllowlist);
        for i in 0..3 {
            let record = AuditRecord::new(AuditAction::Read, &format!("/etc/f{}", i), &decision);
            sink.append(&record).unwrap();
        }

        let reader = BufReader::new(File::open(&log_path).unwrap());
        let records: Vec<AuditRecord> = reader
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].requested_path, "/etc/f2");
    }

    #[test]
    fn test_jsonl_sink_concurrent_appends_do_not_interleave() {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("audit.jsonl");
        let sink = Arc::new(JsonlAuditSink::new(&log_path).unwrap());

        let mut handles = vec![];
        for t in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                let decision = AccessDecision::Permitted(PathBuf::from("/srv/x"));
                for i in 0..25 {
                    let record =
                        AuditRecord::new(AuditAction::Read, &format!("t{}-{}", t, i), &decision);
                    sink.append(&record).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let reader = BufReader::new(File::open(&log_path).unwrap());
        let mut count = 0;
        for line in reader.lines() {
            let _: AuditRecord = serde_json::from_str(&line.unwrap()).unwrap();
            count += 1;
        }
        assert_eq!(count, 200);
    }
}
