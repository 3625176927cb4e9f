use crate::access::{normalize, AccessDecision, AccessPolicy, DenyReason};
use crate::audit::{AuditAction, AuditRecord, AuditSink};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024; // 1MB
pub const MAX_LIST_ENTRIES: usize = 1000;

/// Failure of a mediated file operation. Returned as data, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Access denied: {path} is outside the allowed directories ({allowed})")]
    OutsideAllowlist { path: String, allowed: String },
    #[error("Invalid path '{requested}': {reason}")]
    InvalidPath { requested: String, reason: String },
    #[error("Read failed for {path}: {reason}")]
    ReadFailure { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub path: PathBuf,
    pub text: String,
    pub bytes: u64,
}

/// Sorted directory entries, capped at [`MAX_LIST_ENTRIES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub path: PathBuf,
    pub entries: Vec<String>,
    /// Entries in the directory before the cap was applied.
    pub total: usize,
}

impl DirectoryListing {
    pub fn is_truncated(&self) -> bool {
        self.total > self.entries.len()
    }

    pub fn omitted(&self) -> usize {
        self.total - self.entries.len()
    }
}

/// Decides and performs file access on behalf of tool handlers.
///
/// Holds only immutable state, so one instance is shared across requests.
/// When an audit sink is attached every read, list and check produces
/// exactly one record, whatever the outcome.
pub struct PathMediator {
    policy: Arc<AccessPolicy>,
    audit: Option<Arc<dyn AuditSink>>,
    max_read_bytes: u64,
}

impl PathMediator {
    pub fn new(policy: Arc<AccessPolicy>) -> Self {
        for root in policy.allowed_roots() {
            if !root.exists() {
                warn!("Allowed directory does not exist yet: {}", root.display());
            }
        }

        Self {
            policy,
            audit: None,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_max_read_bytes(mut self, max_read_bytes: u64) -> Self {
        self.max_read_bytes = max_read_bytes;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn is_audited(&self) -> bool {
        self.audit.is_some()
    }

    pub fn resolve(&self, requested: &str) -> AccessDecision {
        let decision = self.policy.evaluate(requested);
        debug!("Resolved '{}' -> {:?}", requested, decision);
        decision
    }

    /// Resolve and record the attempt without touching the file.
    pub fn check(&self, requested: &str) -> AccessDecision {
        let decision = self.resolve(requested);
        let outcome: Result<(), AccessError> = match &decision {
            AccessDecision::Permitted(_) => Ok(()),
            AccessDecision::Denied(reason) => Err(self.denial(requested, reason)),
        };
        self.record(AuditAction::Check, requested, &decision, &outcome, None);
        decision
    }

    pub async fn read(&self, requested: &str) -> Result<FileContents, AccessError> {
        let decision = self.resolve(requested);
        let result = match &decision {
            AccessDecision::Permitted(path) => self.read_permitted(path).await,
            AccessDecision::Denied(reason) => Err(self.denial(requested, reason)),
        };

        let detail = result
            .as_ref()
            .ok()
            .map(|contents| format!("{} bytes", contents.bytes));
        self.record(AuditAction::Read, requested, &decision, &result, detail);
        result
    }

    pub async fn list(&self, requested: &str) -> Result<DirectoryListing, AccessError> {
        let decision = self.resolve(requested);
        let result = match &decision {
            AccessDecision::Permitted(path) => self.list_permitted(path).await,
            AccessDecision::Denied(reason) => Err(self.denial(requested, reason)),
        };

        let detail = result
            .as_ref()
            .ok()
            .map(|listing| {
                if listing.is_truncated() {
                    format!(
                        "{} of {} entries (truncated)",
                        listing.entries.len(),
                        listing.total
                    )
                } else {
                    format!("{} entries", listing.total)
                }
            });
        self.record(AuditAction::List, requested, &decision, &result, detail);
        result
    }

    async fn read_permitted(&self, path: &Path) -> Result<FileContents, AccessError> {
        let target = self.confine(path).await?;

        let file = fs::File::open(&target)
            .await
            .map_err(|e| read_failure(&target, &e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| read_failure(&target, &e))?;

        if metadata.is_dir() {
            return Err(AccessError::ReadFailure {
                path: target.display().to_string(),
                reason: "is a directory".into(),
            });
        }

        if metadata.len() > self.max_read_bytes {
            return Err(self.too_large(&target));
        }

        let mut buf = Vec::with_capacity(metadata.len() as usize);
        file.take(self.max_read_bytes + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| read_failure(&target, &e))?;

        // The file may have grown between metadata and read.
        if buf.len() as u64 > self.max_read_bytes {
            return Err(self.too_large(&target));
        }

        Ok(FileContents {
            path: target,
            bytes: buf.len() as u64,
            text: String::from_utf8_lossy(&buf).into_owned(),
        })
    }

    async fn list_permitted(&self, path: &Path) -> Result<DirectoryListing, AccessError> {
        let target = self.confine(path).await?;

        let mut dir = fs::read_dir(&target)
            .await
            .map_err(|e| read_failure(&target, &e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| read_failure(&target, &e))?
        {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }

        entries.sort();
        let total = entries.len();
        entries.truncate(MAX_LIST_ENTRIES);

        Ok(DirectoryListing {
            path: target,
            entries,
            total,
        })
    }

    /// Roots are resolved per call so directories created after startup
    /// still match their canonical form.
    async fn canonical_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.policy.allowed_roots().len());
        for root in self.policy.allowed_roots() {
            roots.push(fs::canonicalize(root).await.unwrap_or_else(|_| root.clone()));
        }
        roots
    }

    /// Re-check an existing target after symlink resolution.
    async fn confine(&self, path: &Path) -> Result<PathBuf, AccessError> {
        if !self.policy.is_restricted() {
            return Ok(path.to_path_buf());
        }

        match fs::canonicalize(path).await {
            Ok(canonical) => {
                let inside = self
                    .canonical_roots()
                    .await
                    .iter()
                    .any(|root| canonical.starts_with(root));
                if inside {
                    Ok(canonical)
                } else {
                    warn!(
                        "Symlink escape blocked: {} -> {}",
                        path.display(),
                        canonical.display()
                    );
                    Err(AccessError::OutsideAllowlist {
                        path: canonical.display().to_string(),
                        allowed: self.policy.describe_roots(),
                    })
                }
            }
            // Missing files surface as a read failure on open.
            Err(_) => Ok(path.to_path_buf()),
        }
    }

    fn denial(&self, requested: &str, reason: &DenyReason) -> AccessError {
        match reason {
            DenyReason::OutsideAllowlist => {
                let path = normalize(requested, self.policy.base_dir())
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| requested.to_string());
                warn!("Access denied outside allowlist: {}", path);
                AccessError::OutsideAllowlist {
                    path,
                    allowed: self.policy.describe_roots(),
                }
            }
            DenyReason::InvalidPath(why) => {
                warn!("Rejected malformed path '{}': {}", requested, why);
                AccessError::InvalidPath {
                    requested: requested.to_string(),
                    reason: why.clone(),
                }
            }
        }
    }

    fn too_large(&self, path: &Path) -> AccessError {
        AccessError::ReadFailure {
            path: path.display().to_string(),
            reason: format!("file exceeds {} bytes", self.max_read_bytes),
        }
    }

    fn record<T>(
        &self,
        action: AuditAction,
        requested: &str,
        decision: &AccessDecision,
        result: &Result<T, AccessError>,
        detail: Option<String>,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };

        let mut record = match result {
            // Permitted lexically but escaped through a symlink.
            Err(AccessError::OutsideAllowlist { .. }) if decision.is_permitted() => {
                AuditRecord::new(
                    action,
                    requested,
                    &AccessDecision::Denied(DenyReason::OutsideAllowlist),
                )
            }
            _ => AuditRecord::new(action, requested, decision),
        };

        if let Err(e @ AccessError::ReadFailure { .. }) = result {
            record = record.with_detail(e.to_string());
        } else if let Some(detail) = detail {
            record = record.with_detail(detail);
        }

        // Audit logging must never fail the operation.
        if let Err(e) = sink.append(&record) {
            warn!("Failed to append audit record: {}", e);
        }
    }
}

fn read_failure(path: &Path, err: &io::Error) -> AccessError {
    let reason = match err.kind() {
        io::ErrorKind::NotFound => "file not found".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    };
    AccessError::ReadFailure {
        path: path.display().to_string(),
        reason,
    }
}
