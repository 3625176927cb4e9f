use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("outside allowed directories")]
    OutsideAllowlist,
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Base directory must be absolute: {0}")]
    RelativeBase(PathBuf),
    #[error("Invalid allowed root '{root}': {reason}")]
    InvalidRoot { root: String, reason: DenyReason },
}

/// Outcome of evaluating one requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Permitted(PathBuf),
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, AccessDecision::Permitted(_))
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            AccessDecision::Permitted(_) => DecisionKind::Permitted,
            AccessDecision::Denied(_) => DecisionKind::Denied,
        }
    }

    pub fn normalized_path(&self) -> Option<&Path> {
        match self {
            AccessDecision::Permitted(path) => Some(path),
            AccessDecision::Denied(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Permitted,
    Denied,
}

/// Lexically normalize `requested` into an absolute path.
///
/// Backslashes are treated as separators, relative input is joined onto
/// `base_dir`, and `.`/`..` segments are collapsed without touching the
/// filesystem. `..` above the root stays at the root.
pub fn normalize(requested: &str, base_dir: &Path) -> Result<PathBuf, DenyReason> {
    let trimmed = requested.trim();

    if trimmed.is_empty() {
        return Err(DenyReason::InvalidPath("empty path".into()));
    }

    if trimmed.contains('\0') {
        return Err(DenyReason::InvalidPath("path contains a NUL byte".into()));
    }

    // No shell expansion happens here, so "~" would silently become a
    // directory literally named "~" under base_dir.
    if trimmed.starts_with('~') {
        return Err(DenyReason::InvalidPath(
            "home directory expansion is not supported".into(),
        ));
    }

    let unified = trimmed.replace('\\', "/");
    let candidate = Path::new(&unified);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    if !normalized.is_absolute() {
        return Err(DenyReason::InvalidPath(
            "path does not resolve to an absolute location".into(),
        ));
    }

    Ok(normalized)
}

/// Directory allowlist evaluated against normalized paths.
///
/// An empty allowlist permits every well-formed path.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_roots: Vec<PathBuf>,
    base_dir: PathBuf,
}

impl AccessPolicy {
    pub fn new(
        allowed_roots: impl IntoIterator<Item = PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, PolicyError> {
        let base_dir = base_dir.into();
        if !base_dir.is_absolute() {
            return Err(PolicyError::RelativeBase(base_dir));
        }

        let mut roots: Vec<PathBuf> = Vec::new();
        for root in allowed_roots {
            let raw = root.to_string_lossy().into_owned();
            let normalized = normalize(&raw, &base_dir)
                .map_err(|reason| PolicyError::InvalidRoot { root: raw, reason })?;
            if !roots.contains(&normalized) {
                roots.push(normalized);
            }
        }

        Ok(Self {
            allowed_roots: roots,
            base_dir,
        })
    }

    /// Policy with no allowlist.
    pub fn unrestricted(base_dir: impl Into<PathBuf>) -> Result<Self, PolicyError> {
        Self::new(Vec::new(), base_dir)
    }

    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_restricted(&self) -> bool {
        !self.allowed_roots.is_empty()
    }

    /// Component-wise prefix match; `/srv/data-evil` is not under `/srv/data`.
    pub fn contains(&self, path: &Path) -> bool {
        if self.allowed_roots.is_empty() {
            return true;
        }
        self.allowed_roots.iter().any(|root| path.starts_with(root))
    }

    pub fn evaluate(&self, requested: &str) -> AccessDecision {
        match normalize(requested, &self.base_dir) {
            Ok(path) if self.contains(&path) => AccessDecision::Permitted(path),
            Ok(_) => AccessDecision::Denied(DenyReason::OutsideAllowlist),
            Err(reason) => AccessDecision::Denied(reason),
        }
    }

    /// Allowed roots rendered for messages, e.g. `/app/demo/public, /app/demo/user_files`.
    pub fn describe_roots(&self) -> String {
        self.allowed_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
