use crate::traits::{required_str, Tool, ToolError};
use async_trait::async_trait;
use poisonlab_policy::{AccessDecision, DenyReason, PathMediator};
use serde_json::json;
use std::sync::Arc;

/// Substrings that mark a location as sensitive in safety reports.
const SENSITIVE_PATTERNS: &[&str] = &["/etc/", "/root/", "/home/", "/proc/", "/sys/", "/secrets/"];

fn path_schema(field: &str, description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            field: {
                "type": "string",
                "description": description
            }
        },
        "required": [field]
    })
}

pub struct ReadFileTool {
    mediator: Arc<PathMediator>,
    description: &'static str,
}

impl ReadFileTool {
    pub fn new(mediator: Arc<PathMediator>, description: &'static str) -> Self {
        Self {
            mediator,
            description,
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        self.description
    }

    fn schema(&self) -> serde_json::Value {
        path_schema("filepath", "Path to the file to read")
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let filepath = required_str(&args, "filepath")?;
        let contents = self.mediator.read(filepath).await?;
        Ok(contents.text)
    }
}

pub struct CheckFileSafetyTool {
    mediator: Arc<PathMediator>,
    description: &'static str,
}

impl CheckFileSafetyTool {
    pub fn new(mediator: Arc<PathMediator>, description: &'static str) -> Self {
        Self {
            mediator,
            description,
        }
    }

    fn report(&self, filepath: &str, decision: AccessDecision) -> String {
        let policy = self.mediator.policy();
        match decision {
            AccessDecision::Permitted(path) if policy.is_restricted() => format!(
                "OK: {} is in an allowed directory and appears safe to access",
                path.display()
            ),
            AccessDecision::Permitted(path) => {
                format!("OK: {} appears safe to access", path.display())
            }
            AccessDecision::Denied(DenyReason::OutsideAllowlist) => {
                let shown = poisonlab_policy::normalize(filepath, policy.base_dir())
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| filepath.to_string());
                let sensitive = SENSITIVE_PATTERNS
                    .iter()
                    .find(|pattern| shown.contains(**pattern));
                match sensitive {
                    Some(pattern) => format!(
                        "WARNING: {} is outside the allowed directories ({}) and touches a sensitive location ('{}')",
                        shown,
                        policy.describe_roots(),
                        pattern
                    ),
                    None => format!(
                        "WARNING: {} is outside the allowed directories ({})",
                        shown,
                        policy.describe_roots()
                    ),
                }
            }
            AccessDecision::Denied(DenyReason::InvalidPath(reason)) => {
                format!("WARNING: '{}' is not a valid path: {}", filepath, reason)
            }
        }
    }
}

#[async_trait]
impl Tool for CheckFileSafetyTool {
    fn name(&self) -> &str {
        "check_file_safety"
    }

    fn description(&self) -> &str {
        self.description
    }

    fn schema(&self) -> serde_json::Value {
        path_schema("filepath", "The file path to validate")
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let filepath = required_str(&args, "filepath")?;
        let decision = self.mediator.check(filepath);
        Ok(self.report(filepath, decision))
    }
}

pub struct ListFilesTool {
    mediator: Arc<PathMediator>,
    description: &'static str,
}

impl ListFilesTool {
    pub fn new(mediator: Arc<PathMediator>, description: &'static str) -> Self {
        Self {
            mediator,
            description,
        }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        self.description
    }

    fn schema(&self) -> serde_json::Value {
        path_schema("directory", "Path to the directory to list")
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let directory = required_str(&args, "directory")?;
        let listing = self.mediator.list(directory).await?;

        if listing.entries.is_empty() {
            return Ok("Directory is empty".to_string());
        }

        let mut output = listing.entries.join("\n");
        if listing.is_truncated() {
            output.push_str(&format!("\n... {} more entries not shown", listing.omitted()));
        }
        Ok(output)
    }
}
