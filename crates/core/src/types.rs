use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful file assistant. Help users check and read files.";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub system_prompt: String,
    pub max_iterations: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Final answer plus every tool the model invoked, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub tools_called: Vec<String>,
}
