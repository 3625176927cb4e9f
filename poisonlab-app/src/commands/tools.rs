use crate::bootstrap::build_tools;
use crate::config::AppConfig;
use anyhow::{Context, Result};

/// Print the tool listing exactly as `/tools` would serve it.
pub fn run(config: &AppConfig) -> Result<()> {
    let registry = build_tools(config)?;
    let listing = serde_json::json!({ "tools": registry.list() });
    let rendered =
        serde_json::to_string_pretty(&listing).context("Failed to render tool listing")?;
    println!("{}", rendered);
    Ok(())
}
