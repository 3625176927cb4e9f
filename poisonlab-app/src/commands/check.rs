use crate::bootstrap::build_mediator;
use crate::config::AppConfig;
use anyhow::Result;
use poisonlab_policy::AccessDecision;

/// Print the access decision for `path` under the configured variant.
pub fn run(config: &AppConfig, path: &str) -> Result<()> {
    let mediator = build_mediator(config)?;

    match mediator.check(path) {
        AccessDecision::Permitted(resolved) => {
            println!("PERMITTED {} -> {}", path, resolved.display());
        }
        AccessDecision::Denied(reason) => {
            println!("DENIED {} ({})", path, reason);
        }
    }
    Ok(())
}
