use crate::config::AppConfig;
use crate::server::AppState;
use anyhow::{Context, Result};
use poisonlab_core::AgentRelay;
use poisonlab_policy::{AccessPolicy, JsonlAuditSink, PathMediator, TracingAuditSink, Variant};
use poisonlab_providers::{LLMProvider, OpenAICompatibleProvider};
use poisonlab_tools::{build_registry, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the mediator for the configured variant.
///
/// The vulnerable variant gets no allowlist and no audit sink. The secure
/// variant enforces `access.allowed_roots` and audits to `access.audit_log`,
/// or to the tracing log when no file is configured.
pub fn build_mediator(config: &AppConfig) -> Result<PathMediator> {
    let base_dir = config.base_dir()?;

    match config.variant {
        Variant::Vulnerable => {
            if config.access.audit_log.is_some() {
                warn!("access.audit_log is ignored by the vulnerable variant");
            }
            let policy = AccessPolicy::unrestricted(base_dir).context("Invalid access policy")?;
            Ok(PathMediator::new(Arc::new(policy)).with_max_read_bytes(config.access.max_read_bytes))
        }
        Variant::Secure => {
            let policy = AccessPolicy::new(config.access.allowed_roots.clone(), base_dir)
                .context("Invalid access policy")?;
            info!("Allowed directories: {}", policy.describe_roots());

            let mediator = PathMediator::new(Arc::new(policy))
                .with_max_read_bytes(config.access.max_read_bytes);
            let mediator = match &config.access.audit_log {
                Some(path) => {
                    let sink = JsonlAuditSink::new(path).with_context(|| {
                        format!("Failed to open audit log {}", path.display())
                    })?;
                    info!("Audit log: {}", sink.path().display());
                    mediator.with_audit(Arc::new(sink))
                }
                None => mediator.with_audit(Arc::new(TracingAuditSink)),
            };
            Ok(mediator)
        }
    }
}

pub fn build_tools(config: &AppConfig) -> Result<ToolRegistry> {
    let mediator = build_mediator(config)?;
    Ok(build_registry(config.variant, Arc::new(mediator)))
}

pub fn build_provider(config: &AppConfig) -> Arc<dyn LLMProvider> {
    if config.llm.api_key.is_none() {
        warn!(
            "{} is not set; LLM requests will be sent without credentials",
            config.llm.api_key_env
        );
    }

    let provider = OpenAICompatibleProvider::new(
        config.llm.endpoint.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    )
    .with_timeout(Duration::from_secs(config.llm.timeout_secs));

    info!("LLM: {} via {}", provider.model(), config.llm.endpoint);
    Arc::new(provider)
}

/// Wire policy, tools and relay into the state shared by every request.
pub fn build_state(config: &AppConfig, provider: Arc<dyn LLMProvider>) -> Result<AppState> {
    let registry = Arc::new(build_tools(config)?);
    let relay = AgentRelay::new(provider, registry.clone(), config.agent.clone());

    Ok(AppState {
        variant: config.variant,
        registry,
        relay: Arc::new(relay),
        cors_origins: Arc::new(config.server.cors_origins.clone()),
    })
}
