use crate::types::{ChatOutcome, RelayConfig};
use poisonlab_providers::{LLMProvider, Message, ProviderError};
use poisonlab_tools::ToolRegistry;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Max iterations reached ({0})")]
    MaxIterations(usize),
}

/// Forwards a chat message to the model together with the registry's tool
/// metadata and executes whatever tool calls come back.
///
/// Tool failures are handed back to the model as `ERROR: ...` tool messages;
/// only provider failures and loop exhaustion end the request.
pub struct AgentRelay {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    config: RelayConfig,
}

impl AgentRelay {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        config: RelayConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn run(&self, message: &str) -> Result<ChatOutcome, RelayError> {
        info!(
            "Relaying chat message via {} ({} chars)",
            self.provider.name(),
            message.len()
        );

        let schemas = self.registry.schemas();
        let mut messages = vec![
            Message::system(&self.config.system_prompt),
            Message::user(message),
        ];
        let mut tools_called = Vec::new();
        let max_iterations = self.config.max_iterations;

        for iteration in 0..max_iterations {
            debug!("Iteration {}/{}", iteration + 1, max_iterations);

            let response = self
                .provider
                .generate(&messages, Some(schemas.as_slice()))
                .await?;

            if response.tool_calls.is_empty() {
                info!("Relay finished after {} tool calls", tools_called.len());
                return Ok(ChatOutcome {
                    response: response.content.unwrap_or_default(),
                    tools_called,
                });
            }

            messages.push(Message::assistant(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                info!("Executing tool: {}", call.name);
                tools_called.push(call.name.clone());

                let content = match self
                    .registry
                    .invoke(&call.name, call.arguments.clone())
                    .await
                {
                    Ok(output) => output,
                    Err(e) => {
                        warn!("Tool {} failed: {}", call.name, e);
                        format!("ERROR: {}", e)
                    }
                };

                messages.push(Message::tool(&call.id, content));
            }
        }

        warn!("Relay gave up after {} iterations", max_iterations);
        Err(RelayError::MaxIterations(max_iterations))
    }
}
