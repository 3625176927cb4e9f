use crate::traits::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat-completions client for any OpenAI-compatible endpoint, including
/// Gemini's `/v1beta/openai` surface.
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
    ) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools);
            }
        }

        debug!("POST {} ({} messages)", url, messages.len());

        let mut request = self.client.post(&url).timeout(self.timeout).json(&body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{}: {}", status, text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(&json)
    }

    fn name(&self) -> &str {
        "OpenAI Compatible"
    }
}

fn wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role,
        "content": message.content,
    });

    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        wire["tool_calls"] = json!(calls);
    }

    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }

    wire
}

pub(crate) fn parse_response(json: &Value) -> Result<GenerateResponse, ProviderError> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = &choice["message"];
    let content = message["content"].as_str().map(|s| s.to_string());
    let finish_reason = choice["finish_reason"]
        .as_str()
        .unwrap_or("stop")
        .to_string();

    let tool_calls = match message["tool_calls"].as_array() {
        Some(calls) => calls
            .iter()
            .enumerate()
            .filter_map(|(index, call)| {
                let name = call["function"]["name"].as_str()?.to_string();
                let arguments = match &call["function"]["arguments"] {
                    Value::String(raw) if raw.trim().is_empty() => json!({}),
                    // Kept as a string so the tool layer rejects it and the
                    // model is told why.
                    Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                        warn!("Malformed arguments for tool call {}: {}", index, e);
                        Value::String(raw.clone())
                    }),
                    Value::Object(_) => call["function"]["arguments"].clone(),
                    _ => json!({}),
                };
                let id = call["id"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("call_{}", index));
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(GenerateResponse {
        content,
        tool_calls,
        finish_reason,
    })
}
