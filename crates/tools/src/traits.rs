use async_trait::async_trait;
use poisonlab_policy::AccessError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// Failure inside a tool that is not an access decision. The built-in
    /// file tools report through [`ToolError::Access`]; tools registered by
    /// callers use this for their own errors.
    #[error("Handler error: {0}")]
    Handler(String),
    #[error(transparent)]
    Access(#[from] AccessError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    /// Text shown verbatim to the consuming agent.
    fn description(&self) -> &str;
    fn schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

pub fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{}' field", field)))
}

/// Check `args` against the `required`/`properties` parts of a JSON schema.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let object = match args {
        Value::Object(object) => object,
        Value::String(raw) => {
            return Err(ToolError::InvalidArguments(format!(
                "arguments are not valid JSON: {}",
                raw
            )));
        }
        _ => {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".into(),
            ));
        }
    };

    let required = schema["required"].as_array().cloned().unwrap_or_default();
    for field in required.iter().filter_map(Value::as_str) {
        let Some(value) = object.get(field) else {
            return Err(ToolError::InvalidArguments(format!(
                "Missing '{}' field",
                field
            )));
        };

        if schema["properties"][field]["type"] == "string" && !value.is_string() {
            return Err(ToolError::InvalidArguments(format!(
                "Field '{}' must be a string",
                field
            )));
        }
    }

    Ok(())
}
