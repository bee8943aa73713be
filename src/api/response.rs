use serde_json::Value;
use uuid::Uuid;

use super::{Choice, ModelResponse};
use crate::error::LlmError;
use crate::models::ToolCall;

/// Parse a non-streaming chat-completions response.
///
/// An empty `choices` array is not an error here; the agent loop decides what
/// zero choices means.
pub fn parse_response(response_json: &Value) -> Result<ModelResponse, LlmError> {
    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let choices = choices
        .iter()
        .map(parse_choice)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModelResponse { choices })
}

fn parse_choice(choice: &Value) -> Result<Choice, LlmError> {
    let message = choice
        .get("message")
        .ok_or_else(|| LlmError::InvalidResponse("No message in response".to_string()))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let tool_calls = match message.get("tool_calls").and_then(|tc| tc.as_array()) {
        Some(calls) => calls.iter().map(parse_tool_call).collect::<Result<_, _>>()?,
        None => Vec::new(),
    };

    Ok(Choice {
        content,
        tool_calls,
    })
}

fn parse_tool_call(tool_call: &Value) -> Result<ToolCall, LlmError> {
    let function = tool_call.get("function").ok_or_else(|| {
        LlmError::InvalidResponse("Tool call missing 'function' field".to_string())
    })?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| {
            LlmError::InvalidResponse("Tool call missing 'function.name' field".to_string())
        })?;

    // Some providers send the arguments as an object instead of a string.
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let id = tool_call
        .get("id")
        .and_then(|i| i.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));

    Ok(ToolCall::new(id, name, arguments))
}
