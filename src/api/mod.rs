//! Model-generation capability.
//!
//! The agent loop only sees [`ModelBackend`]; [`ChatCompletionsBackend`] is the
//! HTTP implementation used by the binary.

pub mod client;
pub mod models;
pub mod response;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::models::{Message, ToolCall, ToolDescriptor};

pub use client::ChatCompletionsBackend;
pub use models::RequestBody;

/// Input of one generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDescriptor],
    pub max_tokens: u32,
}

/// One candidate answer. Either text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Choice {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Choice {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub choices: Vec<Choice>,
}

impl ModelResponse {
    pub fn single(choice: Choice) -> Self {
        Self {
            choices: vec![choice],
        }
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError>;

    fn model_name(&self) -> &str;
}
