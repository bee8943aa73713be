use serde::{Deserialize, Serialize};

use super::tool::ToolCall;
use crate::error::AgentError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Tool-response messages.
    Tool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_response(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name().to_string()),
        }
    }
}

/// Ordered message history of one agent loop execution.
///
/// Only grows. A tool response can only follow the assistant message that
/// carries the call it answers.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(initial_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(initial_prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_tool_calls(&mut self, calls: Vec<ToolCall>) {
        self.messages.push(Message::assistant_calls(calls));
    }

    /// Append the response to `call`, which must be carried by the last message.
    pub fn push_tool_response(
        &mut self,
        call: &ToolCall,
        content: impl Into<String>,
    ) -> Result<(), AgentError> {
        let answers_last = self.messages.last().is_some_and(|last| {
            last.role == Role::Assistant
                && last
                    .tool_calls
                    .as_ref()
                    .is_some_and(|calls| calls.iter().any(|c| c.id == call.id))
        });
        if !answers_last {
            return Err(AgentError::Conversation(format!(
                "tool response for call '{}' does not follow its assistant tool call",
                call.id
            )));
        }
        self.messages.push(Message::tool_response(call, content));
        Ok(())
    }
}
