use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use super::response::parse_response;
use super::{GenerateRequest, ModelBackend, ModelResponse, RequestBody};
use crate::error::LlmError;

/// OpenAI-compatible chat-completions endpoint (OpenRouter by default).
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ChatCompletionsBackend {
    pub fn new(api_key: &str, endpoint: &str, model: &str) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::Other(format!("Invalid authorization header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ModelBackend for ChatCompletionsBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_function_json())
                    .collect(),
            )
        };

        let body = RequestBody {
            model: &self.model,
            messages: request.messages,
            stream: false,
            max_tokens: request.max_tokens,
            tools,
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion request"
        );

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api { status, message });
        }

        let response_text = response.text().await?;
        tracing::debug!(response = %response_text, "raw model response");

        let response_json: Value = serde_json::from_str(&response_text)?;
        parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
