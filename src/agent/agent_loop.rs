use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::api::{GenerateRequest, ModelBackend, ModelResponse};
use crate::config::{default_max_rounds, default_max_tokens, default_model_timeout_secs};
use crate::error::AgentError;
use crate::models::{Conversation, Task, ToolCall};
use crate::registry::ToolRegistry;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model/tool exchange cycles allowed before the task fails.
    pub max_rounds: usize,
    /// Deadline for each model call.
    pub model_timeout: Duration,
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            model_timeout: Duration::from_secs(default_model_timeout_secs()),
            max_tokens: default_max_tokens(),
        }
    }
}

/// States of one execution. `Done` and `Failed` are terminal.
#[derive(Debug)]
enum Step {
    Start,
    AwaitModel,
    DispatchTools(ToolCall),
    Done(String),
    Failed(AgentError),
}

enum Decision {
    Answer(String),
    Call(ToolCall),
}

/// Everything observable about one finished execution.
#[derive(Debug)]
pub struct AgentRun {
    pub result: Result<String, AgentError>,
    /// Model calls made.
    pub rounds: usize,
    pub conversation: Conversation,
}

/// Drives model calls and tool executions for one task at a time.
///
/// Holds no per-task state, so one instance is shared by every worker.
pub struct AgentLoop {
    backend: Arc<dyn ModelBackend>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(backend: Arc<dyn ModelBackend>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            backend,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub async fn run(&self, task: &Task) -> Result<String, AgentError> {
        self.execute(task).await.result
    }

    pub async fn execute(&self, task: &Task) -> AgentRun {
        let mut conversation = Conversation::default();
        let mut rounds = 0;
        let mut step = Step::Start;

        loop {
            tracing::trace!(task = task.id, ?step, "agent step");
            step = match step {
                Step::Start => {
                    conversation = Conversation::new(task.initial_prompt());
                    Step::AwaitModel
                }
                Step::AwaitModel => {
                    if rounds >= self.settings.max_rounds {
                        Step::Failed(AgentError::RoundBudgetExceeded {
                            rounds: self.settings.max_rounds,
                        })
                    } else {
                        rounds += 1;
                        match self.generate(&conversation).await.and_then(decide) {
                            Ok(Decision::Answer(text)) => Step::Done(text),
                            Ok(Decision::Call(call)) => {
                                // Only the first call of a round is consumed.
                                conversation.push_tool_calls(vec![call.clone()]);
                                Step::DispatchTools(call)
                            }
                            Err(e) => Step::Failed(e),
                        }
                    }
                }
                Step::DispatchTools(call) => {
                    tracing::info!(
                        task = task.id,
                        tool = %call.name(),
                        args = %call.arguments(),
                        "calling tool"
                    );
                    let output = self.tools.invoke(call.name(), call.arguments()).await;
                    match conversation.push_tool_response(&call, output) {
                        Ok(()) => Step::AwaitModel,
                        Err(e) => Step::Failed(e),
                    }
                }
                Step::Done(text) => {
                    tracing::debug!(task = task.id, rounds, "agent finished");
                    return AgentRun {
                        result: Ok(text),
                        rounds,
                        conversation,
                    };
                }
                Step::Failed(error) => {
                    tracing::debug!(task = task.id, rounds, %error, "agent failed");
                    return AgentRun {
                        result: Err(error),
                        rounds,
                        conversation,
                    };
                }
            };
        }
    }

    /// One model call. The deadline covers refreshing the tool catalog too.
    async fn generate(&self, conversation: &Conversation) -> Result<ModelResponse, AgentError> {
        let call = async {
            let catalog = self.tools.catalog().await;
            let request = GenerateRequest {
                messages: conversation.messages(),
                tools: &catalog,
                max_tokens: self.settings.max_tokens,
            };
            self.backend.generate(request).await
        };

        match timeout(self.settings.model_timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(AgentError::Model(e)),
            Err(_) => Err(AgentError::ModelTimeout(self.settings.model_timeout)),
        }
    }
}

fn decide(response: ModelResponse) -> Result<Decision, AgentError> {
    if response.choices.is_empty() {
        return Err(AgentError::NoResponse);
    }

    let mut text = String::new();
    let mut calls = Vec::new();
    for choice in response.choices {
        if let Some(content) = choice.content.filter(|c| !c.is_empty()) {
            text = content;
        }
        calls.extend(choice.tool_calls);
    }

    match calls.into_iter().next() {
        Some(call) => Ok(Decision::Call(call)),
        None => Ok(Decision::Answer(text)),
    }
}
