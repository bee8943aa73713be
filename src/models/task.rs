use crate::error::AgentError;

pub type TaskId = u64;
pub type WorkerId = usize;

/// One unit of submitted work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub prompt: String,
    pub context: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.is_empty() { None } else { Some(context) };
        self
    }

    /// Text of the initial user message.
    pub fn initial_prompt(&self) -> String {
        match self.context.as_deref() {
            Some(context) if !context.is_empty() => {
                format!("Context: {}\n\n{}", context, self.prompt)
            }
            _ => self.prompt.clone(),
        }
    }
}

/// Outcome of exactly one accepted task.
#[derive(Debug)]
pub struct TaskResult {
    pub worker_id: WorkerId,
    pub task_id: TaskId,
    pub content: String,
    pub error: Option<AgentError>,
}

impl TaskResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
