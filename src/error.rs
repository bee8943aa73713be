use std::time::Duration;

/// Failures of the model-generation capability itself.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Terminal failure of one agent loop execution.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model error: {0}")]
    Model(#[from] LlmError),

    #[error("model call timed out after {0:?}")]
    ModelTimeout(Duration),

    #[error("no response from model")]
    NoResponse,

    #[error("agent hit max tool rounds ({rounds})")]
    RoundBudgetExceeded { rounds: usize },

    #[error("conversation protocol violation: {0}")]
    Conversation(String),
}

impl AgentError {
    /// The round budget is a circuit breaker, not a transient fault.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, AgentError::RoundBudgetExceeded { .. })
    }
}

/// Errors raised by an external tool server session.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("handshake with '{server}' timed out after {timeout:?}")]
    HandshakeTimeout { server: String, timeout: Duration },

    #[error("server closed the connection")]
    ConnectionClosed,

    #[error("namespace '{prefix}' of server '{server}' overlaps server '{existing}'")]
    NamespaceConflict {
        server: String,
        existing: String,
        prefix: String,
    },

    #[error("session is not ready (state: {0})")]
    NotReady(&'static str),
}

/// Submission to a dispatcher whose input side is already closed.
#[derive(Debug, thiserror::Error)]
#[error("task queue is closed, task {task_id} was not accepted")]
pub struct DispatchError {
    pub task_id: u64,
}
