pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod local_tools;
pub mod mcp;
pub mod models;
pub mod rag;
pub mod registry;

pub use agent::{AgentLoop, AgentSettings, Dispatcher, PoolConfig};
pub use error::{AgentError, DispatchError, LlmError, McpError};
pub use models::{Task, TaskResult};
pub use registry::ToolRegistry;
