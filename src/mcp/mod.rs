//! External tool servers spoken to over stdio (Model Context Protocol).

mod gateway;
mod session;
pub mod types;

pub use gateway::{namespace_prefix, namespaced_name, ExternalConnection, McpGateway, RemoteTool};
pub use session::{McpSession, SessionState};
pub use types::{McpTool, McpToolResult, ToolContent};
