mod message;
mod task;
mod tool;

pub use message::{Conversation, Message, Role};
pub use task::{Task, TaskId, TaskResult, WorkerId};
pub use tool::{FunctionCall, ToolCall, ToolDescriptor};
