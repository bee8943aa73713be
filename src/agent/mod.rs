//! Per-task agent loop and the worker pool that runs it.

mod agent_loop;
mod pool;

pub use agent_loop::{AgentLoop, AgentRun, AgentSettings};
pub use pool::{Dispatcher, PoolConfig};
