//! Merged catalog of local and remote tools, and name-based dispatch.

mod args;

use std::sync::Arc;

pub use args::{ArgValue, ToolArgs};

use crate::local_tools::{LocalSettings, LocalTool};
use crate::mcp::{McpGateway, RemoteTool};
use crate::models::ToolDescriptor;

/// Where a tool name routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Local(LocalTool),
    Remote(RemoteTool),
}

pub struct ToolRegistry {
    settings: LocalSettings,
    gateway: Option<Arc<McpGateway>>,
}

impl ToolRegistry {
    pub fn new(settings: LocalSettings, gateway: Option<Arc<McpGateway>>) -> Self {
        Self { settings, gateway }
    }

    pub fn local_only(settings: LocalSettings) -> Self {
        Self::new(settings, None)
    }

    pub fn settings(&self) -> &LocalSettings {
        &self.settings
    }

    pub fn gateway(&self) -> Option<&Arc<McpGateway>> {
        self.gateway.as_ref()
    }

    /// Local descriptors followed by the live remote ones.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = LocalTool::ALL.iter().map(|t| t.descriptor()).collect();
        if let Some(gateway) = &self.gateway {
            tools.extend(gateway.catalog().await);
        }
        tools
    }

    /// A registered namespace prefix always wins over a local name.
    pub fn resolve(&self, name: &str) -> Option<ToolTarget> {
        if let Some(remote) = self.gateway.as_ref().and_then(|g| g.resolve(name)) {
            return Some(ToolTarget::Remote(remote));
        }
        LocalTool::from_name(name).map(ToolTarget::Local)
    }

    /// Run a tool. Never fails: errors, including unknown names, are returned
    /// as text for the model to read.
    pub async fn invoke(&self, name: &str, args_json: &str) -> String {
        let args = ToolArgs::parse(args_json);

        match self.resolve(name) {
            Some(ToolTarget::Remote(remote)) => match &self.gateway {
                Some(gateway) => gateway.invoke(&remote, &args).await,
                None => format!("unknown tool: {}", name),
            },
            Some(ToolTarget::Local(tool)) => {
                let settings = self.settings.clone();
                // Filesystem handlers block; keep them off the async workers.
                match tokio::task::spawn_blocking(move || tool.execute(&args, &settings)).await {
                    Ok(output) => output,
                    Err(e) => format!("error: tool {} panicked: {}", name, e),
                }
            }
            None => format!("unknown tool: {}", name),
        }
    }
}
