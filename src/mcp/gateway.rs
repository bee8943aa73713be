use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;

use super::session::McpSession;
use crate::config::ServerConfig;
use crate::error::McpError;
use crate::models::ToolDescriptor;
use crate::registry::ToolArgs;

/// Namespace prefix for a server's tools: `mcp_<name>` with every character
/// outside `[A-Za-z0-9]` replaced by `_`.
pub fn namespace_prefix(server_name: &str) -> String {
    let sanitized: String = server_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("mcp_{}", sanitized)
}

pub fn namespaced_name(prefix: &str, tool_name: &str) -> String {
    format!("{}_{}", prefix, tool_name)
}

/// Two prefixes overlap when they are equal or one is the other plus `_...`.
/// Overlapping prefixes can produce the same exposed name for different tools.
fn prefixes_overlap(a: &str, b: &str) -> bool {
    fn nests(outer: &str, inner: &str) -> bool {
        outer
            .strip_prefix(inner)
            .is_some_and(|rest| rest.starts_with('_'))
    }
    a == b || nests(a, b) || nests(b, a)
}

/// One live tool server.
pub struct ExternalConnection {
    name: String,
    prefix: String,
    session: McpSession,
    tools: Vec<String>,
}

impl ExternalConnection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn session(&self) -> &McpSession {
        &self.session
    }

    /// Tool names advertised when the connection was established.
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    fn strip<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
    }
}

/// A remote tool resolved to its owning connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTool {
    connection: usize,
    pub server: String,
    pub tool: String,
}

/// Bridges the registry to every configured tool server.
///
/// The connection set is fixed once built.
#[derive(Default)]
pub struct McpGateway {
    connections: Vec<ExternalConnection>,
}

impl McpGateway {
    /// Connect to every configured server. Failures are logged and the server
    /// is left out; this never fails as a whole.
    pub async fn connect(configs: &[ServerConfig], handshake_timeout: Duration) -> Self {
        let attempts = configs.iter().map(|cfg| async move {
            let session = McpSession::spawn(cfg, handshake_timeout).await;
            (cfg.name.clone(), session)
        });

        let mut gateway = Self::default();
        for (name, session) in join_all(attempts).await {
            match session {
                Ok(session) => {
                    if let Err(e) = gateway.attach(&name, session).await {
                        tracing::warn!(server = %name, error = %e, "skipping tool server");
                    }
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "failed to connect to tool server");
                }
            }
        }
        gateway
    }

    /// Register an already established session. On failure the session is closed.
    ///
    /// A server whose namespace prefix overlaps an attached one is rejected, so
    /// every exposed name maps to exactly one server.
    pub async fn attach(&mut self, name: &str, session: McpSession) -> Result<(), McpError> {
        let prefix = namespace_prefix(name);
        if let Some(existing) = self
            .connections
            .iter()
            .find(|conn| prefixes_overlap(&conn.prefix, &prefix))
        {
            let conflict = McpError::NamespaceConflict {
                server: name.to_string(),
                existing: existing.name.clone(),
                prefix,
            };
            session.close().await;
            return Err(conflict);
        }

        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        let tools: Vec<String> = tools.into_iter().map(|t| t.name).collect();

        tracing::info!(server = %name, tools = tools.len(), "connected to tool server");

        self.connections.push(ExternalConnection {
            name: name.to_string(),
            prefix,
            session,
            tools,
        });
        Ok(())
    }

    pub fn connections(&self) -> &[ExternalConnection] {
        &self.connections
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Match `name` to its owning connection. Prefixes never overlap, so at
    /// most one connection matches.
    pub fn resolve(&self, name: &str) -> Option<RemoteTool> {
        self.connections
            .iter()
            .enumerate()
            .find_map(|(connection, conn)| {
                conn.strip(name).map(|tool| RemoteTool {
                    connection,
                    server: conn.name.clone(),
                    tool: tool.to_string(),
                })
            })
    }

    /// Live descriptors from every connection, re-queried on each call.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        let listings = join_all(self.connections.iter().map(|conn| async move {
            (conn, conn.session.list_tools().await)
        }))
        .await;

        let mut descriptors = Vec::new();
        let mut seen = HashSet::new();
        for (conn, listing) in listings {
            match listing {
                Ok(tools) => {
                    for tool in tools {
                        let name = namespaced_name(&conn.prefix, &tool.name);
                        if !seen.insert(name.clone()) {
                            tracing::warn!(server = %conn.name, tool = %tool.name, "duplicate tool name, skipping");
                            continue;
                        }
                        descriptors.push(ToolDescriptor {
                            name,
                            description: format!(
                                "[MCP:{}] {}",
                                conn.name,
                                tool.description.unwrap_or_default()
                            ),
                            parameters: tool.input_schema,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(server = %conn.name, error = %e, "failed to refresh tools");
                }
            }
        }
        descriptors
    }

    /// Forward a call. Errors come back as text.
    pub async fn invoke(&self, target: &RemoteTool, args: &ToolArgs) -> String {
        let Some(conn) = self.connections.get(target.connection) else {
            return format!("MCP error: no connection for server '{}'", target.server);
        };

        match conn.session.call_tool(&target.tool, args.to_json()).await {
            Ok(result) if result.is_error() => format!("MCP tool error: {}", result.text()),
            Ok(result) => result.text(),
            Err(e) => format!("MCP error: {}", e),
        }
    }

    pub async fn close(&self) {
        join_all(self.connections.iter().map(|conn| conn.session.close())).await;
    }
}
