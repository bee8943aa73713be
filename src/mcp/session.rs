use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::types::{InitializeResult, McpTool, McpToolResult, ServerInfo, ToolListResponse};
use crate::config::ServerConfig;
use crate::error::McpError;

// MCP Protocol constants
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ready,
    Closed,
}

impl SessionState {
    fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        }
    }
}

type Reply = oneshot::Sender<Result<Value, McpError>>;

/// Requests waiting for their response, keyed by JSON-RPC id.
#[derive(Default)]
struct Inflight {
    /// Set once the read side has hit EOF or the session was closed.
    closed: bool,
    waiting: HashMap<u64, Reply>,
}

/// A JSON-RPC session with one tool server over a pair of byte streams.
///
/// Requests are multiplexed: the writer is locked only while a request is
/// written, and a background reader routes each response to its caller by id.
/// A request the server never answers only blocks its own caller.
pub struct McpSession {
    server: String,
    server_info: Option<ServerInfo>,
    state: Mutex<SessionState>,
    writer: Mutex<Option<Box<dyn AsyncWrite + Unpin + Send>>>,
    inflight: Arc<Mutex<Inflight>>,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
}

impl McpSession {
    /// Launch `config.command` and perform the handshake over its stdio.
    pub async fn spawn(config: &ServerConfig, handshake_timeout: Duration) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(McpError::ConnectionClosed)?;
        let stdout = child.stdout.take().ok_or(McpError::ConnectionClosed)?;

        Self::establish(&config.name, stdout, stdin, Some(child), handshake_timeout).await
    }

    /// Handshake over an arbitrary reader/writer pair.
    pub async fn from_io<R, W>(
        server: &str,
        reader: R,
        writer: W,
        handshake_timeout: Duration,
    ) -> Result<Self, McpError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::establish(server, reader, writer, None, handshake_timeout).await
    }

    async fn establish<R, W>(
        server: &str,
        reader: R,
        writer: W,
        child: Option<Child>,
        handshake_timeout: Duration,
    ) -> Result<Self, McpError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let inflight = Arc::new(Mutex::new(Inflight::default()));
        let reader = tokio::spawn(read_responses(
            server.to_string(),
            BufReader::new(reader),
            inflight.clone(),
        ));

        let mut session = Self {
            server: server.to_string(),
            server_info: None,
            state: Mutex::new(SessionState::Connecting),
            writer: Mutex::new(Some(Box::new(writer))),
            inflight,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
            child: Mutex::new(child),
        };

        match timeout(handshake_timeout, session.initialize()).await {
            Ok(Ok(info)) => {
                tracing::debug!(
                    server = %session.server,
                    remote = %info.name,
                    version = %info.version,
                    "handshake complete"
                );
                session.server_info = Some(info);
                Ok(session)
            }
            Ok(Err(e)) => {
                session.close().await;
                Err(e)
            }
            Err(_) => {
                session.close().await;
                Err(McpError::HandshakeTimeout {
                    server: server.to_string(),
                    timeout: handshake_timeout,
                })
            }
        }
    }

    async fn initialize(&self) -> Result<ServerInfo, McpError> {
        let init_params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": CLIENT_VERSION
            }
        });

        let response = self.exchange("initialize", init_params).await?;
        let init_result: InitializeResult = serde_json::from_value(response)?;

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        self.write_message(&notification).await?;
        *self.state.lock().await = SessionState::Ready;

        Ok(init_result.server_info)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Every tool the server currently advertises, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let response = self.request("tools/list", params).await?;
            let page: ToolListResponse = serde_json::from_value(response)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        let response = self.request("tools/call", params).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let state = self.state().await;
        if state != SessionState::Ready {
            return Err(McpError::NotReady(state.as_str()));
        }
        self.exchange(method, params).await
    }

    async fn exchange(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut inflight = self.inflight.lock().await;
            if inflight.closed {
                return Err(McpError::ConnectionClosed);
            }
            inflight.waiting.insert(id, reply_tx);
        }

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        if let Err(e) = self.write_message(&request).await {
            self.inflight.lock().await.waiting.remove(&id);
            return Err(e);
        }

        reply_rx.await.map_err(|_| McpError::ConnectionClosed)?
    }

    async fn write_message(&self, message: &Value) -> Result<(), McpError> {
        let mut payload = serde_json::to_string(message)?;
        payload.push('\n');

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(McpError::ConnectionClosed)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
        tracing::trace!(server = %self.server, message = %payload.trim_end(), "sent");
        Ok(())
    }

    /// Close the streams and reap the child process. Safe to call repeatedly.
    /// Requests still waiting for a response fail with `ConnectionClosed`.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }

        self.writer.lock().await.take();
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        {
            let mut inflight = self.inflight.lock().await;
            inflight.closed = true;
            inflight.waiting.clear();
        }

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(server = %self.server, error = %e, "kill failed");
            }
            let _ = child.wait().await;
        }
        tracing::debug!(server = %self.server, "session closed");
    }
}

/// Route every response line to the request waiting on its id.
async fn read_responses<R>(server: String, mut reader: R, inflight: Arc<Mutex<Inflight>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(server = %server, error = %e, "read failed");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(server = %server, error = %e, line = %trimmed, "skipping non-JSON output from server");
                continue;
            }
        };

        // Notifications and server-initiated requests carry no answer for us.
        if message.get("method").is_some() {
            continue;
        }
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            continue;
        };

        let waiter = inflight.lock().await.waiting.remove(&id);
        match waiter {
            Some(reply) => {
                let _ = reply.send(into_result(message));
            }
            None => tracing::debug!(server = %server, id, "response for unknown request"),
        }
    }

    let mut inflight = inflight.lock().await;
    inflight.closed = true;
    inflight.waiting.clear();
    tracing::debug!(server = %server, "server output closed");
}

fn into_result(response: Value) -> Result<Value, McpError> {
    if let Some(error) = response.get("error") {
        return Err(McpError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}
