#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentpool::api::{Choice, GenerateRequest, ModelBackend, ModelResponse};
use agentpool::error::LlmError;
use agentpool::mcp::McpSession;
use agentpool::models::{Message, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

/// Model stub that replays scripted responses and records every request.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    fallback: Box<dyn Fn(usize) -> Result<ModelResponse, LlmError> + Send + Sync>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
    seen_tools: Mutex<Vec<Vec<String>>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Box::new(|_| Ok(ModelResponse::single(Choice::text("")))),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            seen_tools: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Answers every call with the same plain text.
    pub fn text(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::new(Vec::new()).with_fallback(move |_| Ok(ModelResponse::single(Choice::text(answer.clone()))))
    }

    /// Requests a tool on every call, forever.
    pub fn always_calls(tool: &str, args: &str) -> Self {
        let tool = tool.to_string();
        let args = args.to_string();
        Self::new(Vec::new()).with_fallback(move |n| {
            Ok(ModelResponse::single(Choice::calls(vec![ToolCall::new(
                format!("call_{}", n),
                tool.clone(),
                args.clone(),
            )])))
        })
    }

    pub fn with_fallback(
        mut self,
        fallback: impl Fn(usize) -> Result<ModelResponse, LlmError> + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn tool_names(&self) -> Vec<Vec<String>> {
        self.seen_tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.messages.to_vec());
        self.seen_tools
            .lock()
            .unwrap()
            .push(request.tools.iter().map(|t| t.name.clone()).collect());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => (self.fallback)(n),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Backend that answers with the task's own prompt text.
pub struct EchoBackend {
    pub delay: Duration,
}

#[async_trait]
impl ModelBackend for EchoBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let prompt = request
            .messages
            .first()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ModelResponse::single(Choice::text(prompt)))
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Tools advertised by a fake server. Shared so tests can change them live.
pub type FakeTools = Arc<Mutex<Vec<String>>>;

/// In-process tool server speaking newline-delimited JSON-RPC over a duplex pipe.
///
/// `tools/call` answers `<tool>:<arguments json>`. A tool named `fail` reports
/// `isError` with text `boom`; one named `rpc_error` gets a JSON-RPC error; one
/// named `hang` is never answered.
pub async fn fake_session(server: &str, tools: &[&str]) -> (McpSession, FakeTools, JoinHandle<()>) {
    let tools: FakeTools = Arc::new(Mutex::new(tools.iter().map(|t| t.to_string()).collect()));
    let (client, server_side) = tokio::io::duplex(64 * 1024);

    let served = tools.clone();
    let handle = tokio::spawn(async move {
        let (reader, mut writer) = tokio::io::split(server_side);
        let mut lines = BufReader::new(reader).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let Some(id) = message.get("id").cloned() else {
                continue;
            };

            let method = message["method"].as_str().unwrap_or_default();
            if method == "tools/call" && message["params"]["name"] == "hang" {
                continue;
            }

            let rejected = match method {
                "initialize" | "tools/list" => None,
                "tools/call" if message["params"]["name"] != "rpc_error" => None,
                other => Some(format!("unsupported {}", other)),
            };
            if let Some(reason) = rejected {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": reason }
                });
                if writer.write_all(format!("{}\n", response).as_bytes()).await.is_err() {
                    break;
                }
                continue;
            }

            let result = match method {
                "initialize" => json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": { "name": "fake", "version": "0.0.1" },
                    "capabilities": { "tools": {} }
                }),
                "tools/list" => {
                    let names = served.lock().unwrap().clone();
                    json!({
                        "tools": names.iter().map(|name| json!({
                            "name": name,
                            "description": format!("fake {}", name),
                            "inputSchema": { "type": "object", "properties": {} }
                        })).collect::<Vec<_>>()
                    })
                }
                "tools/call" => {
                    let name = message["params"]["name"].as_str().unwrap_or_default();
                    if name == "fail" {
                        json!({ "content": [{ "type": "text", "text": "boom" }], "isError": true })
                    } else {
                        json!({
                            "content": [
                                { "type": "text", "text": format!("{}:", name) },
                                { "type": "image", "data": "AAAA", "mimeType": "image/png" },
                                { "type": "text", "text": message["params"]["arguments"].to_string() }
                            ]
                        })
                    }
                }
                _ => unreachable!(),
            };

            // A notification first, to exercise skipping of unrelated messages.
            let notice = json!({ "jsonrpc": "2.0", "method": "notifications/message", "params": {} });
            let response = json!({ "jsonrpc": "2.0", "id": id, "result": result });
            let payload = format!("{}\n{}\n", notice, response);
            if writer.write_all(payload.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let (reader, writer) = tokio::io::split(client);
    let session = McpSession::from_io(server, reader, writer, Duration::from_secs(5))
        .await
        .expect("fake server handshake");

    (session, tools, handle)
}
