//! Shared fixtures: a scriptable reasoner stub and an in-process mock MCP
//! server bound to an ephemeral port.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use mcp_orchestrator::config::AppConfig;
use mcp_orchestrator::error::OrchestrationError;
use mcp_orchestrator::mcp::registry::ServerDefinition;
use mcp_orchestrator::models::{OrchestrationPreferences, Tool};
use mcp_orchestrator::reasoner::{Analysis, Reasoner, ReasonerRegistry};
use mcp_orchestrator::sessions::ConversationContext;
use mcp_orchestrator::state::AppState;

// ---------------------------------------------------------------------------
// Scripted reasoner
// ---------------------------------------------------------------------------

/// Replays queued analyze/synthesize replies in order; the last reply
/// repeats once the queue drains.
#[derive(Debug)]
pub struct ScriptedReasoner {
    analyses: Mutex<VecDeque<String>>,
    syntheses: Mutex<VecDeque<String>>,
    pub analyze_calls: AtomicUsize,
    pub synthesize_calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(
        analyses: impl IntoIterator<Item = impl Into<String>>,
        syntheses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            analyses: Mutex::new(analyses.into_iter().map(Into::into).collect()),
            syntheses: Mutex::new(syntheses.into_iter().map(Into::into).collect()),
            analyze_calls: AtomicUsize::new(0),
            synthesize_calls: AtomicUsize::new(0),
        })
    }

    fn next(queue: &Mutex<VecDeque<String>>) -> String {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn analyze(
        &self,
        _system_prompt: &str,
        _user_message: &str,
        _history: &str,
        _tools: &[Tool],
        _preferences: &OrchestrationPreferences,
    ) -> Result<Analysis, OrchestrationError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Analysis {
            response: Self::next(&self.analyses),
            tokens_used: 11,
            provider_id: "scripted".to_string(),
        })
    }

    async fn synthesize(
        &self,
        _prompt: &str,
        _ctx: &ConversationContext,
        _preferences: &OrchestrationPreferences,
    ) -> Result<String, OrchestrationError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::next(&self.syntheses))
    }
}

/// The tool-call envelope the prompt builder documents.
pub fn tool_call_envelope(server: &str, tool: &str, arguments: Value) -> String {
    json!({
        "action": "tool_call",
        "reasoning": "the request needs a tool",
        "tool_calls": [{ "server_name": server, "tool_name": tool, "arguments": arguments }],
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub fn state_with(config: AppConfig, reasoner: Arc<dyn Reasoner>) -> AppState {
    let mut registry = ReasonerRegistry::new("scripted");
    registry.register(reasoner);
    AppState::with_reasoners(config, registry).expect("state construction")
}

pub fn config_with_server(name: &str, base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.mcp.servers.insert(
        name.to_string(),
        ServerDefinition {
            name: name.to_string(),
            base_url: base_url.to_string(),
            timeout_ms: 2_000,
            ..ServerDefinition::default()
        },
    );
    config
}

// ---------------------------------------------------------------------------
// Mock MCP server
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct McpCounters {
    pub initialize: AtomicUsize,
    pub list_tools: AtomicUsize,
    pub call_tool: AtomicUsize,
}

#[derive(Clone)]
struct MockState {
    counters: Arc<McpCounters>,
    tools: Vec<(String, String)>,
    call_reply: String,
}

pub struct MockMcpServer {
    pub base_url: String,
    pub counters: Arc<McpCounters>,
}

/// Serve `/mcp` (JSON-RPC) and `/health` on 127.0.0.1:0. Every listed tool
/// answers `tools/call` with the same text reply.
pub async fn spawn_mcp_server(tools: &[(&str, &str)], call_reply: &str) -> MockMcpServer {
    let counters = Arc::new(McpCounters::default());
    let state = MockState {
        counters: Arc::clone(&counters),
        tools: tools
            .iter()
            .map(|(n, d)| (n.to_string(), d.to_string()))
            .collect(),
        call_reply: call_reply.to_string(),
    };

    let app = Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route("/health", get(|| async { "ok" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });

    MockMcpServer {
        base_url: format!("http://{addr}"),
        counters,
    }
}

async fn mcp_endpoint(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let method = body.get("method").and_then(|m| m.as_str()).unwrap_or("");

    let result = match method {
        "initialize" => {
            state.counters.initialize.fetch_add(1, Ordering::SeqCst);
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {}, "logging": null, "experimental": {} },
                "serverInfo": { "name": "mock-mcp", "version": "0.0.1" },
            })
        }
        "tools/list" => {
            state.counters.list_tools.fetch_add(1, Ordering::SeqCst);
            let tools: Vec<Value> = state
                .tools
                .iter()
                .map(|(name, description)| {
                    json!({
                        "name": name,
                        "description": description,
                        "inputSchema": { "type": "object", "properties": {} },
                    })
                })
                .collect();
            json!({ "tools": tools })
        }
        "tools/call" => {
            state.counters.call_tool.fetch_add(1, Ordering::SeqCst);
            let requested = body.pointer("/params/name").and_then(|n| n.as_str());
            let known = state.tools.iter().any(|(n, _)| Some(n.as_str()) == requested);
            if !known {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32602, "message": format!("unknown tool {requested:?}") },
                }));
            }
            json!({ "content": [{ "type": "text", "text": state.call_reply }] })
        }
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not found: {other}") },
            }));
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

pub fn preferences(entries: &[(&str, Value)]) -> OrchestrationPreferences {
    let map: HashMap<String, Value> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    serde_json::from_value(json!(map)).expect("valid preferences")
}
