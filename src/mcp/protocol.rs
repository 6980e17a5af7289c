//! JSON-RPC 2.0 adapter for one MCP server.
//!
//! Speaks `initialize`, `tools/list`, and `tools/call` over HTTP POST to
//! the server's `/mcp` path. Each client owns a reqwest `Client` built from
//! the server definition: connect and response timeouts both equal to the
//! server's timeout, custom headers installed as defaults, auth applied
//! per request.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::OrchestrationError;
use crate::mcp::registry::{ServerAuth, ServerDefinition};
use crate::models::{ServerCapabilities, Tool};

/// MCP protocol revision this client negotiates.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Capability tags recognized explicitly; anything else non-null is passed
/// through by key.
const KNOWN_FEATURES: &[&str] = &["tools", "resources", "prompts", "logging"];

/// Largest response body held in memory.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[allow(dead_code)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[allow(dead_code)]
    data: Option<Value>,
}

/// Rendered outcome of a `tools/call`.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub success: bool,
}

/// Protocol adapter bound to a single server definition.
pub struct McpClient {
    server_name: String,
    endpoint: String,
    health_url: String,
    auth: ServerAuth,
    client: reqwest::Client,
}

impl McpClient {
    pub fn new(definition: &ServerDefinition) -> Result<Self, OrchestrationError> {
        let mut defaults = HeaderMap::new();
        for (key, value) in &definition.headers {
            match (HeaderName::try_from(key.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    defaults.insert(name, value);
                }
                _ => {
                    tracing::warn!(
                        server = %definition.name,
                        header = %key,
                        "skipping invalid custom header"
                    );
                }
            }
        }

        let timeout = Duration::from_millis(definition.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(defaults)
            .build()
            .map_err(|e| OrchestrationError::Internal(format!("http client for {}: {e}", definition.name)))?;

        let base = definition.base_url.trim_end_matches('/');
        Ok(Self {
            server_name: definition.name.clone(),
            endpoint: format!("{base}/mcp"),
            health_url: format!("{base}/health"),
            auth: definition.auth.clone(),
            client,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            ServerAuth::None => request,
            ServerAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            ServerAuth::Bearer { token } => request.bearer_auth(token),
            ServerAuth::Apikey { header, key } => {
                request.header(header.as_deref().unwrap_or("X-API-Key"), key)
            }
        }
    }

    /// One JSON-RPC round trip. Transport failures (send errors, timeouts,
    /// HTTP non-2xx) and protocol failures (JSON-RPC `error`, malformed
    /// body) are distinguished so the coordinator can downgrade health on
    /// the former only.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, OrchestrationError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        };

        let response = self
            .apply_auth(self.client.post(&self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::Transport(format!("{} {method}: {e}", self.server_name))
            })?;

        let status = response.status();
        let bytes = read_capped(response).await?;
        if !status.is_success() {
            let preview = String::from_utf8_lossy(&bytes);
            return Err(OrchestrationError::Transport(format!(
                "{} {method}: HTTP {status}: {}",
                self.server_name,
                truncate(&preview, 200)
            )));
        }

        let parsed: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            OrchestrationError::Protocol(format!("{} {method}: invalid JSON-RPC body: {e}", self.server_name))
        })?;

        if let Some(error) = parsed.error {
            return Err(OrchestrationError::Protocol(format!(
                "MCP error {}: {}",
                error.code, error.message
            )));
        }

        parsed
            .result
            .ok_or_else(|| OrchestrationError::Protocol(format!("{} {method}: missing result", self.server_name)))
    }

    // ── initialize ──────────────────────────────────────────────────────

    pub async fn initialize(&self) -> Result<ServerCapabilities, OrchestrationError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.call("initialize", Some(params)).await?;

        let protocol_version = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let mut supported_features = Vec::new();
        if let Some(capabilities) = result.get("capabilities").and_then(|v| v.as_object()) {
            for (key, value) in capabilities {
                if value.is_null() {
                    continue;
                }
                if !KNOWN_FEATURES.contains(&key.as_str()) {
                    tracing::debug!(
                        server = %self.server_name,
                        capability = %key,
                        "passing through unrecognized capability"
                    );
                }
                supported_features.push(key.clone());
            }
        }
        supported_features.sort();

        let server_info: HashMap<String, Value> = result
            .get("serverInfo")
            .and_then(|v| v.as_object())
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        tracing::debug!(
            server = %self.server_name,
            protocol = %protocol_version,
            features = ?supported_features,
            "initialized MCP server"
        );

        Ok(ServerCapabilities {
            protocol_version,
            supported_features,
            server_info,
        })
    }

    // ── tools/list ──────────────────────────────────────────────────────

    pub async fn list_tools(&self) -> Result<Vec<Tool>, OrchestrationError> {
        let result = self.call("tools/list", None).await?;
        let raw = result
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut tools = Vec::with_capacity(raw.len());
        for item in &raw {
            let Some(name) = item.get("name").and_then(|v| v.as_str()) else {
                tracing::warn!(server = %self.server_name, "dropping tool entry without a name");
                continue;
            };
            tools.push(Tool {
                name: name.to_string(),
                description: item
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                input_schema: item.get("inputSchema").cloned().unwrap_or_else(|| json!({})),
                server_name: self.server_name.clone(),
            });
        }
        Ok(tools)
    }

    // ── tools/call ──────────────────────────────────────────────────────

    /// Invoke a tool. The rendered output is the newline join of all `text`
    /// fields in `result.content`; when `content` is missing or empty the
    /// whole result is stringified. A JSON-RPC error becomes an
    /// `"Error: <message>"` output with success=false, handled upstream.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<ToolOutput, OrchestrationError> {
        let params = json!({ "name": tool_name, "arguments": arguments });
        let result = self.call("tools/call", Some(params)).await?;
        Ok(ToolOutput {
            text: render_content(&result),
            success: true,
        })
    }

    // ── health probe ────────────────────────────────────────────────────

    /// GET `/health`, falling back to `initialize` when the probe endpoint
    /// is absent. Any success is healthy.
    pub async fn test_connection(&self) -> bool {
        let probe = self
            .apply_auth(self.client.get(&self.health_url))
            .send()
            .await;
        match probe {
            Ok(response) if response.status().is_success() => true,
            _ => self.initialize().await.is_ok(),
        }
    }
}

fn render_content(result: &Value) -> String {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        result.to_string()
    } else {
        texts.join("\n")
    }
}

async fn read_capped(response: reqwest::Response) -> Result<Vec<u8>, OrchestrationError> {
    let mut response = response;
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| OrchestrationError::Transport(format!("reading body: {e}")))?
    {
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(OrchestrationError::Transport(format!(
                "response body exceeds {} bytes",
                MAX_BODY_BYTES
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
