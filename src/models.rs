use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A remote callable discovered from an MCP server.
///
/// `(server_name, name)` uniquely identifies a tool at a point in time; tool
/// identity is not stable across discoveries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Opaque JSON Schema for the tool's input parameters.
    pub input_schema: Value,
    /// Originating server, attached at discovery time.
    pub server_name: String,
}

/// One tool invocation requested by the reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub server_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Capabilities reported by a server's `initialize` response.
///
/// Replaced wholesale on re-initialize, never mutated piecewise.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub protocol_version: String,
    pub supported_features: Vec<String>,
    #[serde(default)]
    pub server_info: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Capitalized form used when rendering conversation history.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    AiAnalysis,
    McpCall,
    Synthesis,
}

/// Immutable record of one operation, appended to the per-request execution
/// flow and to the session's execution history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub input: String,
    pub output: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionStep {
    pub fn new(step_type: StepType, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            step_type,
            started_at,
            duration_ms,
            server_name: None,
            tool_name: None,
            input: String::new(),
            output: String::new(),
            success: true,
            metadata: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub preferences: OrchestrationPreferences,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Per-request options. Every field has a serde default so an empty
/// `preferences` object is valid.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestrationPreferences {
    /// Upper bound on LLM/tool iterations.
    pub max_steps: u32,
    /// Admission wait timeout in milliseconds.
    pub timeout: u64,
    /// Advisory only; does not alter routing.
    pub preferred_servers: Vec<String>,
    /// Selects the synthesis template: "detailed" | "summary" | "raw".
    pub response_format: String,
    /// Advisory for the presenting layer.
    pub include_metadata: bool,
    /// Selects the reasoner implementation.
    pub ai_provider: Option<String>,
    /// 0 means the provider default.
    pub max_tokens: u32,
    /// Negative means the provider default.
    pub temperature: f64,
}

impl Default for OrchestrationPreferences {
    fn default() -> Self {
        Self {
            max_steps: 10,
            timeout: 30_000,
            preferred_servers: Vec::new(),
            response_format: "detailed".to_string(),
            include_metadata: true,
            ai_provider: None,
            max_tokens: 0,
            temperature: -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_duration_ms: u64,
    pub steps_executed: usize,
    /// Distinct server names observed in the execution flow.
    pub servers_used: Vec<String>,
    /// Distinct tool names observed in the execution flow.
    pub tools_used: Vec<String>,
    pub performance: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResponse {
    pub request_id: String,
    pub session_id: String,
    pub status: ResponseStatus,
    pub response: String,
    pub execution_flow: Vec<ExecutionStep>,
    pub metadata: ResponseMetadata,
}

// ---------------------------------------------------------------------------
// Session introspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub message_count: usize,
    /// Distinct tool names from the session's tool snapshot.
    pub tool_names: Vec<String>,
    /// Distinct server names from the session's tool snapshot.
    pub server_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
}
