//! Tool-call extraction from LLM replies.
//!
//! Substring-and-parse, tolerant by contract: malformed input of any shape
//! yields an empty list, never an error. The envelope format is negotiated
//! with the prompt builder.

use serde_json::Value;

use crate::models::ToolCall;

/// Extract tool calls from a reply. Empty when the reply is terminal prose
/// or the envelope is malformed.
pub fn extract_tool_calls(text: &str) -> Vec<ToolCall> {
    // Fast reject before any parsing work.
    if !text.contains("action") || !text.contains("tool_call") {
        return Vec::new();
    }

    let Some(start) = text.find('{') else {
        return Vec::new();
    };
    let Some(end) = text.rfind('}') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let Ok(envelope) = serde_json::from_str::<Value>(&text[start..=end]) else {
        return Vec::new();
    };
    if envelope.get("action").and_then(|v| v.as_str()) != Some("tool_call") {
        return Vec::new();
    }

    let entries = envelope
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut calls = Vec::with_capacity(entries.len());
    for entry in &entries {
        let server_name = entry.get("server_name").and_then(|v| v.as_str());
        let tool_name = entry.get("tool_name").and_then(|v| v.as_str());
        match (server_name, tool_name) {
            (Some(server_name), Some(tool_name)) => calls.push(ToolCall {
                server_name: server_name.to_string(),
                tool_name: tool_name.to_string(),
                arguments: entry
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            }),
            _ => {
                tracing::warn!("skipping malformed tool_calls entry: {entry}");
            }
        }
    }
    calls
}
