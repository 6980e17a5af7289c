//! Prompt construction.
//!
//! The system prompt and the tool-call extractor share a negotiated JSON
//! envelope: a reply requesting tools must be an object with
//! `action: "tool_call"`, a `reasoning` string, and a `tool_calls` array.

use std::collections::BTreeMap;

use crate::models::{OrchestrationPreferences, Tool};
use crate::sessions::ConversationContext;

/// Messages of history rendered into a prompt.
const HISTORY_WINDOW: usize = 10;

/// System prompt listing the tool catalog, grouped per server, with the
/// tool-call envelope directive.
pub fn system_prompt(tools: &[Tool]) -> String {
    let mut by_server: BTreeMap<&str, Vec<&Tool>> = BTreeMap::new();
    for tool in tools {
        by_server.entry(tool.server_name.as_str()).or_default().push(tool);
    }

    let mut catalog = String::new();
    for (server, tools) in &by_server {
        catalog.push_str(&format!("Server: {server}\n"));
        for tool in tools {
            catalog.push_str(&format!("  - {}: {}\n", tool.name, tool.description));
        }
    }
    if catalog.is_empty() {
        catalog.push_str("(no tools are currently available)\n");
    }

    format!(
        r#"You are an AI orchestrator with access to remote tools exposed by MCP servers.

Available tools:
{catalog}
When the user's request requires one or more tools, reply with ONLY a JSON object of this exact shape:
{{"action": "tool_call", "reasoning": "<why these tools>", "tool_calls": [{{"server_name": "<server>", "tool_name": "<tool>", "arguments": {{}}}}]}}

When no tools are needed, reply in plain prose with your answer."#
    )
}

/// Synthesis prompt over collected tool results, selected by the request's
/// response format.
pub fn synthesis_prompt(
    original_message: &str,
    tool_results: &[String],
    preferences: &OrchestrationPreferences,
) -> String {
    match preferences.response_format.as_str() {
        "summary" => {
            let results = bulleted(tool_results);
            format!(
                "Provide a concise summary answering the user's request.\n\n\
                 Request: {original_message}\n\nTool results:\n{results}"
            )
        }
        "detailed" => {
            let results = numbered(tool_results);
            format!(
                "Provide a comprehensive answer to the user's request based on the tool \
                 results below. Structure your response with these sections: a summary, \
                 key insights, recommendations, and technical detail.\n\n\
                 Request: {original_message}\n\nTool results:\n{results}"
            )
        }
        "raw" => {
            let results = numbered(tool_results);
            format!(
                "Format the raw tool results for the user without interpretation.\n\n\
                 Request: {original_message}\n\nTool results:\n{results}"
            )
        }
        _ => {
            let results = numbered(tool_results);
            format!(
                "Answer the user's request using the tool results below.\n\n\
                 Request: {original_message}\n\nTool results:\n{results}"
            )
        }
    }
}

/// The last ten messages in order, one per line, with capitalized roles.
pub fn history_text(ctx: &ConversationContext) -> String {
    let start = ctx.messages.len().saturating_sub(HISTORY_WINDOW);
    ctx.messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.display_name(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bulleted(results: &[String]) -> String {
    results
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn numbered(results: &[String]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
