//! Concrete reasoner adapters for Claude, OpenAI, and Gemini.
//!
//! Each adapter is a thin non-streaming chat call; the orchestration core
//! only ever sees the `Reasoner` trait. A provider without an API key is
//! simply not registered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::AiConfig;
use crate::error::OrchestrationError;
use crate::models::{OrchestrationPreferences, Tool};
use crate::reasoner::{Analysis, Reasoner, ReasonerRegistry};
use crate::sessions::ConversationContext;

/// Upper bound on a single LLM round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Register every provider that has an API key configured.
pub fn register_configured(registry: &mut ReasonerRegistry, ai: &AiConfig, client: &Client) {
    for (id, provider) in &ai.providers {
        let Some(api_key) = provider.api_key.clone() else {
            continue;
        };
        let reasoner: std::sync::Arc<dyn Reasoner> = match id.as_str() {
            "claude" => std::sync::Arc::new(ClaudeReasoner {
                client: client.clone(),
                api_key,
                model: provider.model.clone(),
            }),
            "openai" => std::sync::Arc::new(OpenAiReasoner {
                client: client.clone(),
                api_key,
                model: provider.model.clone(),
            }),
            "gemini" => std::sync::Arc::new(GeminiReasoner {
                client: client.clone(),
                api_key,
                model: provider.model.clone(),
            }),
            other => {
                tracing::warn!(provider = %other, "unknown AI provider in config, skipping");
                continue;
            }
        };
        tracing::info!(provider = %id, model = %provider.model, "registered AI provider");
        registry.register(reasoner);
    }
}

fn compose_user_content(user_message: &str, history: &str) -> String {
    if history.is_empty() {
        user_message.to_string()
    } else {
        format!("Conversation so far:\n{history}\n\nUser: {user_message}")
    }
}

fn effective_max_tokens(preferences: &OrchestrationPreferences, provider_default: u32) -> u32 {
    if preferences.max_tokens > 0 {
        preferences.max_tokens
    } else {
        provider_default
    }
}

async fn send_json(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<Value, OrchestrationError> {
    let response = request
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| OrchestrationError::Reasoner(format!("{provider} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(300).collect();
        return Err(OrchestrationError::Reasoner(format!(
            "{provider} API error ({status}): {preview}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OrchestrationError::Reasoner(format!("{provider} response is not JSON: {e}")))
}

// ---------------------------------------------------------------------------
// Claude
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ClaudeReasoner {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeReasoner {
    async fn complete(
        &self,
        system: Option<&str>,
        user_content: &str,
        preferences: &OrchestrationPreferences,
    ) -> Result<(String, u32), OrchestrationError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": effective_max_tokens(preferences, 4096),
            "messages": [{ "role": "user", "content": user_content }],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if preferences.temperature >= 0.0 {
            body["temperature"] = json!(preferences.temperature);
        }

        let response = send_json(
            self.client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body),
            "claude",
        )
        .await?;

        let text = response
            .pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestrationError::Reasoner("claude response missing text".to_string()))?
            .to_string();
        let tokens = response
            .pointer("/usage/output_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32
            + response
                .pointer("/usage/input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
        Ok((text, tokens))
    }
}

#[async_trait]
impl Reasoner for ClaudeReasoner {
    fn id(&self) -> &str {
        "claude"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &str,
        _tools: &[Tool],
        preferences: &OrchestrationPreferences,
    ) -> Result<Analysis, OrchestrationError> {
        let content = compose_user_content(user_message, history);
        let (response, tokens_used) = self
            .complete(Some(system_prompt), &content, preferences)
            .await?;
        Ok(Analysis {
            response,
            tokens_used,
            provider_id: self.id().to_string(),
        })
    }

    async fn synthesize(
        &self,
        prompt: &str,
        _ctx: &ConversationContext,
        preferences: &OrchestrationPreferences,
    ) -> Result<String, OrchestrationError> {
        let (response, _) = self.complete(None, prompt, preferences).await?;
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct OpenAiReasoner {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiReasoner {
    async fn complete(
        &self,
        system: Option<&str>,
        user_content: &str,
        preferences: &OrchestrationPreferences,
    ) -> Result<(String, u32), OrchestrationError> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut body = json!({ "model": self.model, "messages": messages });
        if preferences.max_tokens > 0 {
            body["max_tokens"] = json!(preferences.max_tokens);
        }
        if preferences.temperature >= 0.0 {
            body["temperature"] = json!(preferences.temperature);
        }

        let response = send_json(
            self.client
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body),
            "openai",
        )
        .await?;

        let text = response
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestrationError::Reasoner("openai response missing content".to_string()))?
            .to_string();
        let tokens = response
            .pointer("/usage/total_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        Ok((text, tokens))
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    fn id(&self) -> &str {
        "openai"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &str,
        _tools: &[Tool],
        preferences: &OrchestrationPreferences,
    ) -> Result<Analysis, OrchestrationError> {
        let content = compose_user_content(user_message, history);
        let (response, tokens_used) = self
            .complete(Some(system_prompt), &content, preferences)
            .await?;
        Ok(Analysis {
            response,
            tokens_used,
            provider_id: self.id().to_string(),
        })
    }

    async fn synthesize(
        &self,
        prompt: &str,
        _ctx: &ConversationContext,
        preferences: &OrchestrationPreferences,
    ) -> Result<String, OrchestrationError> {
        let (response, _) = self.complete(None, prompt, preferences).await?;
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GeminiReasoner {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiReasoner {
    async fn complete(
        &self,
        system: Option<&str>,
        user_content: &str,
        preferences: &OrchestrationPreferences,
    ) -> Result<(String, u32), OrchestrationError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let mut generation_config = json!({});
        if preferences.max_tokens > 0 {
            generation_config["maxOutputTokens"] = json!(preferences.max_tokens);
        }
        if preferences.temperature >= 0.0 {
            generation_config["temperature"] = json!(preferences.temperature);
        }

        let mut body = json!({
            "contents": [{ "parts": [{ "text": user_content }] }],
            "generationConfig": generation_config,
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = send_json(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
            "gemini",
        )
        .await?;

        let text = response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestrationError::Reasoner("gemini response missing text".to_string()))?
            .to_string();
        let tokens = response
            .pointer("/usageMetadata/totalTokenCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        Ok((text, tokens))
    }
}

#[async_trait]
impl Reasoner for GeminiReasoner {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn analyze(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &str,
        _tools: &[Tool],
        preferences: &OrchestrationPreferences,
    ) -> Result<Analysis, OrchestrationError> {
        let content = compose_user_content(user_message, history);
        let (response, tokens_used) = self
            .complete(Some(system_prompt), &content, preferences)
            .await?;
        Ok(Analysis {
            response,
            tokens_used,
            provider_id: self.id().to_string(),
        })
    }

    async fn synthesize(
        &self,
        prompt: &str,
        _ctx: &ConversationContext,
        preferences: &OrchestrationPreferences,
    ) -> Result<String, OrchestrationError> {
        let (response, _) = self.complete(None, prompt, preferences).await?;
        Ok(response)
    }
}
