//! Environment/file-driven configuration.
//!
//! An optional JSON file named by `ORCHESTRATOR_CONFIG` supplies the MCP
//! server map and tuning knobs; API keys come only from the environment
//! (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GOOGLE_API_KEY` with
//! `GEMINI_API_KEY` fallback). All state derived from this config is
//! in-memory and lost on restart.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::mcp::registry::ServerDefinition;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub mcp: McpConfig,
    pub orchestration: OrchestrationConfig,
    pub context: ContextConfig,
}

// ---------------------------------------------------------------------------
// AI providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    /// Provider used when a request names none: "claude" | "openai" | "gemini".
    pub default_provider: String,
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Filled from the environment, never from the config file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "claude".to_string(),
            ProviderConfig { api_key: None, model: "claude-sonnet-4-20250514".to_string() },
        );
        providers.insert(
            "openai".to_string(),
            ProviderConfig { api_key: None, model: "gpt-4o".to_string() },
        );
        providers.insert(
            "gemini".to_string(),
            ProviderConfig { api_key: None, model: "gemini-2.0-flash".to_string() },
        );
        Self { default_provider: "gemini".to_string(), providers }
    }
}

// ---------------------------------------------------------------------------
// MCP servers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpConfig {
    /// Configured upstream servers, keyed by server name.
    pub servers: HashMap<String, ServerDefinition>,
    /// TCP connect timeout fallback in ms, for servers that set none.
    pub connection_timeout: u64,
    /// Response timeout fallback in ms.
    pub read_timeout: u64,
    /// Reserved for future use; not applied on the critical paths.
    pub retry_attempts: u32,
    /// Period of the background health-check loop in ms.
    pub health_check_interval: u64,
    /// When false, periodic health checks are a no-op.
    pub auto_discovery_enabled: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: HashMap::new(),
            connection_timeout: 5_000,
            read_timeout: 30_000,
            retry_attempts: 3,
            health_check_interval: 60_000,
            auto_discovery_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestrationConfig {
    /// Hard cap on reason/act iterations, regardless of request preferences.
    pub default_max_steps: u32,
    /// Admission wait default in ms when a request sets none.
    pub default_timeout: u64,
    /// Size of the admission semaphore.
    pub max_concurrent_requests: usize,
    /// Reserved; surfaced in /status for operators.
    pub request_queue_size: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            default_max_steps: 10,
            default_timeout: 30_000,
            max_concurrent_requests: 10,
            request_queue_size: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextConfig {
    /// A session idle longer than this (ms) is evictable.
    pub session_timeout: u64,
    pub max_sessions: usize,
    /// Period of the expired-session sweep in ms.
    pub cleanup_interval: u64,
    /// Message log cap per session; oldest messages are trimmed first.
    pub max_history_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            session_timeout: 1_800_000,
            max_sessions: 100,
            cleanup_interval: 300_000,
            max_history_size: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load from the `ORCHESTRATOR_CONFIG` JSON file when present, then
    /// overlay API keys from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("ORCHESTRATOR_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("cannot read config file {path}: {e}"))?;
                serde_json::from_str::<AppConfig>(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid config file {path}: {e}"))?
            }
            Err(_) => AppConfig::default(),
        };

        // Server names mirror their map keys so a definition never has to
        // repeat its own name in the file.
        for (name, def) in config.mcp.servers.iter_mut() {
            if def.name.is_empty() {
                def.name = name.clone();
            }
            if def.timeout_ms == 0 {
                def.timeout_ms = config.mcp.read_timeout;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        let keys = [
            ("claude", std::env::var("ANTHROPIC_API_KEY").ok()),
            ("openai", std::env::var("OPENAI_API_KEY").ok()),
            (
                "gemini",
                std::env::var("GOOGLE_API_KEY")
                    .or_else(|_| std::env::var("GEMINI_API_KEY"))
                    .ok(),
            ),
        ];
        for (provider, key) in keys {
            if let (Some(cfg), Some(key)) = (self.ai.providers.get_mut(provider), key) {
                cfg.api_key = Some(key);
            }
        }
        if let Ok(provider) = std::env::var("ORCHESTRATOR_DEFAULT_PROVIDER") {
            self.ai.default_provider = provider;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.orchestration.default_max_steps, 10);
        assert_eq!(config.orchestration.max_concurrent_requests, 10);
        assert_eq!(config.context.max_history_size, 100);
        assert_eq!(config.context.cleanup_interval, 300_000);
        assert_eq!(config.mcp.read_timeout, 30_000);
        assert!(config.mcp.auto_discovery_enabled);
    }

    #[test]
    fn config_file_shape_parses() {
        let raw = r#"{
            "ai": { "defaultProvider": "claude" },
            "mcp": {
                "servers": {
                    "search": { "baseUrl": "http://localhost:9200", "timeoutMs": 5000 }
                },
                "autoDiscoveryEnabled": false
            },
            "orchestration": { "maxConcurrentRequests": 4 },
            "context": { "maxSessions": 7 }
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.ai.default_provider, "claude");
        assert!(!config.mcp.auto_discovery_enabled);
        assert_eq!(config.orchestration.max_concurrent_requests, 4);
        assert_eq!(config.context.max_sessions, 7);
        assert!(config.mcp.servers.contains_key("search"));
    }

    #[test]
    fn api_keys_never_serialize() {
        let mut config = AppConfig::default();
        config
            .ai
            .providers
            .get_mut("claude")
            .unwrap()
            .api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
