//! Tool cache and dispatch coordinator.
//!
//! Fans tool discovery out across every enabled, healthy server
//! concurrently, caches the results, tracks per-server capabilities, and
//! dispatches `tools/call` invocations. Per-server failures are isolated:
//! discovery never fails as a whole, and a failed dispatch is recorded as a
//! failed execution step rather than an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::error::OrchestrationError;
use crate::mcp::protocol::McpClient;
use crate::mcp::registry::{ServerEntry, ServerRegistry};
use crate::models::{ExecutionStep, ServerCapabilities, StepType, Tool, ToolCall};

/// A cache entry older than this (measured against the server's last health
/// check) must not be served without re-discovery.
pub const TOOL_CACHE_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    tools: Vec<Tool>,
    #[allow(dead_code)]
    discovered_at: Instant,
}

/// Per-server health view for introspection endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub healthy: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_seconds_ago: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ServerCapabilities>,
}

pub struct McpCoordinator {
    registry: Arc<ServerRegistry>,
    clients: HashMap<String, Arc<McpClient>>,
    tool_cache: RwLock<HashMap<String, CacheEntry>>,
    capabilities: RwLock<HashMap<String, ServerCapabilities>>,
    auto_discovery_enabled: bool,
}

impl McpCoordinator {
    pub fn new(
        registry: Arc<ServerRegistry>,
        auto_discovery_enabled: bool,
    ) -> Result<Self, OrchestrationError> {
        let mut clients = HashMap::new();
        for entry in registry.iter() {
            let client = McpClient::new(&entry.definition)?;
            clients.insert(entry.definition.name.clone(), Arc::new(client));
        }
        Ok(Self {
            registry,
            clients,
            tool_cache: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(HashMap::new()),
            auto_discovery_enabled,
        })
    }

    fn client(&self, server_name: &str) -> Result<Arc<McpClient>, OrchestrationError> {
        self.clients
            .get(server_name)
            .cloned()
            .ok_or_else(|| OrchestrationError::ServerNotFound(server_name.to_string()))
    }

    // ── Discovery ───────────────────────────────────────────────────────

    /// Aggregate tools from every enabled, healthy server, discovered
    /// concurrently and joined. Failures are logged per server and
    /// contribute an empty list; the aggregate is sorted by
    /// `(server_name, tool_name)` for deterministic presentation.
    pub async fn get_available_tools(&self) -> Vec<Tool> {
        let entries = self.registry.enabled_healthy();
        let discoveries = entries.iter().map(|entry| async move {
            (
                entry.definition.name.as_str(),
                self.discover_server(entry).await,
            )
        });

        let mut tools = Vec::new();
        for (name, result) in join_all(discoveries).await {
            match result {
                Ok(mut discovered) => tools.append(&mut discovered),
                Err(e) => tracing::warn!(server = %name, error = %e, "tool discovery failed"),
            }
        }

        tools.sort_by(|a, b| {
            (a.server_name.as_str(), a.name.as_str()).cmp(&(b.server_name.as_str(), b.name.as_str()))
        });
        tools
    }

    /// Tools for one server, re-discovering when the cache is stale. For a
    /// disabled or unhealthy server the cached snapshot (possibly empty) is
    /// returned without contacting it.
    pub async fn server_tools(
        &self,
        server_name: &str,
    ) -> Result<Vec<Tool>, OrchestrationError> {
        let entry = self
            .registry
            .get(server_name)
            .ok_or_else(|| OrchestrationError::ServerNotFound(server_name.to_string()))?;

        if !entry.definition.enabled || !entry.status.is_healthy() {
            let cache = self.tool_cache.read().await;
            return Ok(cache.get(server_name).map(|e| e.tools.clone()).unwrap_or_default());
        }
        self.discover_server(&entry).await
    }

    /// Per-server discovery: serve the cache while the server's last health
    /// check is fresh, initialize once when capabilities are unknown, then
    /// `tools/list` and cache. Two concurrent discoveries for the same
    /// server may both run; the last writer wins, which is idempotent.
    async fn discover_server(
        &self,
        entry: &Arc<ServerEntry>,
    ) -> Result<Vec<Tool>, OrchestrationError> {
        let name = &entry.definition.name;

        if entry.status.checked_within(TOOL_CACHE_TTL) {
            if let Some(cached) = self.tool_cache.read().await.get(name) {
                return Ok(cached.tools.clone());
            }
        }

        let client = self.client(name)?;

        let capabilities_known = self.capabilities.read().await.contains_key(name);
        if !capabilities_known {
            match client.initialize().await {
                Ok(capabilities) => {
                    self.capabilities
                        .write()
                        .await
                        .insert(name.clone(), capabilities);
                    entry.status.mark(true, Instant::now());
                }
                Err(e) => {
                    entry.status.mark(false, Instant::now());
                    return Err(e);
                }
            }
        }

        let tools = client.list_tools().await?;
        self.tool_cache.write().await.insert(
            name.clone(),
            CacheEntry {
                tools: tools.clone(),
                discovered_at: Instant::now(),
            },
        );
        tracing::debug!(server = %name, count = tools.len(), "discovered tools");
        Ok(tools)
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Execute one tool call. Pre-dispatch refusals (unknown, disabled,
    /// unhealthy server) and downstream failures all produce a failed step;
    /// transport-level collapse additionally flips the server unhealthy.
    pub async fn execute_tool(&self, call: &ToolCall) -> ExecutionStep {
        let started_at = Utc::now();
        let clock = Instant::now();

        let result = self.dispatch(call).await;

        let mut step = ExecutionStep::new(
            StepType::McpCall,
            started_at,
            clock.elapsed().as_millis() as u64,
        );
        step.server_name = Some(call.server_name.clone());
        step.tool_name = Some(call.tool_name.clone());
        step.input = call.arguments.to_string();
        match result {
            Ok(output) => {
                step.output = output.text;
                step.success = output.success;
            }
            Err(e) => {
                step.output = format!("Error: {e}");
                step.success = false;
            }
        }
        step.metadata
            .insert("server".to_string(), json!(call.server_name));
        step
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
    ) -> Result<crate::mcp::protocol::ToolOutput, OrchestrationError> {
        let entry = self
            .registry
            .get(&call.server_name)
            .ok_or_else(|| OrchestrationError::ServerNotFound(call.server_name.clone()))?;
        if !entry.definition.enabled {
            return Err(OrchestrationError::ServerDisabled(call.server_name.clone()));
        }
        if !entry.status.is_healthy() {
            return Err(OrchestrationError::ServerUnhealthy(call.server_name.clone()));
        }

        let client = self.client(&call.server_name)?;
        let outcome = client.call_tool(&call.tool_name, &call.arguments).await;
        if let Err(e) = &outcome {
            if e.is_transport() {
                tracing::warn!(
                    server = %call.server_name,
                    error = %e,
                    "transport failure, marking server unhealthy"
                );
                entry.status.mark(false, Instant::now());
            }
        }
        outcome
    }

    // ── Health ──────────────────────────────────────────────────────────

    /// Probe one server and record the outcome. On transition to unhealthy
    /// the server's cache entries are purged.
    pub async fn test_server_connection(
        &self,
        server_name: &str,
    ) -> Result<bool, OrchestrationError> {
        let entry = self
            .registry
            .get(server_name)
            .ok_or_else(|| OrchestrationError::ServerNotFound(server_name.to_string()))?;
        let client = self.client(server_name)?;

        let healthy = client.test_connection().await;
        entry.status.mark(healthy, Instant::now());
        if !healthy {
            self.tool_cache.write().await.remove(server_name);
            tracing::warn!(server = %server_name, "health check failed, cache purged");
        }
        Ok(healthy)
    }

    /// Periodic health sweep across every known server, run concurrently.
    /// No-op when autodiscovery is disabled.
    pub async fn perform_health_checks(&self) {
        if !self.auto_discovery_enabled {
            return;
        }

        let names = self.registry.names();
        let checks = names
            .iter()
            .map(|name| async move { self.test_server_connection(name).await.unwrap_or(false) });

        let results = join_all(checks).await;
        let healthy = results.iter().filter(|ok| **ok).count();
        tracing::info!("health checks complete: {healthy}/{} healthy", self.registry.len());
    }

    /// Purge cached tools for one server, or all of them.
    pub async fn invalidate_tool_cache(&self, server_name: Option<&str>) {
        let mut cache = self.tool_cache.write().await;
        match server_name {
            Some(name) => {
                cache.remove(name);
                tracing::info!(server = %name, "tool cache invalidated");
            }
            None => {
                cache.clear();
                tracing::info!("tool cache invalidated for all servers");
            }
        }
    }

    // ── Introspection ───────────────────────────────────────────────────

    pub async fn capabilities_for(&self, server_name: &str) -> Option<ServerCapabilities> {
        self.capabilities.read().await.get(server_name).cloned()
    }

    pub async fn health_report(&self) -> HashMap<String, ServerHealth> {
        let capabilities = self.capabilities.read().await;
        self.registry
            .iter()
            .map(|entry| {
                let name = entry.definition.name.clone();
                let health = ServerHealth {
                    healthy: entry.status.is_healthy(),
                    enabled: entry.definition.enabled,
                    last_checked_seconds_ago: entry.status.last_check().map(|at| at.elapsed().as_secs()),
                    capabilities: capabilities.get(&name).cloned(),
                };
                (name, health)
            })
            .collect()
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }
}
