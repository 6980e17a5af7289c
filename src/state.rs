use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::mcp::registry::ServerRegistry;
use crate::mcp::McpCoordinator;
use crate::orchestrator::Orchestrator;
use crate::providers;
use crate::reasoner::ReasonerRegistry;
use crate::sessions::ContextManager;

/// Shared application state. Cheap to clone; every member is behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<McpCoordinator>,
    pub contexts: Arc<ContextManager>,
    pub reasoners: Arc<ReasonerRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the full stack from configuration, registering every AI
    /// provider that has an API key.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let mut reasoners = ReasonerRegistry::new(&config.ai.default_provider);
        providers::register_configured(&mut reasoners, &config.ai, &client);
        Self::with_reasoners(config, reasoners)
    }

    /// Wire the stack around pre-built reasoners. The orchestration core
    /// accepts any `Reasoner` injection; tests use stubs.
    pub fn with_reasoners(config: AppConfig, reasoners: ReasonerRegistry) -> anyhow::Result<Self> {
        let registry = Arc::new(ServerRegistry::new(config.mcp.servers.values().cloned()));
        let coordinator = Arc::new(McpCoordinator::new(
            Arc::clone(&registry),
            config.mcp.auto_discovery_enabled,
        )?);
        let contexts = Arc::new(ContextManager::new(config.context.clone()));
        let reasoners = Arc::new(reasoners);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&coordinator),
            Arc::clone(&contexts),
            Arc::clone(&reasoners),
            config.orchestration.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            coordinator,
            contexts,
            reasoners,
            orchestrator,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
