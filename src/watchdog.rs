// Background maintenance loops
//
// Periodically performs housekeeping that must not block request handling:
// - MCP server health checks (every mcp.health_check_interval)
// - expired session cleanup (every context.cleanup_interval)

use std::time::Duration;

use crate::state::AppState;

/// Floor for both intervals so a misconfigured 0 cannot spin a hot loop.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub fn spawn(state: AppState) -> Vec<tokio::task::JoinHandle<()>> {
    let health_interval =
        Duration::from_millis(state.config.mcp.health_check_interval).max(MIN_INTERVAL);
    let cleanup_interval =
        Duration::from_millis(state.config.context.cleanup_interval).max(MIN_INTERVAL);

    let coordinator = state.coordinator.clone();
    let health = tokio::spawn(async move {
        tracing::info!(
            "health checker started (interval={}s)",
            health_interval.as_secs()
        );
        loop {
            tokio::time::sleep(health_interval).await;
            coordinator.perform_health_checks().await;
        }
    });

    let contexts = state.contexts.clone();
    let cleanup = tokio::spawn(async move {
        tracing::info!(
            "session cleanup started (interval={}s)",
            cleanup_interval.as_secs()
        );
        loop {
            tokio::time::sleep(cleanup_interval).await;
            contexts.cleanup_expired_contexts().await;
        }
    });

    vec![health, cleanup]
}
