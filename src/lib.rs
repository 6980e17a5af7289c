pub mod config;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod mcp;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod reasoner;
pub mod sessions;
pub mod state;
pub mod watchdog;

use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::process,
        handlers::list_tools,
        handlers::server_tools,
        handlers::configure,
        handlers::health,
        handlers::status,
        handlers::list_sessions,
        handlers::get_session,
        handlers::delete_session,
        handlers::test_server,
        handlers::invalidate_cache,
    ),
    components(schemas(
        models::OrchestrationRequest,
        models::OrchestrationPreferences,
        models::OrchestrationResponse,
        models::ResponseMetadata,
        models::ResponseStatus,
        models::ExecutionStep,
        models::StepType,
        models::ChatMessage,
        models::Role,
        models::Tool,
        models::ToolCall,
        models::ServerCapabilities,
        models::SessionInfo,
        sessions::ContextMetrics,
        mcp::coordinator::ServerHealth,
    )),
    tags((name = "orchestration", description = "AI-mediated MCP tool orchestration"))
)]
pub struct ApiDoc;

/// Build the application router with the given state. Extracted from
/// `main()` so integration tests can construct the app without binding to
/// a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/orchestration/process", post(handlers::process))
        .route("/api/v1/orchestration/tools", get(handlers::list_tools))
        .route(
            "/api/v1/orchestration/tools/{server}",
            get(handlers::server_tools),
        )
        .route("/api/v1/orchestration/configure", post(handlers::configure))
        .route("/api/v1/orchestration/health", get(handlers::health))
        .route("/api/v1/orchestration/status", get(handlers::status))
        .route("/api/v1/orchestration/sessions", get(handlers::list_sessions))
        .route(
            "/api/v1/orchestration/session/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/v1/orchestration/servers/{name}/test",
            post(handlers::test_server),
        )
        .route(
            "/api/v1/orchestration/cache/invalidate",
            post(handlers::invalidate_cache),
        )
        .route(
            "/api/v1/orchestration/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state)
}
