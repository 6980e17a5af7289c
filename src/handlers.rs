//! REST surface under `/api/v1/orchestration`.
//!
//! Handlers are thin: validate, delegate to the core, shape JSON. No error
//! escapes except as a structured body; orchestration failures surface
//! inside the `OrchestrationResponse` itself.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::OrchestrationError;
use crate::models::{OrchestrationPreferences, OrchestrationRequest};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// POST /api/v1/orchestration/process
#[utoipa::path(post, path = "/api/v1/orchestration/process", tag = "orchestration",
    request_body = OrchestrationRequest,
    responses((status = 200, description = "Orchestration result", body = crate::models::OrchestrationResponse))
)]
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<OrchestrationRequest>,
) -> (StatusCode, Json<Value>) {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message cannot be empty" })),
        );
    }
    let response = state.orchestrator.process(request).await;
    (StatusCode::OK, Json(json!(response)))
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// GET /api/v1/orchestration/tools
#[utoipa::path(get, path = "/api/v1/orchestration/tools", tag = "orchestration",
    responses((status = 200, description = "All discovered tools")))]
pub async fn list_tools(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let tools = state.coordinator.get_available_tools().await;
    let mut servers: Vec<&str> = tools.iter().map(|t| t.server_name.as_str()).collect();
    servers.sort();
    servers.dedup();

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "count": tools.len(),
            "servers": servers,
            "tools": tools,
        })),
    )
}

/// GET /api/v1/orchestration/tools/{server}
#[utoipa::path(get, path = "/api/v1/orchestration/tools/{server}", tag = "orchestration",
    params(("server" = String, Path, description = "Configured server name")),
    responses(
        (status = 200, description = "Tools for one server"),
        (status = 404, description = "Server is not configured"),
    ))]
pub async fn server_tools(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.coordinator.server_tools(&server).await {
        Ok(tools) => {
            let capabilities = state.coordinator.capabilities_for(&server).await;
            let health = state
                .coordinator
                .health_report()
                .await
                .remove(&server)
                .map(|h| json!({ "healthy": h.healthy, "lastCheckedSecondsAgo": h.last_checked_seconds_ago }))
                .unwrap_or(Value::Null);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "serverName": server,
                    "count": tools.len(),
                    "tools": tools,
                    "capabilities": capabilities,
                    "health": health,
                })),
            )
        }
        Err(OrchestrationError::ServerNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Server '{server}' is not configured") })),
        ),
        Err(e) => (
            StatusCode::OK,
            Json(json!({
                "status": "error",
                "serverName": server,
                "count": 0,
                "tools": [],
                "error": e.to_string(),
            })),
        ),
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ConfigureParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// POST /api/v1/orchestration/configure?sessionId=…
#[utoipa::path(post, path = "/api/v1/orchestration/configure", tag = "orchestration",
    request_body = OrchestrationPreferences,
    params(("sessionId" = Option<String>, Query, description = "Session to store preferences in")),
    responses((status = 200, description = "Preferences stored")))]
pub async fn configure(
    State(state): State<AppState>,
    Query(params): Query<ConfigureParams>,
    Json(preferences): Json<OrchestrationPreferences>,
) -> (StatusCode, Json<Value>) {
    let Some(session_id) = params.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "sessionId query parameter is required" })),
        );
    };

    let map = match serde_json::to_value(&preferences) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Default::default(),
    };
    state.contexts.set_preferences(&session_id, map).await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "configured",
            "sessionId": session_id,
            "preferences": preferences,
        })),
    )
}

// ---------------------------------------------------------------------------
// Health & status
// ---------------------------------------------------------------------------

/// GET /api/v1/orchestration/health
#[utoipa::path(get, path = "/api/v1/orchestration/health", tag = "orchestration",
    responses((status = 200, description = "Liveness")))]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.coordinator.health_report().await;
    let healthy = report.values().filter(|h| h.healthy).count();

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "app": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeSeconds": state.uptime_seconds(),
            "providers": state.reasoners.ids(),
            "servers": { "healthy": healthy, "total": report.len() },
        })),
    )
}

/// GET /api/v1/orchestration/status
#[utoipa::path(get, path = "/api/v1/orchestration/status", tag = "orchestration",
    responses((status = 200, description = "Full system snapshot")))]
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let servers = state.coordinator.health_report().await;
    let server_count = servers.len();
    let context = state.contexts.metrics().await;
    let orchestration = state.orchestrator.config();

    (
        StatusCode::OK,
        Json(json!({
            "servers": servers,
            "totals": {
                "servers": server_count,
                "providers": state.reasoners.ids().len(),
            },
            "context": context,
            "orchestration": {
                "maxConcurrentRequests": orchestration.max_concurrent_requests,
                "requestQueueSize": orchestration.request_queue_size,
                "defaultMaxSteps": orchestration.default_max_steps,
                "availableSlots": state.orchestrator.available_slots(),
            },
        })),
    )
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// GET /api/v1/orchestration/sessions
#[utoipa::path(get, path = "/api/v1/orchestration/sessions", tag = "orchestration",
    responses((status = 200, description = "All session summaries", body = Vec<crate::models::SessionInfo>)))]
pub async fn list_sessions(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let sessions = state.contexts.session_infos().await;
    let count = sessions.len();
    let active = sessions.iter().filter(|s| s.is_active).count();
    (
        StatusCode::OK,
        Json(json!({
            "sessions": sessions,
            "count": count,
            "activeSessions": active,
        })),
    )
}

/// GET /api/v1/orchestration/session/{id}
#[utoipa::path(get, path = "/api/v1/orchestration/session/{id}", tag = "orchestration",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session summary", body = crate::models::SessionInfo),
        (status = 404, description = "Unknown session"),
    ))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.contexts.session_info(&id).await {
        Some(info) => (StatusCode::OK, Json(json!(info))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        ),
    }
}

/// DELETE /api/v1/orchestration/session/{id}
#[utoipa::path(delete, path = "/api/v1/orchestration/session/{id}", tag = "orchestration",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session evicted"),
        (status = 404, description = "Unknown session"),
    ))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if state.contexts.clear_context(&id).await {
        (StatusCode::OK, Json(json!({ "status": "deleted", "sessionId": id })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        )
    }
}

// ---------------------------------------------------------------------------
// Server maintenance
// ---------------------------------------------------------------------------

/// POST /api/v1/orchestration/servers/{name}/test
#[utoipa::path(post, path = "/api/v1/orchestration/servers/{name}/test", tag = "orchestration",
    params(("name" = String, Path, description = "Configured server name")),
    responses(
        (status = 200, description = "Health check result"),
        (status = 404, description = "Server is not configured"),
    ))]
pub async fn test_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.coordinator.test_server_connection(&name).await {
        Ok(is_healthy) => (
            StatusCode::OK,
            Json(json!({ "serverName": name, "isHealthy": is_healthy })),
        ),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Server '{name}' is not configured") })),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct InvalidateParams {
    #[serde(rename = "serverName")]
    pub server_name: Option<String>,
}

/// POST /api/v1/orchestration/cache/invalidate?serverName=…
#[utoipa::path(post, path = "/api/v1/orchestration/cache/invalidate", tag = "orchestration",
    params(("serverName" = Option<String>, Query, description = "Purge one server's cache; all when omitted")),
    responses((status = 200, description = "Cache purged")))]
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Query(params): Query<InvalidateParams>,
) -> (StatusCode, Json<Value>) {
    state
        .coordinator
        .invalidate_tool_cache(params.server_name.as_deref())
        .await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "invalidated",
            "serverName": params.server_name,
        })),
    )
}
