mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mcp_orchestrator::config::AppConfig;
use mcp_orchestrator::state::AppState;

use support::ScriptedReasoner;

/// Helper: app with a prose-only stub reasoner and no MCP servers.
fn test_state() -> AppState {
    support::state_with(
        AppConfig::default(),
        ScriptedReasoner::new(["Hello."], [""]),
    )
}

fn app(state: AppState) -> axum::Router {
    mcp_orchestrator::create_router(state)
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/orchestration/health
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_returns_200_with_fields() {
    let response = app(test_state())
        .oneshot(get("/api/v1/orchestration/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["app"], "mcp-orchestrator");
    assert!(json["uptimeSeconds"].is_u64());
    assert_eq!(json["providers"], json!(["scripted"]));
    assert_eq!(json["servers"]["total"], 0);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/v1/orchestration/process
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn process_single_turn_without_tools() {
    let response = app(test_state())
        .oneshot(post_json(
            "/api/v1/orchestration/process",
            json!({ "message": "Hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["response"], "Hello.");
    assert_eq!(json["executionFlow"].as_array().unwrap().len(), 1);
    assert_eq!(json["executionFlow"][0]["type"], "ai_analysis");
    assert!(json["requestId"].is_string());
    assert!(json["sessionId"].is_string());
    assert_eq!(json["metadata"]["stepsExecuted"], 1);
}

#[tokio::test]
async fn process_rejects_empty_message() {
    let response = app(test_state())
        .oneshot(post_json(
            "/api/v1/orchestration/process",
            json!({ "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn process_keeps_caller_session_id() {
    let response = app(test_state())
        .oneshot(post_json(
            "/api/v1/orchestration/process",
            json!({ "message": "Hi", "sessionId": "my-session" }),
        ))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["sessionId"], "my-session");
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/orchestration/tools
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tools_empty_without_servers() {
    let response = app(test_state())
        .oneshot(get("/api/v1/orchestration/tools"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["count"], 0);
    assert_eq!(json["tools"], json!([]));
    assert_eq!(json["servers"], json!([]));
}

#[tokio::test]
async fn tools_for_unknown_server_is_404() {
    let response = app(test_state())
        .oneshot(get("/api/v1/orchestration/tools/nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/v1/orchestration/configure
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn configure_requires_session_id() {
    let response = app(test_state())
        .oneshot(post_json(
            "/api/v1/orchestration/configure",
            json!({ "responseFormat": "summary" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn configure_persists_preferences_in_session() {
    let state = test_state();

    let response = app(state.clone())
        .oneshot(post_json(
            "/api/v1/orchestration/configure?sessionId=cfg-1",
            json!({ "responseFormat": "summary", "maxSteps": 4 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "configured");
    assert_eq!(json["sessionId"], "cfg-1");
    assert_eq!(json["preferences"]["responseFormat"], "summary");

    // The session now exists and is introspectable.
    let response = app(state)
        .oneshot(get("/api/v1/orchestration/session/cfg-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["sessionId"], "cfg-1");
    assert_eq!(json["isActive"], true);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Sessions
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sessions_list_counts_active() {
    let state = test_state();
    let _ = app(state.clone())
        .oneshot(post_json(
            "/api/v1/orchestration/process",
            json!({ "message": "Hi", "sessionId": "s1" }),
        ))
        .await
        .unwrap();

    let response = app(state)
        .oneshot(get("/api/v1/orchestration/sessions"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["activeSessions"], 1);
    assert_eq!(json["sessions"][0]["sessionId"], "s1");
    assert_eq!(json["sessions"][0]["messageCount"], 2);
}

#[tokio::test]
async fn delete_session_then_404_on_lookup() {
    let state = test_state();
    let _ = app(state.clone())
        .oneshot(post_json(
            "/api/v1/orchestration/process",
            json!({ "message": "Hi", "sessionId": "gone" }),
        ))
        .await
        .unwrap();

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/orchestration/session/gone")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "deleted");

    let response = app(state)
        .oneshot(get("/api/v1/orchestration/session/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_unknown_session_is_404() {
    let response = app(test_state())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/orchestration/session/never-existed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Maintenance endpoints
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_server_is_404() {
    let response = app(test_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/orchestration/servers/missing/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cache_invalidate_returns_200() {
    let response = app(test_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/orchestration/cache/invalidate?serverName=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "invalidated");
}

#[tokio::test]
async fn status_snapshot_has_sections() {
    let response = app(test_state())
        .oneshot(get("/api/v1/orchestration/status"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["servers"].is_object());
    assert!(json["context"]["totalSessions"].is_u64());
    assert_eq!(json["orchestration"]["maxConcurrentRequests"], 10);
}

// ═══════════════════════════════════════════════════════════════════════════
//  404 for unknown routes
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = app(test_state())
        .oneshot(get("/api/v1/orchestration/nonexistent"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
