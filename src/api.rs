//! REST API Server for a conversation session
//!
//! Exposes chat, summary and stored records over HTTP

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::MemoryError;
use crate::session::SessionHandle;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn failure(e: MemoryError) -> ApiResult {
    let status = match e {
        MemoryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MemoryError::SessionClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        MemoryError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!(%status, "Request failed: {}", e);

    (status, Json(ApiResponse::error(e.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub session: SessionHandle,
}

/// =============================
/// Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    info!(length = req.message.len(), "Received chat message");

    match state.session.submit(req.message).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "answer": answer }))),
        ),
        Err(e) => failure(e),
    }
}

async fn summary_handler(State(state): State<ApiState>) -> ApiResult {
    match state.session.summary().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "summary": summary,
                "display": summary.format_for_display(),
            }))),
        ),
        Err(e) => failure(e),
    }
}

async fn records_handler(State(state): State<ApiState>) -> ApiResult {
    match state.session.records().await {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::success(records))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(session: SessionHandle) -> Router {
    let state = ApiState { session };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/records", get(records_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(session: SessionHandle, port: u16) -> crate::Result<()> {
    let router = create_router(session);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::llm::ScriptedModel;
    use crate::session::Session;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(chat: ScriptedModel) -> Router {
        let (session, _updates) = Session::new(
            &MemoryConfig::default(),
            Arc::new(chat),
            Arc::new(ScriptedModel::new()),
        );
        let (handle, _task) = session.spawn();
        create_router(handle)
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, ApiResponse) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_chat(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "message": message }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_returns_answer() {
        let router = router(ScriptedModel::new().reply("Borrowing lends access."));
        let (status, body) = call(router, post_chat("What is borrowing?")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.data.unwrap()["answer"], "Borrowing lends access.");
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let (status, body) = call(router(ScriptedModel::new()), post_chat("  ")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_chat_model_failure_is_bad_gateway() {
        let router = router(ScriptedModel::new().fail("upstream down"));
        let (status, body) = call(router, post_chat("Hello")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.error.unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let request = Request::builder()
            .uri("/api/summary")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router(ScriptedModel::new()), request).await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["summary"]["core_discussion"], "empty");
        assert!(data["display"].as_str().unwrap().starts_with("Core"));
    }
}
