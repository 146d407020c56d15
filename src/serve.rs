use crate::capture::{capture_pane, CaptureError};
use crate::config::{CaptureConfig, CommandMateConfig};
use crate::extract::{extract, extract_bytes, ExtractionResult};
use crate::signals::shutdown_signal;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    capture: Arc<CaptureConfig>,
}

/// Metadata for a live session, as returned by the polling endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionMetadata {
    session: String,
    captured_at: DateTime<Utc>,
    #[serde(flatten)]
    result: ExtractionResult,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn router(config: &CommandMateConfig) -> Router {
    let state = AppState {
        capture: Arc::new(config.capture.clone()),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/extract", post(api_extract))
        .route("/api/sessions/{session}/metadata", get(api_session_metadata))
        .layer(DefaultBodyLimit::max(config.serve.max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: &CommandMateConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(config);

    let serve_config = &config.serve;
    let addr = format!("{}:{}", serve_config.bind, serve_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("serve listening on {local_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

/// Webhook entry point: the body is the raw captured output.
async fn api_extract(body: Bytes) -> Json<ExtractionResult> {
    Json(extract_bytes(&body))
}

async fn api_session_metadata(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<SessionMetadata>, ApiError> {
    let captured = capture_pane(&state.capture, &session)
        .await
        .map_err(capture_error_response)?;

    let result = extract(&captured.content);
    Ok(Json(SessionMetadata {
        session: captured.session,
        captured_at: captured.captured_at,
        result,
    }))
}

fn capture_error_response(e: CaptureError) -> ApiError {
    let status = match e {
        CaptureError::Spawn { .. } => {
            tracing::error!(error = %e, "capture unavailable");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CaptureError::InvalidTarget | CaptureError::Failed { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(serde_json::json!({"error": e.to_string()})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn config_with_tmux(command: &str) -> CommandMateConfig {
        let mut config = CommandMateConfig::default();
        config.capture.tmux_command = command.to_string();
        config
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(&CommandMateConfig::default());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_extract_all_markers() {
        let input = "📄 Session log: /home/u/.claude/2025-01-17_10-30-45_abc123.jsonl\n\
                     Request ID: abc123\n\
                     Summary: Implemented all requested changes\n\
                     ────────────────\n";
        let app = router(&CommandMateConfig::default());
        let response = app
            .oneshot(
                Request::post("/api/extract")
                    .header("content-type", "text/plain")
                    .body(Body::from(input))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["content"], input);
        assert_eq!(json["logFileName"], "2025-01-17_10-30-45_abc123.jsonl");
        assert_eq!(json["requestId"], "abc123");
        assert_eq!(json["summary"], "Implemented all requested changes");
    }

    #[tokio::test]
    async fn test_extract_plain_body_omits_fields() {
        let app = router(&CommandMateConfig::default());
        let response = app
            .oneshot(
                Request::post("/api/extract")
                    .body(Body::from("nothing to see"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json, serde_json::json!({"content": "nothing to see"}));
    }

    #[tokio::test]
    async fn test_extract_body_too_large() {
        let mut config = CommandMateConfig::default();
        config.serve.max_body_bytes = 16;
        let app = router(&config);
        let response = app
            .oneshot(
                Request::post("/api/extract")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_session_metadata_from_capture() {
        // `echo` prints the capture-pane args; the target carries the marker.
        let app = router(&config_with_tmux("echo"));
        let response = app
            .oneshot(
                Request::get("/api/sessions/Request%20ID:%20live-1/metadata")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["session"], "Request ID: live-1");
        assert_eq!(json["requestId"], "live-1");
        assert!(json.get("capturedAt").is_some());
    }

    #[tokio::test]
    async fn test_session_metadata_missing_session() {
        let app = router(&config_with_tmux("false"));
        let response = app
            .oneshot(
                Request::get("/api/sessions/nope/metadata")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("capture-pane"));
    }

    #[tokio::test]
    async fn test_session_metadata_tmux_unavailable() {
        let app = router(&config_with_tmux("nonexistent-tmux-xyz"));
        let response = app
            .oneshot(
                Request::get("/api/sessions/work/metadata")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
