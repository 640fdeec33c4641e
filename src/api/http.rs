//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::websocket::{handler::ws_handler, state::AppState};
use crate::hub::HubStats;
use crate::types::IngestPayload;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - dashboards are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        .route("/api/stats", get(stats))
        .route("/api/ingest", post(ingest))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptimeSecs": state.uptime_secs(),
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<HubStats> {
    Json(state.hub.stats())
}

/// Fire-and-forget ingest; malformed points are dropped server-side
async fn ingest(State(state): State<Arc<AppState>>, Json(payload): Json<IngestPayload>) -> StatusCode {
    state.hub.ingest(payload);
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::hub::TelemetryHub;
    use crate::store::MemoryStore;
    use crate::transport::ChannelTransport;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let transport = Arc::new(ChannelTransport::new(16));
        let hub = Arc::new(TelemetryHub::new(
            &RelayConfig::default(),
            Arc::new(MemoryStore::new()),
            transport.clone(),
        ));
        let state = Arc::new(AppState::new(hub, transport));
        (create_router(state.clone()), state)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_ingest_accepts_and_buffers() {
        let (app, state) = app();
        let body = r#"[{"streamKey":"cpu","value":1,"sessionId":"s1"},{"value":2}]"#;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(state.hub.writer().buffered(), 1);
        assert_eq!(state.hub.stats().malformed_points, 1);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}
