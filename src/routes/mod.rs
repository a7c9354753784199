//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS,
//! and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (live frame capture)
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/assessments/types", get(http::http_list_types))
        .route("/api/v1/assessments/types/:type_id", get(http::http_get_type))
        .route(
            "/api/v1/assessments/types/:type_id/questions",
            get(http::http_get_questions),
        )
        .route(
            "/api/v1/assessments/sessions",
            post(http::http_start_session).get(http::http_list_sessions),
        )
        .route("/api/v1/assessments/sessions/:session_id/submit", post(http::http_submit))
        .route("/api/v1/assessments/sessions/:session_id/video", post(http::http_upload_video))
        .route(
            "/api/v1/assessments/recordings/:recording_id/analyze",
            post(http::http_analyze_recording),
        )
        .route(
            "/api/v1/assessments/sessions/:session_id/video-analysis",
            get(http::http_video_analysis),
        )
        .route("/api/v1/assessments/sessions/:session_id/results", get(http::http_results))
        .route("/api/v1/assessments/sessions/:session_id/download", post(http::http_download))
        .route(
            "/api/v1/assessments/sessions/:session_id",
            delete(http::http_delete_session),
        )
        .route("/api/v1/text/analyze", post(http::http_text_analyze))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::BackendConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn test_router() -> Router {
        let state = AppState::with_config(BackendConfig::default(), Analyzer::seeded(1));
        build_router(Arc::new(state))
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let res = test_router()
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_routes_require_identity() {
        let res = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/assessments/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn assessment_catalog_is_public() {
        let res = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/assessments/types")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/assessments/types/at-psychology/questions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/assessments/types/no-such-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
