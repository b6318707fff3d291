//! HTTP surface (C8): `POST /scan`, `GET /status/{job_id}`, `GET
//! /report/{job_id}`, `DELETE /scan/{job_id}`, `GET /health` (§4.8).

mod error;
mod handlers;
mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_FILES_PER_REQUEST: usize = 16;

/// Build the router. `allowed_origins` is the configured CORS allow-list
/// (§4.8); an empty list disables cross-origin requests entirely.
pub fn router(state: AppState, allowed_origins: Vec<String>, max_body_bytes: usize) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
    };

    Router::new()
        .route("/scan", post(handlers::start_scan))
        .route("/status/{job_id}", get(handlers::get_status))
        .route("/report/{job_id}", get(handlers::get_report))
        .route("/scan/{job_id}", delete(handlers::cancel_scan))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bazbom_cache::VulnCache;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let cache = VulnCache::open(dir.path().join("cache.json"), 24);
        AppState::new("http://127.0.0.1:0", cache, DEFAULT_MAX_FILES_PER_REQUEST)
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state(), vec![], DEFAULT_MAX_BODY_BYTES);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn status_for_unknown_job_is_not_found() {
        let app = router(test_state(), vec![], DEFAULT_MAX_BODY_BYTES);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_for_unknown_job_is_not_found() {
        let app = router(test_state(), vec![], DEFAULT_MAX_BODY_BYTES);
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/scan/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scan_then_status_reports_progress() {
        let app = router(test_state(), vec![], DEFAULT_MAX_BODY_BYTES);
        let body = serde_json::json!({
            "manifest_files": { "package.json": "{}" },
            "options": {}
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/scan")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
