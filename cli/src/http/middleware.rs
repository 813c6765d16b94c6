//! HTTP middleware stack.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing::{info, warn};

use super::stream::RUN_ID_HEADER;

pub fn create_middleware_stack(
    request_timeout: Duration,
) -> tower::layer::util::Stack<CorsLayer, TimeoutLayer> {
    tower::layer::util::Stack::new(create_cors_layer(), create_timeout_layer(request_timeout))
}

/// Browser clients are only accepted from localhost.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            |origin: &HeaderValue, _| {
                origin
                    .to_str()
                    .map(|s| {
                        s.starts_with("http://localhost")
                            || s.starts_with("https://localhost")
                            || s.starts_with("http://127.0.0.1")
                            || s.starts_with("https://127.0.0.1")
                    })
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([HeaderName::from_static(RUN_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}

/// Bounds the time to produce response headers. A streaming body is already
/// "complete" from the layer's point of view once its headers are out.
fn create_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::new(timeout)
}

pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!(
            target: "txscope.http",
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            target: "txscope.http",
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Router};
    use tower::ServiceExt;

    async fn test_handler() -> impl IntoResponse {
        "OK"
    }

    async fn slow_handler() -> impl IntoResponse {
        tokio::time::sleep(Duration::from_millis(500)).await;
        "Slow response"
    }

    #[tokio::test]
    async fn test_cors_localhost_allowed() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(create_cors_layer());

        let request = Request::builder()
            .method(Method::GET)
            .uri("/test")
            .header("Origin", "http://localhost:5173")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let cors_header = response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok());
        assert_eq!(cors_header, Some("http://localhost:5173"));
        assert!(response
            .headers()
            .get("access-control-expose-headers")
            .is_some());
    }

    #[tokio::test]
    async fn test_cors_foreign_origin_rejected() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(create_cors_layer());

        let request = Request::builder()
            .method(Method::GET)
            .uri("/test")
            .header("Origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(create_cors_layer());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/test")
            .header("Origin", "http://127.0.0.1:3000")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_success() || response.status() == StatusCode::NO_CONTENT);
        assert!(response
            .headers()
            .get("access-control-allow-methods")
            .is_some());
    }

    #[tokio::test]
    async fn test_request_logger() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn(request_logger));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_timeout_layer() {
        let app = Router::new()
            .route("/slow", get(slow_handler))
            .layer(create_timeout_layer(Duration::from_millis(50)));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/slow")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
