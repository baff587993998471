use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// CORS for the browser client. `configured` is the comma-separated
/// `CORS_ALLOWED_ORIGINS` value, if set.
pub fn create_cors_layer(configured: Option<&str>) -> CorsLayer {
    let mut origins = configured.map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        if configured.is_some() {
            tracing::warn!("CORS: no usable origin in CORS_ALLOWED_ORIGINS, using defaults");
        }
        origins = parse_origins(DEFAULT_ALLOWED_ORIGINS);
    }
    tracing::info!(count = origins.len(), "CORS: allowed origins configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Splits a comma-separated origin list, dropping blanks and values that are
/// not valid header values.
fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "CORS: ignoring invalid origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_parse_origins_skips_blank_and_invalid() {
        let origins =
            parse_origins("https://tickets.example.com, ,bad\u{7f}origin,http://localhost:5173");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://tickets.example.com");
    }

    #[test]
    fn test_default_origins_parse() {
        assert_eq!(parse_origins(DEFAULT_ALLOWED_ORIGINS).len(), 2);
    }

    async fn preflight(layer: CorsLayer, origin: &str) -> Option<HeaderValue> {
        let app = Router::new().route("/", get(|| async { "ok" })).layer(layer);
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn test_configured_origin_is_allowed() {
        let layer = create_cors_layer(Some("https://tickets.example.com"));
        let allowed = preflight(layer, "https://tickets.example.com").await;
        assert_eq!(allowed.unwrap(), "https://tickets.example.com");
    }

    #[tokio::test]
    async fn test_unknown_origin_is_not_echoed() {
        let layer = create_cors_layer(Some("https://tickets.example.com"));
        assert!(preflight(layer, "https://evil.example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_unusable_config_falls_back_to_defaults() {
        let layer = create_cors_layer(Some(" , "));
        let allowed = preflight(layer, "http://localhost:5173").await;
        assert_eq!(allowed.unwrap(), "http://localhost:5173");
    }
}
