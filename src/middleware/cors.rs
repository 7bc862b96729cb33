use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use url::Url;

/// CORS for the browser client served from `frontend`. Falls back to any
/// origin when the frontend origin cannot be expressed as a header value.
pub fn frontend_cors(frontend: &Url) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(&frontend.origin().ascii_serialization()) {
        Ok(origin) if frontend.has_host() => layer.allow_origin(origin),
        _ => {
            warn!(%frontend, "Frontend origin unusable for CORS, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}
