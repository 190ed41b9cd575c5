use axum::response::IntoResponse;
use http::StatusCode;

/// Liveness probe; does not touch the providers
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
