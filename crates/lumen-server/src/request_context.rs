use axum::{extract::Request, middleware::Next, response::Response};
use lumen_core::RequestContext;

/// Middleware that attaches a [`RequestContext`] to every request
///
/// Handlers read the per-call provider key from it instead of parsing
/// headers themselves.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let context = RequestContext::from_parts(parts.clone());

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    next.run(request).await
}
