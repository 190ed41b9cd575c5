use secrecy::SecretString;

/// Header name for user-provided provider API keys (BYOK)
pub const PROVIDER_API_KEY_HEADER: &str = "X-Provider-API-Key";

/// Runtime context for provider requests
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP request parts (method, URI, headers, extensions)
    pub parts: http::request::Parts,
    /// User-provided API key that overrides the configured key
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Build a context from incoming request parts
    ///
    /// Picks up a per-request provider key from [`PROVIDER_API_KEY_HEADER`].
    /// Blank header values are ignored.
    pub fn from_parts(parts: http::request::Parts) -> Self {
        let api_key = parts
            .headers
            .get(PROVIDER_API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::from(value.to_owned()));

        Self { parts, api_key }
    }

    /// Context for direct library callers, with no headers and no provider key
    pub fn empty() -> Self {
        let (parts, ()) = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .body(())
            .expect("valid minimal request")
            .into_parts();

        Self { parts, api_key: None }
    }

    /// Access request headers
    pub const fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }
}
