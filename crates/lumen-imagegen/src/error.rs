use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lumen_core::HttpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Classification of a generation failure
///
/// Callers branch on the kind alone; the provider name and message are
/// diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Empty prompt or otherwise malformed request
    InvalidInput,
    /// No API key configured or supplied for the selected provider
    MissingCredential,
    /// Provider returned non-2xx, was unreachable, or sent a structurally invalid body
    UpstreamError,
    /// Provider reported that the generation job failed
    TaskFailed,
    /// Polling budget exhausted before the job reached a terminal state
    Timeout,
    /// Job finished successfully but carried no extractable result
    MalformedResponse,
    /// Caller gave up on the request before it completed
    Cancelled,
}

/// Failure raised by a provider adapter or the dispatcher
#[derive(Debug, Error)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    provider: String,
    message: String,
    upstream_status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
            upstream_status: None,
            source: None,
        }
    }

    pub fn invalid_input(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, provider, message)
    }

    pub fn missing_credential(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = format!("no API key configured for provider '{provider}'");
        Self::new(ErrorKind::MissingCredential, provider, message)
    }

    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamError, provider, message)
    }

    pub fn cancelled(provider: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, provider, "request cancelled by caller")
    }

    /// Attach the HTTP status returned by the provider
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status the provider answered with, when the failure came from a response
    pub const fn upstream_status(&self) -> Option<u16> {
        self.upstream_status
    }
}

impl HttpError for ProviderError {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::UpstreamError | ErrorKind::TaskFailed | ErrorKind::MalformedResponse => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_type(&self) -> &str {
        self.kind.as_ref()
    }

    fn client_message(&self) -> String {
        self.message.clone()
    }
}

impl IntoResponse for ProviderError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}
