use http::StatusCode;
use serde::Serialize;

/// Domain error that knows how it should look over HTTP
///
/// Feature crates implement this for their error types; [`HttpError::envelope`]
/// then gives every endpoint the same `{ "error": { message, type, code } }`
/// body without the domain types depending on axum's response machinery.
pub trait HttpError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    /// Snake-case error category (e.g. `invalid_input`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;

    fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                message: self.client_message(),
                r#type: self.error_type().to_string(),
                code: self.status_code().as_u16(),
            },
        }
    }
}

/// JSON error body shared by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub r#type: String,
    pub code: u16,
}
