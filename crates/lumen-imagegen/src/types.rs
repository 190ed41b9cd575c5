use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter key carrying reference images (URLs or data URIs)
pub const IMAGES_PARAM: &str = "images";

/// One generation call as received from the HTTP layer
///
/// Created per inbound request and dropped once the outcome is produced.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Text prompt, required and non-blank
    pub prompt: String,
    /// Model identifier; selects the provider and the upstream model
    pub model: String,
    /// Provider-specific passthrough (size, steps, reference images, ...)
    pub params: Map<String, Value>,
    /// Per-call key overriding the configured one
    pub api_key: Option<SecretString>,
    /// Per-call override of the async polling budget
    pub timeout: Option<Duration>,
    /// Per-call override of the async polling interval
    pub poll_interval: Option<Duration>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            params: Map::new(),
            api_key: None,
            timeout: None,
            poll_interval: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Reference images supplied under the `images` parameter
    ///
    /// Non-string and blank entries are skipped.
    pub fn image_references(&self) -> Vec<&str> {
        self.params
            .get(IMAGES_PARAM)
            .and_then(Value::as_array)
            .map(|images| {
                images
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|url| !url.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Normalized result of a successful generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Image URL or data URI
    Image { url: String },
    /// Text answer from a chat-style model
    Text { content: String },
}

impl GenerationOutcome {
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// The URL or text carried by the outcome
    pub fn payload(&self) -> &str {
        match self {
            Self::Image { url } => url,
            Self::Text { content } => content,
        }
    }
}

/// Which provider protocol serves a request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// Synchronous chat-completions provider
    Chat,
    /// Asynchronous submit-then-poll provider
    Task,
}

/// Provider-assigned identifier of one async generation job
///
/// Owned by the polling loop of a single request.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskHandle {
    task_id: String,
}

impl TaskHandle {
    pub(crate) const fn new(task_id: String) -> Self {
        Self { task_id }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// Progress of an async job as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Interpret the provider's status literal
    ///
    /// Unknown literals are treated as still running.
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUCCEED" | "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One-shot view of an async job
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GenerationOutcome>,
}

/// Entry of a provider's model listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of checking a configured provider key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /generate`
///
/// Unrecognized fields are forwarded to the provider as parameters.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: String,
    /// Falls back to the reserved chat model when omitted
    #[serde(default)]
    pub model: Option<String>,
    /// Polling budget in seconds
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Polling interval in seconds
    #[serde(default)]
    pub poll_interval: Option<f64>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}
