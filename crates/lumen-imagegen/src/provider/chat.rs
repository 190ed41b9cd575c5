use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{ProviderAdapter, endpoint, fetch_models, read_json, require_key, require_prompt, send, upstream_failure};
use crate::{
    error::Result,
    http_client::http_client,
    normalize::{self, ChatCompletion},
    types::{GenerationOutcome, GenerationRequest, ModelInfo},
};

/// Default `OpenRouter` API base URL
pub(crate) const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Prompt used to probe a key with a real generation
const VALIDATION_PROMPT: &str = "test";

/// Synchronous chat-completions provider
///
/// One request, one HTTP call. The generated image comes back embedded in
/// the assistant message.
pub(crate) struct ChatCompletionsProvider {
    name: String,
    client: Client,
    base_url: String,
    default_model: String,
}

impl ChatCompletionsProvider {
    pub fn new(name: String, base_url: Option<String>, default_model: String) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            name,
            client: http_client(),
            base_url,
            default_model,
        }
    }
}

/// Wire format for the chat-completions request
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatRequestMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageRef<'a> },
}

#[derive(Serialize)]
struct ImageRef<'a> {
    url: &'a str,
}

impl<'a> ChatRequest<'a> {
    /// The prompt first, then every reference image in request order
    fn new(model: &'a str, prompt: &'a str, images: &[&'a str]) -> Self {
        let content = std::iter::once(ContentPart::Text { text: prompt })
            .chain(images.iter().copied().map(|url| ContentPart::ImageUrl {
                image_url: ImageRef { url },
            }))
            .collect();

        Self {
            model,
            messages: [ChatRequestMessage { role: "user", content }],
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsProvider {
    async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<GenerationOutcome> {
        let prompt = require_prompt(&self.name, request)?;
        let api_key = require_key(&self.name, request)?;

        let images = request.image_references();
        let wire_request = ChatRequest::new(&self.default_model, prompt, &images);

        tracing::debug!(
            provider = %self.name,
            model = %self.default_model,
            images = images.len(),
            "sending chat completion request"
        );

        let http_request = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(api_key.expose_secret())
            .json(&wire_request);

        let response = send(&self.name, cancel, http_request, "chat completion").await?;

        if !response.status().is_success() {
            return Err(upstream_failure(&self.name, cancel, "chat completion", response).await);
        }

        let completion: ChatCompletion = read_json(&self.name, cancel, "chat completion", response).await?;
        let outcome = normalize::embedded_message(&completion);

        tracing::debug!(provider = %self.name, image = outcome.is_image(), "chat completion complete");

        Ok(outcome)
    }

    /// Runs a real, billable generation with a trivial prompt
    ///
    /// The provider has no free validation endpoint; keep this off hot paths.
    async fn validate_key(&self, api_key: &SecretString) -> bool {
        let probe = GenerationRequest::new(VALIDATION_PROMPT, self.default_model.as_str()).with_api_key(api_key.clone());

        match self.generate(&probe, &CancellationToken::new()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = %self.name, error = %e, "key validation failed");
                false
            }
        }
    }

    async fn list_models(&self, api_key: &SecretString) -> Result<Vec<ModelInfo>> {
        fetch_models(&self.client, &self.name, &self.base_url, api_key).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
