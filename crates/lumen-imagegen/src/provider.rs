pub(crate) mod chat;
pub(crate) mod task;

use std::future::Future;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ProviderError, Result},
    types::{GenerationOutcome, GenerationRequest, ModelInfo, TaskSnapshot},
};

/// Trait for generation provider implementations
///
/// Each implementation owns one provider's wire protocol. Adapters hold no
/// per-request state, so one instance serves any number of concurrent calls.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Run one generation and normalize its result
    ///
    /// Both the in-flight HTTP call and any polling sleep abort once
    /// `cancel` fires.
    async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<GenerationOutcome>;

    /// Whether `api_key` is accepted by the provider
    ///
    /// Implementations may spend a real, billed generation to find out.
    async fn validate_key(&self, api_key: &SecretString) -> bool;

    /// Models the provider exposes to `api_key`
    async fn list_models(&self, api_key: &SecretString) -> Result<Vec<ModelInfo>>;

    /// Current state of a previously submitted job
    async fn task_status(&self, task_id: &str, _api_key: &SecretString) -> Result<TaskSnapshot> {
        Err(ProviderError::invalid_input(
            self.name(),
            format!("provider does not track tasks (requested '{task_id}')"),
        ))
    }

    /// Get the provider name
    fn name(&self) -> &str;
}

/// Reject blank prompts before anything goes over the wire
pub(crate) fn require_prompt<'a>(provider: &str, request: &'a GenerationRequest) -> Result<&'a str> {
    if request.prompt.trim().is_empty() {
        return Err(ProviderError::invalid_input(provider, "prompt is required"));
    }

    Ok(&request.prompt)
}

/// Resolve the key attached to the request, failing fast when absent
pub(crate) fn require_key<'a>(provider: &str, request: &'a GenerationRequest) -> Result<&'a SecretString> {
    request
        .api_key
        .as_ref()
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or_else(|| ProviderError::missing_credential(provider))
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Race `future` against caller cancellation
pub(crate) async fn cancellable<F: Future>(provider: &str, cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ProviderError::cancelled(provider)),
        output = future => Ok(output),
    }
}

/// Send a provider request, mapping transport failures to upstream errors
pub(crate) async fn send(
    provider: &str,
    cancel: &CancellationToken,
    request: RequestBuilder,
    operation: &str,
) -> Result<Response> {
    cancellable(provider, cancel, request.send()).await?.map_err(|e| {
        tracing::error!(provider, error = %e, "{operation} request failed");
        ProviderError::upstream(provider, format!("failed to reach provider for {operation}: {e}")).with_source(e)
    })
}

/// Capture a non-2xx response as an upstream error
///
/// The body is kept for diagnostics only.
pub(crate) async fn upstream_failure(
    provider: &str,
    cancel: &CancellationToken,
    operation: &str,
    response: Response,
) -> ProviderError {
    let status = response.status();

    let body = match cancellable(provider, cancel, response.text()).await {
        Ok(Ok(body)) => body,
        Ok(Err(_)) => "Unknown error".to_string(),
        Err(cancelled) => return cancelled,
    };

    tracing::error!(provider, %status, "{operation} returned an error status");

    ProviderError::upstream(provider, format!("{operation} failed ({status}): {body}")).with_status(status.as_u16())
}

/// Decode a 2xx body, treating undecodable payloads as upstream errors
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    cancel: &CancellationToken,
    operation: &str,
    response: Response,
) -> Result<T> {
    let bytes = cancellable(provider, cancel, response.bytes()).await?.map_err(|e| {
        ProviderError::upstream(provider, format!("failed to read {operation} response: {e}")).with_source(e)
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!(provider, error = %e, "failed to parse {operation} response");
        ProviderError::upstream(provider, format!("invalid {operation} response: {e}")).with_source(e)
    })
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// `GET {base}/models`, shared by both provider protocols
pub(crate) async fn fetch_models(
    client: &Client,
    provider: &str,
    base_url: &str,
    api_key: &SecretString,
) -> Result<Vec<ModelInfo>> {
    let cancel = CancellationToken::new();
    let request = client.get(endpoint(base_url, "models")).bearer_auth(api_key.expose_secret());

    let response = send(provider, &cancel, request, "model listing").await?;

    if !response.status().is_success() {
        return Err(upstream_failure(provider, &cancel, "model listing", response).await);
    }

    let list: ModelList = read_json(provider, &cancel, "model listing", response).await?;

    Ok(list.data)
}
