//! Image generation over two provider protocols
//!
//! A synchronous chat-completions provider and an asynchronous
//! submit-then-poll provider sit behind one [`Dispatcher`], which routes by
//! model id and reports failures through a single [`ErrorKind`] taxonomy.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod dispatcher;
mod error;
mod http_client;
pub mod normalize;
pub mod poller;
mod provider;
mod types;

use std::{sync::Arc, time::Duration};

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use lumen_core::RequestContext;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub use dispatcher::{CHAT_PROVIDER_NAME, Dispatcher, DispatcherBuilder, TASK_PROVIDER_NAME};
pub use error::{ErrorKind, ProviderError, Result};
pub use provider::ProviderAdapter;
pub use types::{
    GenerateBody, GenerationOutcome, GenerationRequest, IMAGES_PARAM, KeyStatus, ModelInfo, ProviderKind,
    TaskHandle, TaskSnapshot, TaskStatus,
};

/// Provider name used for errors raised before a provider is selected
const GATEWAY: &str = "gateway";

/// Build the dispatcher from configuration
///
/// # Errors
///
/// Returns an error if the polling durations are invalid
pub fn build_dispatcher(config: &lumen_config::Config) -> anyhow::Result<Arc<Dispatcher>> {
    let dispatcher = DispatcherBuilder::new(&config.imagegen)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to initialize generation dispatcher: {e}"))?;

    Ok(Arc::new(dispatcher))
}

/// Create the endpoint router for generation
pub fn endpoint_router() -> Router<Arc<Dispatcher>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/api/key-status", get(chat_key_status))
        .route("/api/modelscope-key-status", get(task_key_status))
        .route("/v1/providers/{provider}/models", get(list_models))
        .route("/v1/tasks/{task_id}", get(task_status))
}

/// Handle generation requests
///
/// The work is cancelled if the client goes away before it finishes.
async fn generate(
    State(dispatcher): State<Arc<Dispatcher>>,
    Extension(context): Extension<RequestContext>,
    body: std::result::Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerationOutcome>> {
    let Json(body) = body.map_err(|e| ProviderError::invalid_input(GATEWAY, e.body_text()))?;
    let request = generation_request(&dispatcher, body, context)?;

    tracing::debug!("Generation handler called for model: {}", request.model);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let outcome = dispatcher.generate(&request, &cancel).await?;

    Ok(Json(outcome))
}

/// Turn the HTTP body into a request, applying the reserved-model default
fn generation_request(
    dispatcher: &Dispatcher,
    body: GenerateBody,
    context: RequestContext,
) -> Result<GenerationRequest> {
    let GenerateBody {
        prompt,
        model,
        timeout,
        poll_interval,
        params,
    } = body;

    let model = model
        .filter(|model| !model.trim().is_empty())
        .unwrap_or_else(|| dispatcher.reserved_model().to_string());

    let mut request = GenerationRequest::new(prompt, model).with_params(params);
    request.api_key = context.api_key;

    if let Some(seconds) = timeout {
        request = request.with_timeout(seconds_param("timeout", seconds)?);
    }

    if let Some(seconds) = poll_interval {
        request = request.with_poll_interval(seconds_param("poll_interval", seconds)?);
    }

    Ok(request)
}

fn seconds_param(field: &str, seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|duration| !duration.is_zero())
        .ok_or_else(|| ProviderError::invalid_input(GATEWAY, format!("{field} must be a positive number of seconds")))
}

async fn chat_key_status(State(dispatcher): State<Arc<Dispatcher>>) -> Json<KeyStatus> {
    Json(dispatcher.key_status(ProviderKind::Chat).await)
}

async fn task_key_status(State(dispatcher): State<Arc<Dispatcher>>) -> Json<KeyStatus> {
    Json(dispatcher.key_status(ProviderKind::Task).await)
}

#[derive(Serialize)]
struct ModelList {
    object: &'static str,
    data: Vec<ModelInfo>,
}

async fn list_models(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(provider): Path<String>,
) -> Result<Json<ModelList>> {
    let kind = provider
        .parse::<ProviderKind>()
        .map_err(|_| ProviderError::invalid_input(GATEWAY, format!("unknown provider '{provider}'")))?;

    let data = dispatcher.list_models(kind).await?;

    Ok(Json(ModelList { object: "list", data }))
}

async fn task_status(
    State(dispatcher): State<Arc<Dispatcher>>,
    Extension(context): Extension<RequestContext>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskSnapshot>> {
    let snapshot = dispatcher.task_status(&task_id, context.api_key.as_ref()).await?;

    Ok(Json(snapshot))
}
