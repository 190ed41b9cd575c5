use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{ProviderAdapter, endpoint, fetch_models, read_json, require_key, require_prompt, send, upstream_failure};
use crate::{
    error::{ProviderError, Result},
    http_client::http_client,
    normalize::{self, TaskPayload},
    poller::{TaskPoll, TaskPoller},
    types::{GenerationOutcome, GenerationRequest, ModelInfo, TaskHandle, TaskSnapshot, TaskStatus},
};

/// Default `ModelScope` API-inference base URL
pub(crate) const DEFAULT_BASE_URL: &str = "https://api-inference.modelscope.cn/v1";

/// Header asking the provider to queue the job instead of blocking
const ASYNC_MODE_HEADER: &str = "X-ModelScope-Async-Mode";

/// Header naming the job type on status checks
const TASK_TYPE_HEADER: &str = "X-ModelScope-Task-Type";

const TASK_TYPE: &str = "image_generation";

/// Asynchronous submit-then-poll provider
pub(crate) struct AsyncTaskProvider {
    name: String,
    client: Client,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl AsyncTaskProvider {
    pub fn new(name: String, base_url: Option<String>, poll_interval: Duration, timeout: Duration) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            name,
            client: http_client(),
            base_url,
            poll_interval,
            timeout,
        }
    }

    /// Queue the job and take ownership of its task id
    async fn submit(
        &self,
        request: &GenerationRequest,
        prompt: &str,
        api_key: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<TaskHandle> {
        let mut body = request.params.clone();
        body.insert("model".to_string(), Value::String(request.model.clone()));
        body.insert("prompt".to_string(), Value::String(prompt.to_string()));

        tracing::debug!(provider = %self.name, model = %request.model, "submitting generation task");

        let http_request = self
            .client
            .post(endpoint(&self.base_url, "images/generations"))
            .bearer_auth(api_key.expose_secret())
            .header(ASYNC_MODE_HEADER, "true")
            .json(&body);

        let response = send(&self.name, cancel, http_request, "task submission").await?;

        if !response.status().is_success() {
            return Err(upstream_failure(&self.name, cancel, "task submission", response).await);
        }

        let submitted: TaskPayload = read_json(&self.name, cancel, "task submission", response).await?;

        let task_id = submitted
            .task_id
            .filter(|id| usable_task_id(id))
            .ok_or_else(|| ProviderError::upstream(&self.name, "task submission did not return a task id"))?;

        tracing::info!(provider = %self.name, task_id = %task_id, "generation task submitted");

        Ok(TaskHandle::new(task_id))
    }

    /// Status URL of one task, carrying the id as a single escaped path segment
    fn task_url(&self, task_id: &str) -> Result<Url> {
        if !usable_task_id(task_id) {
            return Err(ProviderError::invalid_input(&self.name, format!("invalid task id '{task_id}'")));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::upstream(&self.name, format!("invalid base URL '{}': {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|()| ProviderError::upstream(&self.name, format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push("tasks")
            .push(task_id);

        Ok(url)
    }

    /// One status check
    async fn fetch_task(&self, task_id: &str, api_key: &SecretString, cancel: &CancellationToken) -> Result<TaskPayload> {
        let http_request = self
            .client
            .get(self.task_url(task_id)?)
            .bearer_auth(api_key.expose_secret())
            .header(TASK_TYPE_HEADER, TASK_TYPE);

        let response = send(&self.name, cancel, http_request, "task status check").await?;

        if !response.status().is_success() {
            return Err(upstream_failure(&self.name, cancel, "task status check", response).await);
        }

        read_json(&self.name, cancel, "task status check", response).await
    }

    async fn check(
        &self,
        handle: &TaskHandle,
        api_key: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<TaskPoll<TaskPayload>> {
        let payload = self.fetch_task(handle.task_id(), api_key, cancel).await?;

        Ok(match status_of(&payload) {
            TaskStatus::Succeeded => TaskPoll::Succeeded(payload),
            TaskStatus::Failed => TaskPoll::Failed(payload.message),
            TaskStatus::Pending => TaskPoll::Pending,
        })
    }

    fn poller(&self, request: &GenerationRequest) -> TaskPoller {
        TaskPoller::new(
            request.poll_interval.unwrap_or(self.poll_interval),
            request.timeout.unwrap_or(self.timeout),
        )
    }
}

/// Non-blank and not a dot segment
fn usable_task_id(task_id: &str) -> bool {
    !task_id.trim().is_empty() && task_id != "." && task_id != ".."
}

fn status_of(payload: &TaskPayload) -> TaskStatus {
    payload
        .task_status
        .as_deref()
        .map_or(TaskStatus::Pending, TaskStatus::from_wire)
}

#[async_trait]
impl ProviderAdapter for AsyncTaskProvider {
    async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<GenerationOutcome> {
        let prompt = require_prompt(&self.name, request)?;
        let api_key = require_key(&self.name, request)?;

        let handle = self.submit(request, prompt, api_key, cancel).await?;
        let poller = self.poller(request);

        tracing::debug!(
            provider = %self.name,
            task_id = handle.task_id(),
            max_attempts = poller.max_attempts(),
            "polling generation task"
        );

        let task = &handle;
        let payload = poller
            .run(&self.name, task, cancel, move |_| self.check(task, api_key, cancel))
            .await?;

        normalize::task_output(&self.name, &payload)
    }

    async fn validate_key(&self, api_key: &SecretString) -> bool {
        let cancel = CancellationToken::new();
        let http_request = self
            .client
            .get(endpoint(&self.base_url, "models"))
            .bearer_auth(api_key.expose_secret());

        match send(&self.name, &cancel, http_request, "key validation").await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(provider = %self.name, error = %e, "key validation failed");
                false
            }
        }
    }

    async fn list_models(&self, api_key: &SecretString) -> Result<Vec<ModelInfo>> {
        fetch_models(&self.client, &self.name, &self.base_url, api_key).await
    }

    async fn task_status(&self, task_id: &str, api_key: &SecretString) -> Result<TaskSnapshot> {
        if task_id.trim().is_empty() {
            return Err(ProviderError::invalid_input(&self.name, "task id is required"));
        }

        let payload = self.fetch_task(task_id, api_key, &CancellationToken::new()).await?;
        let status = status_of(&payload);

        let (outcome, message) = match status {
            TaskStatus::Succeeded => match normalize::task_output(&self.name, &payload) {
                Ok(outcome) => (Some(outcome), payload.message),
                Err(e) => (None, Some(e.message().to_string())),
            },
            TaskStatus::Pending | TaskStatus::Failed => (None, payload.message),
        };

        Ok(TaskSnapshot {
            task_id: task_id.to_string(),
            status,
            message,
            outcome,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
