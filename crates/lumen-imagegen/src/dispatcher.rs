use std::{sync::Arc, time::Instant};

use lumen_config::ImageGenConfig;
use lumen_telemetry::metrics::GenerationMetrics;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ProviderError, Result},
    provider::{ProviderAdapter, chat::ChatCompletionsProvider, task::AsyncTaskProvider},
    types::{GenerationOutcome, GenerationRequest, KeyStatus, ModelInfo, ProviderKind, TaskSnapshot},
};

/// Provider name of the synchronous chat adapter
pub const CHAT_PROVIDER_NAME: &str = "openrouter";

/// Provider name of the async task adapter
pub const TASK_PROVIDER_NAME: &str = "modelscope";

/// Single entry point for generation calls
///
/// Picks the adapter from the requested model id and resolves the
/// credential before any adapter work starts. Holds no per-request state.
pub struct Dispatcher {
    reserved_model: String,
    chat: Arc<dyn ProviderAdapter>,
    task: Arc<dyn ProviderAdapter>,
    chat_key: Option<SecretString>,
    task_key: Option<SecretString>,
    metrics: GenerationMetrics,
}

impl Dispatcher {
    pub fn new(
        reserved_model: impl Into<String>,
        chat: Arc<dyn ProviderAdapter>,
        task: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            reserved_model: reserved_model.into(),
            chat,
            task,
            chat_key: None,
            task_key: None,
            metrics: GenerationMetrics::new(),
        }
    }

    /// Configured key for the chat provider
    #[must_use]
    pub fn with_chat_key(mut self, key: Option<SecretString>) -> Self {
        self.chat_key = key.filter(not_blank);
        self
    }

    /// Configured key for the task provider
    #[must_use]
    pub fn with_task_key(mut self, key: Option<SecretString>) -> Self {
        self.task_key = key.filter(not_blank);
        self
    }

    /// Model id served by the chat provider
    pub fn reserved_model(&self) -> &str {
        &self.reserved_model
    }

    /// Which provider serves `model`
    pub fn route(&self, model: &str) -> ProviderKind {
        if model.trim() == self.reserved_model {
            ProviderKind::Chat
        } else {
            ProviderKind::Task
        }
    }

    fn adapter(&self, kind: ProviderKind) -> &dyn ProviderAdapter {
        match kind {
            ProviderKind::Chat => self.chat.as_ref(),
            ProviderKind::Task => self.task.as_ref(),
        }
    }

    fn configured_key(&self, kind: ProviderKind) -> Option<&SecretString> {
        match kind {
            ProviderKind::Chat => self.chat_key.as_ref(),
            ProviderKind::Task => self.task_key.as_ref(),
        }
    }

    /// Per-call key when supplied, else the configured one
    fn resolve_key(&self, kind: ProviderKind, supplied: Option<&SecretString>) -> Result<SecretString> {
        supplied
            .filter(|key| not_blank(key))
            .or_else(|| self.configured_key(kind))
            .cloned()
            .ok_or_else(|| ProviderError::missing_credential(self.adapter(kind).name()))
    }

    /// Generate an image (or text) for `request`
    ///
    /// # Errors
    ///
    /// - [`crate::ErrorKind::InvalidInput`] for a blank prompt
    /// - [`crate::ErrorKind::MissingCredential`] when no key is available
    /// - whatever the selected adapter reports
    pub async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<GenerationOutcome> {
        let start = Instant::now();
        let kind = self.route(&request.model);
        let adapter = self.adapter(kind);

        let result = self.dispatch(kind, adapter, request, cancel).await;

        let outcome: &'static str = match &result {
            Ok(GenerationOutcome::Image { .. }) => "image",
            Ok(GenerationOutcome::Text { .. }) => "text",
            Err(e) => e.kind().into(),
        };
        self.metrics.record(adapter.name(), outcome, start);

        match &result {
            Ok(_) => tracing::info!(provider = adapter.name(), model = %request.model, outcome, "generation complete"),
            Err(e) => tracing::warn!(provider = adapter.name(), model = %request.model, error = %e, "generation failed"),
        }

        result
    }

    async fn dispatch(
        &self,
        kind: ProviderKind,
        adapter: &dyn ProviderAdapter,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome> {
        let prompt = request.prompt.trim();

        if prompt.is_empty() {
            return Err(ProviderError::invalid_input(adapter.name(), "prompt is required"));
        }

        let api_key = self.resolve_key(kind, request.api_key.as_ref())?;
        let model = request.model.trim();

        tracing::debug!(provider = adapter.name(), %model, %kind, "dispatching generation");

        let resolved = GenerationRequest {
            prompt: prompt.to_string(),
            model: model.to_string(),
            api_key: Some(api_key),
            ..request.clone()
        };

        adapter.generate(&resolved, cancel).await
    }

    /// Check an arbitrary key against a provider
    pub async fn validate_key(&self, kind: ProviderKind, api_key: &SecretString) -> bool {
        if !not_blank(api_key) {
            return false;
        }

        self.adapter(kind).validate_key(api_key).await
    }

    /// Check the configured key of a provider
    pub async fn key_status(&self, kind: ProviderKind) -> KeyStatus {
        let Some(api_key) = self.configured_key(kind) else {
            return KeyStatus {
                valid: false,
                error: Some("API key not configured".to_string()),
            };
        };

        KeyStatus {
            valid: self.adapter(kind).validate_key(api_key).await,
            error: None,
        }
    }

    /// Models a provider exposes to the configured key
    pub async fn list_models(&self, kind: ProviderKind) -> Result<Vec<ModelInfo>> {
        let api_key = self.resolve_key(kind, None)?;
        self.adapter(kind).list_models(&api_key).await
    }

    /// One-shot status of an async job
    pub async fn task_status(&self, task_id: &str, api_key: Option<&SecretString>) -> Result<TaskSnapshot> {
        let api_key = self.resolve_key(ProviderKind::Task, api_key)?;
        self.task.task_status(task_id, &api_key).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reserved_model", &self.reserved_model)
            .field("chat", &self.chat.name())
            .field("task", &self.task.name())
            .finish_non_exhaustive()
    }
}

fn not_blank(key: &SecretString) -> bool {
    !key.expose_secret().trim().is_empty()
}

/// Builds the dispatcher and both adapters from configuration
pub struct DispatcherBuilder<'a> {
    config: &'a ImageGenConfig,
}

impl<'a> DispatcherBuilder<'a> {
    pub const fn new(config: &'a ImageGenConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> anyhow::Result<Dispatcher> {
        let ImageGenConfig {
            reserved_model,
            chat,
            task,
        } = self.config;

        let chat_adapter = ChatCompletionsProvider::new(
            CHAT_PROVIDER_NAME.to_string(),
            chat.base_url.clone(),
            chat.default_model.clone(),
        );

        let task_adapter = AsyncTaskProvider::new(
            TASK_PROVIDER_NAME.to_string(),
            task.base_url.clone(),
            task.poll_interval()?,
            task.timeout()?,
        );

        if chat.api_key().is_none() {
            tracing::debug!("No API key configured for provider '{CHAT_PROVIDER_NAME}'");
        }

        if task.api_key().is_none() {
            tracing::debug!("No API key configured for provider '{TASK_PROVIDER_NAME}'");
        }

        tracing::debug!(reserved_model = %reserved_model, "generation dispatcher initialized");

        Ok(Dispatcher::new(reserved_model.clone(), Arc::new(chat_adapter), Arc::new(task_adapter))
            .with_chat_key(chat.api_key())
            .with_task_key(task.api_key()))
    }
}
