use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Model id that routes a request to the chat provider
pub const DEFAULT_RESERVED_MODEL: &str = "nanobanana";

/// Top-level generation provider configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageGenConfig {
    /// Model id reserved for the synchronous chat provider
    ///
    /// Every other model id is passed through to the async task provider.
    #[serde(default = "default_reserved_model")]
    pub reserved_model: String,
    /// Synchronous chat-completions provider
    #[serde(default)]
    pub chat: ChatProviderConfig,
    /// Asynchronous task provider
    #[serde(default)]
    pub task: TaskProviderConfig,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            reserved_model: default_reserved_model(),
            chat: ChatProviderConfig::default(),
            task: TaskProviderConfig::default(),
        }
    }
}

/// Configuration for the synchronous chat-completions provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatProviderConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Upstream model used for every chat generation
    #[serde(default = "default_chat_model")]
    pub default_model: String,
}

impl Default for ChatProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: default_chat_model(),
        }
    }
}

impl ChatProviderConfig {
    /// Configured API key, treating an empty value as absent
    pub fn api_key(&self) -> Option<SecretString> {
        non_empty(self.api_key.as_ref())
    }
}

/// Configuration for the asynchronous task provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskProviderConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Delay between task status checks (e.g. "5s")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Overall polling budget (e.g. "180s", "3m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for TaskProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
        }
    }
}

impl TaskProviderConfig {
    /// Configured API key, treating an empty value as absent
    pub fn api_key(&self) -> Option<SecretString> {
        non_empty(self.api_key.as_ref())
    }

    /// Parsed polling interval
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid, non-zero duration
    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        parse_positive("imagegen.task.poll_interval", &self.poll_interval)
    }

    /// Parsed overall polling timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid, non-zero duration
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        parse_positive("imagegen.task.timeout", &self.timeout)
    }
}

pub(crate) fn parse_positive(field: &str, raw: &str) -> anyhow::Result<Duration> {
    let duration = duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid duration for {field} '{raw}': {e}"))?;

    if duration.is_zero() {
        anyhow::bail!("{field} must be greater than zero");
    }

    Ok(duration)
}

fn non_empty(key: Option<&SecretString>) -> Option<SecretString> {
    key.filter(|key| !key.expose_secret().trim().is_empty()).cloned()
}

fn default_reserved_model() -> String {
    DEFAULT_RESERVED_MODEL.to_string()
}

fn default_chat_model() -> String {
    "google/gemini-2.5-flash-image-preview".to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_timeout() -> String {
    "180s".to_string()
}
