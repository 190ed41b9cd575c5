//! Mapping of provider success payloads onto [`GenerationOutcome`]
//!
//! Each provider has produced more than one success shape over time. The
//! rules below try those shapes in a fixed order; every step is a separate
//! function so it can be exercised on its own.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{ErrorKind, ProviderError, Result},
    types::GenerationOutcome,
};

/// Text returned when a chat call succeeded without usable content
pub const NO_CONTENT_SENTINEL: &str = "<no valid content returned>";

const IMAGE_DATA_URI_PREFIX: &str = "data:image/";

/// Success body of a chat-completions call
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub images: Option<Vec<MessageImage>>,
    /// Usually a string; some gateways send structured parts instead
    #[serde(default)]
    pub content: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MessageImage {
    #[serde(default)]
    pub image_url: Option<ImageUrl>,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrl {
    #[serde(default)]
    pub url: Option<String>,
}

/// Status body of an async task
#[derive(Debug, Default, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub output: Option<TaskOutput>,
    #[serde(default)]
    pub output_images: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub images: Option<Vec<OutputImage>>,
}

#[derive(Debug, Deserialize)]
pub struct OutputImage {
    #[serde(default)]
    pub url: Option<String>,
}

/// Embedded-message rule for chat-completions responses
///
/// Missing content is not an error: the call succeeded, so the caller gets
/// the [`NO_CONTENT_SENTINEL`] text instead.
pub fn embedded_message(completion: &ChatCompletion) -> GenerationOutcome {
    let message = completion
        .choices
        .as_deref()
        .and_then(<[ChatChoice]>::first)
        .and_then(|choice| choice.message.as_ref());

    message
        .and_then(|message| {
            attached_image(message)
                .or_else(|| data_uri_content(message))
                .or_else(|| text_content(message))
        })
        .unwrap_or_else(no_content)
}

/// `message.images[0].image_url.url`
pub fn attached_image(message: &ChatMessage) -> Option<GenerationOutcome> {
    let url = message
        .images
        .as_deref()?
        .first()?
        .image_url
        .as_ref()?
        .url
        .as_deref()
        .filter(|url| !url.is_empty())?;

    Some(GenerationOutcome::Image { url: url.to_string() })
}

/// String content that is itself an image data URI
pub fn data_uri_content(message: &ChatMessage) -> Option<GenerationOutcome> {
    let content = string_content(message)?;

    content
        .starts_with(IMAGE_DATA_URI_PREFIX)
        .then(|| GenerationOutcome::Image { url: content.to_string() })
}

/// Non-blank string content
pub fn text_content(message: &ChatMessage) -> Option<GenerationOutcome> {
    let content = string_content(message)?;

    (!content.trim().is_empty()).then(|| GenerationOutcome::Text {
        content: content.to_string(),
    })
}

fn string_content(message: &ChatMessage) -> Option<&str> {
    message.content.as_ref().and_then(Value::as_str)
}

fn no_content() -> GenerationOutcome {
    GenerationOutcome::Text {
        content: NO_CONTENT_SENTINEL.to_string(),
    }
}

/// Task-output rule for async task results
///
/// The task provider only produces images, so a finished task without one
/// is a [`ErrorKind::MalformedResponse`].
pub fn task_output(provider: &str, payload: &TaskPayload) -> Result<GenerationOutcome> {
    nested_output_image(payload)
        .or_else(|| flat_output_image(payload))
        .ok_or_else(|| {
            ProviderError::new(
                ErrorKind::MalformedResponse,
                provider,
                "task succeeded but returned no images",
            )
        })
}

/// `output.images[0].url`
pub fn nested_output_image(payload: &TaskPayload) -> Option<GenerationOutcome> {
    let url = payload
        .output
        .as_ref()?
        .images
        .as_deref()?
        .first()?
        .url
        .as_deref()
        .filter(|url| !url.is_empty())?;

    Some(GenerationOutcome::Image { url: url.to_string() })
}

/// `output_images[0]`
pub fn flat_output_image(payload: &TaskPayload) -> Option<GenerationOutcome> {
    let url = payload
        .output_images
        .as_deref()?
        .first()
        .filter(|url| !url.is_empty())?;

    Some(GenerationOutcome::Image { url: url.clone() })
}
