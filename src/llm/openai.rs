//! OpenAI-compatible chat completion client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::ModelConfig;
use crate::error::MemoryError;
use crate::llm::{ChatMessage, ChatModel};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Reusable chat completion client bound to one model
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Client for `model` using the endpoint and credentials of `config`
    pub fn from_config(config: &ModelConfig, model: &str) -> crate::Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            model,
            config.timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(MemoryError::ConfigError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        info!(model = %self.model, messages = messages.len(), "Calling chat completion API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completion request failed: {}", e);
                MemoryError::LlmError(format!("Chat completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Chat completion error response: {}", error_text);
            return Err(MemoryError::LlmError(format!(
                "Chat completion error ({}): {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat completion response: {}", e);
            MemoryError::LlmError(format!("Chat completion parse error: {}", e))
        })?;

        extract_answer(completion)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn ask(&self, messages: &[ChatMessage]) -> crate::Result<String> {
        self.complete(messages).await
    }
}

fn extract_answer(completion: CompletionResponse) -> crate::Result<String> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| MemoryError::LlmError("No choices in chat completion".to_string()))?;

    if let Some(usage) = completion.usage {
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "Chat completion received"
        );
    }

    choice
        .message
        .content
        .filter(|content| !content.is_empty())
        .ok_or_else(|| MemoryError::LlmError("Empty chat completion".to_string()))
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
