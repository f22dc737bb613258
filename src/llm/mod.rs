//! Language model collaborators
//!
//! The memory engine never talks to a model directly; it hands ordered
//! message lists to a [`ChatModel`] and gets text back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::MemoryError;
use crate::Result;

pub mod openai;
pub use openai::OpenAiClient;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a model request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A model that answers an ordered list of messages.
///
/// Used both for the conversation and for summary generation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn ask(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Approximate token count of a text (about four bytes per token)
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Approximate token count of a whole request
pub fn estimate_request_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Replays queued replies in order; keeps every request it was sent.
///
/// Stands in for a real model in development and tests. Once the queue is
/// empty it fails every call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue a failed call
    pub fn fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(message.into()));
        }
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn ask(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| MemoryError::LlmError(format!("Scripted model poisoned: {}", e)))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(MemoryError::LlmError(message)),
            None => Err(MemoryError::LlmError("No scripted reply left".to_string())),
        }
    }
}
