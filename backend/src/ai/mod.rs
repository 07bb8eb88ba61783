//! Natural-language helpers backed by a hosted text-generation model.

mod assist;
mod gemini;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use assist::{AiAssistService, CONTEXT_TASK_LIMIT, EMPTY_SUMMARY, MAX_CATEGORIES};
pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI model is not configured (GEMINI_API_KEY is empty)")]
    NotConfigured,
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model request failed: {status} {body}")]
    Status { status: u16, body: String },
    #[error("model reply contained no text")]
    EmptyReply,
    #[error("model reply was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A hosted model that turns a prompt into reply text.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// Trims `text` and, when it opens with a code fence, returns the first fenced
/// segment without its language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let inner = trimmed.split("```").nth(1).unwrap_or_default();
    let inner = match inner.split_once('\n') {
        Some((tag, rest)) if is_language_tag(tag) => rest,
        _ => inner.strip_prefix("json").unwrap_or(inner),
    };
    inner.trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, AiError> {
    Ok(serde_json::from_str(strip_code_fence(reply))?)
}

/// Replays a fixed reply (or failure) and records every prompt it receives.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct CannedModel {
    reply: Option<String>,
    failure: Option<(u16, String)>,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl CannedModel {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self {
            failure: Some((status, body.into())),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts().len()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl TextModel for CannedModel {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some((status, body)) = &self.failure {
            return Err(AiError::Status {
                status: *status,
                body: body.clone(),
            });
        }
        self.reply.clone().ok_or(AiError::EmptyReply)
    }
}
