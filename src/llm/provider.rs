use crate::config::LlmConfig;
use crate::types::{AppError, AppResult};
use crate::utils::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use std::time::Duration;

/// The text-generation capability the pipeline consumes. Everything that
/// needs completions (chat pipeline, chat naming, blog generation) depends
/// on this trait, never on a concrete provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    model: String,
    retry: RetryPolicy,
}

impl LLM {
    pub fn from_config(config: &LlmConfig, retry: RetryPolicy) -> AppResult<Self> {
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::Validation(format!(
                "no API key configured for LLM provider '{}'",
                config.provider
            ))
        })?;
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let adapter: Box<dyn LLMAdapter> = match config.provider.as_str() {
            "openai" => Box::new(crate::llm::openai::OpenAIAdapter::new(api_key, timeout)),
            "openrouter" => Box::new(crate::llm::openrouter::OpenRouterAdapter::new(
                api_key, timeout,
            )),
            other => {
                return Err(AppError::Validation(format!(
                    "unsupported LLM provider: {other}"
                )))
            }
        };

        Ok(Self {
            adapter,
            model: config.model.clone(),
            retry,
        })
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        with_retry(&self.retry, "llm", || {
            self.adapter.create_chat_completion(request)
        })
        .await
    }
}

#[async_trait]
impl TextGenerator for LLM {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(2048),
            temperature: Some(0.7),
        };

        let response = self.create_chat_completion(&request).await?;
        Ok(response.content.trim().to_string())
    }
}
