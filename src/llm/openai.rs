// OpenAI chat completions adapter
// API reference: https://platform.openai.com/docs/api-reference/chat

use crate::llm::provider::{LLMAdapter, LLMRequest, LLMResponse, TokenUsage};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }
}

/// Map an upstream HTTP status + body to the error taxonomy. 429 and 5xx
/// are retryable; everything else surfaces immediately.
pub(crate) fn map_api_error(
    service: &'static str,
    status: reqwest::StatusCode,
    body: &str,
) -> AppError {
    if status.as_u16() == 429 {
        return AppError::RateLimited { service };
    }
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    let message = format!("API error ({status}): {message}");
    if status.is_server_error() {
        AppError::external_transient(service, message)
    } else {
        AppError::external(service, message)
    }
}

pub(crate) fn map_request_error(service: &'static str, error: reqwest::Error) -> AppError {
    if error.is_timeout() || error.is_connect() {
        AppError::external_transient(service, format!("request failed: {error}"))
    } else {
        AppError::external(service, format!("request failed: {error}"))
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error("openai", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_api_error("openai", status, &error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::external("openai", format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external("openai", "response contained no choices"))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: TokenUsage {
                prompt_tokens: parsed.usage.prompt_tokens,
                completion_tokens: parsed.usage.completion_tokens,
                total_tokens: parsed.usage.total_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LLMMessage;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![LLMMessage::user("hello")],
            max_tokens: Some(64),
            temperature: Some(0.0),
        }
    }

    #[tokio::test]
    async fn test_parses_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "Hi there!"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
                }"#,
            )
            .create_async()
            .await;

        let adapter =
            OpenAIAdapter::with_base_url("test-key", &server.url(), Duration::from_secs(5));
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        assert_eq!(response.content, "Hi there!");
        assert_eq!(response.usage.total_tokens, 8);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": {"message": "slow down"}}"#)
            .create_async()
            .await;

        let adapter =
            OpenAIAdapter::with_base_url("test-key", &server.url(), Duration::from_secs(5));
        let error = adapter.create_chat_completion(&request()).await.unwrap_err();

        assert!(matches!(error, AppError::RateLimited { service: "openai" }));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("upstream overloaded")
            .create_async()
            .await;

        let adapter =
            OpenAIAdapter::with_base_url("test-key", &server.url(), Duration::from_secs(5));
        let error = adapter.create_chat_completion(&request()).await.unwrap_err();

        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_client_error_is_not_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_body(r#"{"error": {"message": "bad model"}}"#)
            .create_async()
            .await;

        let adapter =
            OpenAIAdapter::with_base_url("test-key", &server.url(), Duration::from_secs(5));
        let error = adapter.create_chat_completion(&request()).await.unwrap_err();

        assert!(!error.is_transient());
        assert!(error.to_string().contains("bad model"));
    }
}
