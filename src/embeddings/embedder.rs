// Embedding client over the OpenAI embeddings API
// API reference: https://platform.openai.com/docs/api-reference/embeddings

use crate::config::EmbeddingConfig;
use crate::llm::openai::{map_api_error, map_request_error};
use crate::types::{AppError, AppResult};
use crate::utils::retry::{with_retry, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Dimensionality of text-embedding-3-small vectors; knowledge-store
/// columns are declared with this width.
pub const EMBEDDING_DIM: usize = 1536;

pub struct EmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig, retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            retry,
        }
    }

    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            model: "text-embedding-3-small".to_string(),
            batch_size: 2,
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        }
    }

    /// Embed a batch of texts, preserving input order. Requests are chunked
    /// to the configured batch size; each request goes through the shared
    /// retry policy.
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_embeddings =
                with_retry(&self.retry, "embeddings", || self.embed_batch(batch)).await?;
            embeddings.extend(batch_embeddings);
        }
        Ok(embeddings)
    }

    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let texts = [text.to_string()];
        let mut result = self.embed(&texts).await?;
        result
            .pop()
            .ok_or_else(|| AppError::external("embeddings", "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error("embeddings", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_api_error("embeddings", status, &error_text));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::external("embeddings", format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::external(
                "embeddings",
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }

        debug!(count = parsed.data.len(), "Embedded batch");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_batches_preserve_order() {
        let mut server = mockito::Server::new_async().await;
        // batch_size is 2 in the test client, so three inputs mean two calls
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data": [{"embedding": [0.1, 0.2]}, {"embedding": [0.3, 0.4]}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = EmbeddingClient::for_tests(&server.url());
        let texts = vec!["a".to_string(), "b".to_string()];
        let embeddings = client.embed(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0], vec![0.1, 0.2]);
        assert_eq!(embeddings[1], vec![0.3, 0.4]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data": [{"embedding": [0.1]}]}"#)
            .create_async()
            .await;

        let client = EmbeddingClient::for_tests(&server.url());
        let texts = vec!["a".to_string(), "b".to_string()];
        let error = client.embed(&texts).await.unwrap_err();
        assert!(error.to_string().contains("expected 2 embeddings"));
    }
}
