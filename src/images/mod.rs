//! Image generation.
//!
//! One capability over the HuggingFace inference API with a selectable
//! model and a configurable sink for the produced bytes (object storage or
//! a local directory). Rate limits and transient upstream failures go
//! through the shared bounded-retry policy; the budget is never silently
//! exceeded.

use crate::config::ImageConfig;
use crate::storage::ObjectStorage;
use crate::types::{AppError, AppResult};
use crate::utils::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModel {
    StableDiffusion,
    Flux,
}

impl ImageModel {
    pub fn parse(name: &str) -> AppResult<Self> {
        match name {
            "stable-diffusion" => Ok(ImageModel::StableDiffusion),
            "flux" => Ok(ImageModel::Flux),
            other => Err(AppError::Validation(format!(
                "unknown image model: {other}"
            ))),
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            ImageModel::StableDiffusion => {
                "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-3.5-large"
            }
            ImageModel::Flux => {
                "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-schnell"
            }
        }
    }
}

/// Where generated image bytes end up; returns a URL or path for the
/// caller to hand on.
#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String>;
}

pub struct S3Sink {
    storage: Arc<ObjectStorage>,
}

impl S3Sink {
    pub fn new(storage: Arc<ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ImageSink for S3Sink {
    async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        let key = format!("generated-images/{filename}");
        self.storage.put_object(&key, bytes, "image/jpeg").await
    }
}

pub struct LocalSink {
    dir: PathBuf,
}

impl LocalSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ImageSink for LocalSink {
    async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("cannot create image dir: {e}")))?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("cannot write image: {e}")))?;
        Ok(path.to_string_lossy().into_owned())
    }
}

pub struct ImageGenerator {
    client: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
    sink: Arc<dyn ImageSink>,
}

impl ImageGenerator {
    pub fn from_config(
        config: &ImageConfig,
        retry: RetryPolicy,
        storage: Arc<ObjectStorage>,
    ) -> AppResult<Self> {
        let model = ImageModel::parse(&config.model)?;
        let sink: Arc<dyn ImageSink> = match config.sink.as_str() {
            "s3" => Arc::new(S3Sink::new(storage)),
            "local" => Arc::new(LocalSink::new(&config.local_dir)),
            other => {
                return Err(AppError::Validation(format!(
                    "unknown image sink: {other}"
                )))
            }
        };

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.hf_api_key.clone(),
            endpoint: model.endpoint().to_string(),
            retry,
            sink,
        })
    }

    #[cfg(test)]
    fn for_tests(endpoint: &str, retry: RetryPolicy, sink: Arc<dyn ImageSink>) -> Self {
        Self {
            client: Client::new(),
            api_key: "test-key".to_string(),
            endpoint: endpoint.to_string(),
            retry,
            sink,
        }
    }

    /// Generate one image and push it through the sink; returns the sink's
    /// URL or path.
    pub async fn generate(&self, prompt: &str) -> AppResult<String> {
        if prompt.trim().is_empty() {
            return Err(AppError::Validation("no image prompt supplied".to_string()));
        }

        let bytes = with_retry(&self.retry, "images", || self.request_image(prompt)).await?;
        let filename = format!("{}.jpg", Uuid::new_v4());
        let location = self.sink.store(&filename, &bytes).await?;

        info!(bytes = bytes.len(), location = %location, "Generated image");
        Ok(location)
    }

    async fn request_image(&self, prompt: &str) -> AppResult<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AppError::external_transient("images", format!("request failed: {e}"))
                } else {
                    AppError::external("images", format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimited { service: "images" });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error ({status}): {body}");
            return if status.is_server_error() {
                Err(AppError::external_transient("images", message))
            } else {
                Err(AppError::external("images", message))
            };
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::external("images", format!("failed to read image: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemorySink {
        stored: Mutex<Vec<(String, usize)>>,
    }

    impl MemorySink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                stored: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ImageSink for MemorySink {
        async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
            self.stored
                .lock()
                .unwrap()
                .push((filename.to_string(), bytes.len()));
            Ok(format!("memory://{filename}"))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_generated_bytes_reach_the_sink() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(vec![0xffu8, 0xd8, 0xff])
            .expect(1)
            .create_async()
            .await;

        let sink = MemorySink::new();
        let generator = ImageGenerator::for_tests(&server.url(), fast_policy(), sink.clone());

        let location = generator.generate("a deep thinker").await.unwrap();
        assert!(location.starts_with("memory://"));
        assert_eq!(sink.stored.lock().unwrap()[0].1, 3);
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_exhausted_budget_surfaces_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let sink = MemorySink::new();
        let generator = ImageGenerator::for_tests(&server.url(), fast_policy(), sink.clone());

        let error = generator.generate("a deep thinker").await.unwrap_err();
        assert!(matches!(error, AppError::RateLimited { service: "images" }));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[test]
    fn test_model_parsing() {
        assert_eq!(
            ImageModel::parse("stable-diffusion").unwrap(),
            ImageModel::StableDiffusion
        );
        assert_eq!(ImageModel::parse("flux").unwrap(), ImageModel::Flux);
        assert!(ImageModel::parse("dall-e").is_err());
    }
}
