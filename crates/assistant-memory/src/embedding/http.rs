//! Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint
//! (llama-server, text-embeddings-inference, hosted APIs).
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::EmbeddingProvider;
use crate::error::{MemoryError, Result};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

pub struct HttpEmbeddingProvider {
    backend_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpEmbeddingProvider {
    pub fn new(backend_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self::with_timeout(backend_url, model, dimension, Duration::from_secs(120))
    }

    pub fn with_timeout(
        backend_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        info!("Embedding provider initialized with backend: {}", backend_url);
        Self {
            backend_url,
            model: model.into(),
            dimension,
            api_key: None,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.backend_url)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Requesting embeddings for {} text(s)", texts.len());
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut builder = self.http_client.post(self.embeddings_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| MemoryError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Embedding(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Embedding(format!("failed to parse response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(MemoryError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        // servers may answer out of order when they batch internally
        parsed.data.sort_by_key(|d| d.index.unwrap_or(0));

        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(MemoryError::InvalidEmbedding {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.request(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| MemoryError::Embedding("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_embed_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "mini",
                "input": ["hello"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"index":0,"embedding":[0.5,0.25,-1.0]}]}"#)
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(server.url(), "mini", 3);
        let embedding = provider.embed("hello").await.unwrap();
        assert_eq!(embedding, vec![0.5, 0.25, -1.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(server.url(), "mini", 2);
        let batch = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"index":0,"embedding":[0.1,0.2]}]}"#)
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(server.url(), "mini", 384);
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidEmbedding { expected: 384, actual: 2 }));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_embedding_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(503)
            .with_body("loading model")
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(server.url(), "mini", 3);
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, MemoryError::Embedding(ref msg) if msg.contains("503")));
    }
}
