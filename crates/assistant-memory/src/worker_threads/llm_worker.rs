//! Chat completions against an OpenAI-compatible backend (llama-server,
//! vLLM, hosted APIs). The conversation history travels in the
//! caller-owned `ChatSession`.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context_engine::ModelClient;
use crate::error::{MemoryError, Result};
use crate::memory::{ChatSession, Message};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<Message>,
}

pub struct OpenAiCompatibleClient {
    backend_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(backend_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(backend_url, model, Duration::from_secs(120))
    }

    pub fn with_timeout(backend_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        info!("Model client initialized with backend: {}", backend_url);
        Self {
            backend_url,
            model: model.into(),
            api_key: None,
            max_tokens: 2000,
            temperature: 0.7,
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

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    async fn send_message(&self, session: &mut ChatSession, text: &str) -> Result<String> {
        let mut messages = session.request_messages();
        messages.push(Message::user(text));
        debug!(
            "Sending {} message(s) for session {} ({} chars of prompt)",
            messages.len(),
            session.id(),
            text.len()
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };
        let mut builder = self.http_client.post(self.completions_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| MemoryError::ModelCall(format!("backend request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::ModelCall(format!("backend returned {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::ModelCall(format!("failed to parse response: {}", e)))?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .ok_or_else(|| MemoryError::ModelCall("response had no choices".to_string()))?;

        session.push_user(text);
        session.push_assistant(reply.clone());
        Ok(reply)
    }
}
