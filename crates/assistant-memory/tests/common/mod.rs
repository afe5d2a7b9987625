//! Shared doubles for the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assistant_memory::{
    ChatSession, EmbeddingProvider, MemoryDatabase, MemoryError, ModelClient, Result, Summarize,
};
use async_trait::async_trait;

/// Buckets words into a handful of topics so that paraphrases land close
/// together. A constant bias component keeps every vector non-zero.
pub struct ConceptEmbedder;

const CONCEPTS: &[&[&str]] = &[
    &["job", "work", "works", "working", "engineer", "career", "occupation", "profession"],
    &["hiking", "hike", "like", "enjoy", "hobby", "outdoors", "mountains"],
    &["color", "colour", "favorite", "favourite", "blue", "red", "green"],
    &["food", "eat", "pizza", "cook", "dinner", "hungry"],
];

impl ConceptEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; CONCEPTS.len() + 1];
        vector[CONCEPTS.len()] = 0.1;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            for (bucket, words) in CONCEPTS.iter().enumerate() {
                if words.contains(&word.as_str()) {
                    vector[bucket] += 1.0;
                }
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for ConceptEmbedder {
    fn dimension(&self) -> usize {
        CONCEPTS.len() + 1
    }

    fn model_name(&self) -> &str {
        "concept-buckets"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

/// Stands in for an embedding backend that is down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn dimension(&self) -> usize {
        CONCEPTS.len() + 1
    }

    fn model_name(&self) -> &str {
        "concept-buckets"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::Embedding("backend unavailable".to_string()))
    }
}

/// Concept buckets for everything except one exact text, which the backend
/// refuses.
pub struct RejectingEmbedder(pub &'static str);

#[async_trait]
impl EmbeddingProvider for RejectingEmbedder {
    fn dimension(&self) -> usize {
        CONCEPTS.len() + 1
    }

    fn model_name(&self) -> &str {
        "concept-buckets"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text == self.0 {
            return Err(MemoryError::Embedding(format!("rejected input: {text}")));
        }
        Ok(ConceptEmbedder::vector(text))
    }
}

/// Answers from a script and records every prompt it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(vec![Err(MemoryError::ModelCall(
                "provider unavailable".to_string(),
            ))])),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every reply takes `delay` to arrive.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn send_message(&self, session: &mut ChatSession, text: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()));
        let reply = next?;
        session.push_user(text);
        session.push_assistant(reply.clone());
        Ok(reply)
    }
}

/// Returns a fixed summary (or a fixed error) and records its inputs.
pub struct ScriptedSummarizer {
    output: std::result::Result<String, String>,
    pub inputs: Mutex<Vec<String>>,
}

impl ScriptedSummarizer {
    pub fn returning(summary: &str) -> Self {
        Self {
            output: Ok(summary.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            output: Err(reason.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarize for ScriptedSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.inputs.lock().unwrap().push(text.to_string());
        self.output.clone().map_err(MemoryError::Summarization)
    }
}

pub fn file_database(dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Arc<MemoryDatabase> {
    Arc::new(MemoryDatabase::new(&dir.join("memory.db"), embedder, 4).unwrap())
}

pub fn concept_database(dir: &Path) -> Arc<MemoryDatabase> {
    file_database(dir, Arc::new(ConceptEmbedder))
}
