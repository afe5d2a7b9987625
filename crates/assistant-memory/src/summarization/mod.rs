//! Text condensation strategies behind one entry point
//!
//! `SummarizationEngine::summarize(method, text)` dispatches to an extractive
//! strategy (TF-IDF centrality, TextRank, k-means clustering) or to the chat
//! model for abstractive summaries.
pub mod clustering;
pub mod textrank;
pub mod tfidf;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context_engine::ModelClient;
use crate::error::{MemoryError, Result};
use crate::memory::ChatSession;
use crate::utils::TextUtils;

pub const DEFAULT_SENTENCE_COUNT: usize = 5;

const ABSTRACTIVE_SYSTEM_PROMPT: &str =
    "You condense conversation transcripts into a short factual summary. Reply with the summary only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationMethod {
    TfIdf,
    TextRank,
    Abstractive,
    Clustering,
}

impl FromStr for SummarizationMethod {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tfidf" | "tf-idf" => Ok(Self::TfIdf),
            "textrank" | "text-rank" => Ok(Self::TextRank),
            "abstractive" | "bart" => Ok(Self::Abstractive),
            "clustering" | "kmeans" => Ok(Self::Clustering),
            other => Err(MemoryError::InvalidInput(format!(
                "unsupported summarization method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SummarizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TfIdf => "tfidf",
            Self::TextRank => "textrank",
            Self::Abstractive => "abstractive",
            Self::Clustering => "clustering",
        };
        f.write_str(name)
    }
}

/// Anything that turns a window of conversation into shorter text.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

pub struct SummarizationEngine {
    sentence_count: usize,
    model: Option<Arc<dyn ModelClient>>,
}

impl SummarizationEngine {
    pub fn new(sentence_count: usize) -> Self {
        Self {
            sentence_count: sentence_count.max(1),
            model: None,
        }
    }

    /// Enables `SummarizationMethod::Abstractive`.
    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    pub async fn summarize(&self, method: SummarizationMethod, text: &str) -> Result<String> {
        let normalized = TextUtils::normalize_whitespace(text);
        if normalized.trim().is_empty() {
            return Err(MemoryError::Summarization("nothing to summarize".to_string()));
        }
        debug!("Summarizing {} words with {}", TextUtils::count_words(&normalized), method);

        let sentences = TextUtils::split_sentences(&normalized);
        if sentences.is_empty() && method != SummarizationMethod::Abstractive {
            return Err(MemoryError::Summarization("no sentences found".to_string()));
        }
        let summary = match method {
            SummarizationMethod::Abstractive => return self.abstractive(&normalized).await,
            SummarizationMethod::TfIdf => tfidf::summarize(&sentences, self.sentence_count),
            SummarizationMethod::TextRank => textrank::summarize(&sentences, textrank::WORD_BUDGET),
            SummarizationMethod::Clustering => clustering::summarize(&sentences, self.sentence_count),
        };
        Ok(summary)
    }

    async fn abstractive(&self, text: &str) -> Result<String> {
        let model = self.model.as_ref().ok_or_else(|| {
            MemoryError::Summarization("abstractive summarization needs a model client".to_string())
        })?;
        let mut session = ChatSession::with_system_prompt(ABSTRACTIVE_SYSTEM_PROMPT);
        let prompt = format!("Summarize the following conversation:\n\n{}", text);
        let summary = model
            .send_message(&mut session, &prompt)
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(MemoryError::Summarization("model returned an empty summary".to_string()));
        }
        Ok(summary.to_string())
    }
}

/// An engine bound to one method; what the background summarizer runs.
pub struct ConfiguredSummarizer {
    engine: Arc<SummarizationEngine>,
    method: SummarizationMethod,
}

impl ConfiguredSummarizer {
    pub fn new(engine: Arc<SummarizationEngine>, method: SummarizationMethod) -> Self {
        Self { engine, method }
    }

    pub fn method(&self) -> SummarizationMethod {
        self.method
    }
}

#[async_trait]
impl Summarize for ConfiguredSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.engine.summarize(self.method, text).await
    }
}
