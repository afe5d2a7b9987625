use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::embedding::{
    CachedEmbeddingProvider, EmbeddingProvider, HashingEmbeddingProvider, HttpEmbeddingProvider,
};
use crate::summarization::SummarizationMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Local feature hashing; no network.
    Hashing,
    /// OpenAI-compatible `/v1/embeddings`.
    Http,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "http" | "openai" => Ok(Self::Http),
            other => Err(anyhow::anyhow!("unknown embedding backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub pool_size: u32,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub embedding_cache_capacity: u64,
    pub model_url: String,
    pub model_name: String,
    pub model_api_key: Option<String>,
    pub model_timeout_seconds: u64,
    pub search_corpus_cap: usize,
    pub message_top_k: usize,
    pub summary_top_k: usize,
    pub top_topics: usize,
    pub summary_window: usize,
    pub summary_interval_seconds: u64,
    pub summary_method: SummarizationMethod,
    pub summary_sentences: usize,
    pub profile_path: PathBuf,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("invalid value '{}' for {}", raw, key))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, applying defaults for missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            db_path: PathBuf::from(
                lookup("MEMORY_DB_PATH").unwrap_or_else(|| "./data/assistant_memory.db".into()),
            ),
            pool_size: parse_var(&lookup, "MEMORY_POOL_SIZE", "8")?,
            embedding_backend: parse_var(&lookup, "EMBEDDING_BACKEND", "hashing")?,
            embedding_url: lookup("EMBEDDING_URL").unwrap_or_else(|| "http://127.0.0.1:8081".into()),
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| "all-MiniLM-L6-v2".into()),
            embedding_dimension: parse_var(&lookup, "EMBEDDING_DIMENSION", "384")?,
            embedding_cache_capacity: parse_var(&lookup, "EMBEDDING_CACHE_CAPACITY", "1024")?,
            model_url: lookup("MODEL_URL").unwrap_or_else(|| "http://127.0.0.1:8080".into()),
            model_name: lookup("MODEL_NAME").unwrap_or_else(|| "local-llm".into()),
            model_api_key: lookup("MODEL_API_KEY").filter(|k| !k.trim().is_empty()),
            model_timeout_seconds: parse_var(&lookup, "MODEL_TIMEOUT_SECONDS", "120")?,
            search_corpus_cap: parse_var(&lookup, "SEARCH_CORPUS_CAP", "1000")?,
            message_top_k: parse_var(&lookup, "MESSAGE_TOP_K", "5")?,
            summary_top_k: parse_var(&lookup, "SUMMARY_TOP_K", "3")?,
            top_topics: parse_var(&lookup, "TOP_TOPICS", "5")?,
            summary_window: parse_var(&lookup, "SUMMARY_WINDOW", "100")?,
            summary_interval_seconds: parse_var(&lookup, "SUMMARY_INTERVAL_SECONDS", "300")?,
            summary_method: parse_var(&lookup, "SUMMARY_METHOD", "tfidf")?,
            summary_sentences: parse_var(&lookup, "SUMMARY_SENTENCES", "5")?,
            profile_path: PathBuf::from(
                lookup("PROFILE_PATH").unwrap_or_else(|| "./profiles/default_user.json".into()),
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            anyhow::bail!("EMBEDDING_DIMENSION must be positive");
        }
        if self.summary_window == 0 {
            anyhow::bail!("SUMMARY_WINDOW must be positive");
        }
        if self.pool_size == 0 {
            anyhow::bail!("MEMORY_POOL_SIZE must be positive");
        }
        if self.summary_interval_seconds == 0 {
            anyhow::bail!("SUMMARY_INTERVAL_SECONDS must be positive");
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_seconds)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_seconds)
    }

    /// The configured provider, wrapped in the query cache when enabled.
    pub fn build_embedder(&self) -> Arc<dyn EmbeddingProvider> {
        let base: Arc<dyn EmbeddingProvider> = match self.embedding_backend {
            EmbeddingBackend::Hashing => Arc::new(HashingEmbeddingProvider::new(self.embedding_dimension)),
            EmbeddingBackend::Http => Arc::new(
                HttpEmbeddingProvider::with_timeout(
                    self.embedding_url.clone(),
                    self.embedding_model.clone(),
                    self.embedding_dimension,
                    self.model_timeout(),
                )
                .with_api_key(self.model_api_key.clone()),
            ),
        };
        if self.embedding_cache_capacity == 0 {
            base
        } else {
            Arc::new(CachedEmbeddingProvider::new(base, self.embedding_cache_capacity))
        }
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Database: {} (pool {})", self.db_path.display(), self.pool_size);
        info!(
            "- Embeddings: {:?} {} (dim {}, cache {})",
            self.embedding_backend, self.embedding_model, self.embedding_dimension, self.embedding_cache_capacity
        );
        if self.embedding_backend == EmbeddingBackend::Http {
            info!("- Embedding URL: {}", self.embedding_url);
        }
        info!("- Model: {} at {}", self.model_name, self.model_url);
        info!("- Model API key: {}", if self.model_api_key.is_some() { "set" } else { "unset" });
        info!(
            "- Retrieval: corpus cap {}, messages top {}, summaries top {}, topics {}",
            self.search_corpus_cap, self.message_top_k, self.summary_top_k, self.top_topics
        );
        info!(
            "- Summarizer: {} every {}s over {} messages ({} sentences)",
            self.summary_method, self.summary_interval_seconds, self.summary_window, self.summary_sentences
        );
        info!("- Profile: {}", self.profile_path.display());
    }
}
