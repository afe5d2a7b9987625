pub mod config;
pub mod context_engine;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod memory_db;
pub mod metrics;
pub mod personality;
pub mod profile;
pub mod search;
pub mod summarization;
pub mod telemetry;
pub mod utils;
pub mod worker_threads;

// Public API exports
pub use config::Config;
pub use context_engine::{
    ChatTurn, ContextAssembler, ContextBundle, ModelClient, PersonalitySource, ProfileSource, TurnOutcome,
};
pub use embedding::{
    CachedEmbeddingProvider, EmbeddingProvider, HashingEmbeddingProvider, HttpEmbeddingProvider,
};
pub use error::{MemoryError, Result};
pub use memory::{ChatSession, Message};
pub use memory_db::{MemoryDatabase, ScopedStore};
pub use personality::PersonalityTraits;
pub use profile::UserProfile;
pub use search::{cosine_similarity, search, SimilarityResult, SimilaritySearch};
pub use summarization::{ConfiguredSummarizer, Summarize, SummarizationEngine, SummarizationMethod};
pub use worker_threads::{
    OpenAiCompatibleClient, PassOutcome, Summarizer, SummaryEvent, TurnEvent, TurnWorker,
};
