//! Store-backed search entry points used by the CLI and callers that do not
//! hold a scoped connection.
use std::sync::Arc;

use tracing::debug;

use super::{timed_rank, SimilarityResult};
use crate::embedding::embed_checked;
use crate::error::Result;
use crate::memory_db::{MemoryDatabase, DEFAULT_SEARCH_CAP};

pub struct SimilaritySearch {
    database: Arc<MemoryDatabase>,
    corpus_cap: usize,
}

impl SimilaritySearch {
    pub fn new(database: Arc<MemoryDatabase>) -> Self {
        Self {
            database,
            corpus_cap: DEFAULT_SEARCH_CAP,
        }
    }

    pub fn with_corpus_cap(mut self, corpus_cap: usize) -> Self {
        self.corpus_cap = corpus_cap;
        self
    }

    /// Top `top_k` of the most recent `corpus_cap` messages.
    pub async fn similar_messages(&self, query: &str, top_k: usize) -> Result<Vec<SimilarityResult>> {
        let corpus = self.database.scoped().await?.all_messages_with_embeddings(self.corpus_cap)?;
        if corpus.is_empty() {
            debug!("Message corpus empty, skipping query embedding");
            return Ok(Vec::new());
        }
        let query_embedding = embed_checked(self.database.embedder().as_ref(), query).await?;
        Ok(timed_rank(&query_embedding, &corpus, top_k, "messages"))
    }

    pub async fn relevant_summaries(&self, query: &str, top_k: usize) -> Result<Vec<SimilarityResult>> {
        let corpus = self.database.scoped().await?.all_summaries_with_embeddings()?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = embed_checked(self.database.embedder().as_ref(), query).await?;
        Ok(timed_rank(&query_embedding, &corpus, top_k, "summaries"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use chrono::{TimeZone, Utc};

    fn search_over(db: MemoryDatabase) -> (Arc<MemoryDatabase>, SimilaritySearch) {
        let db = Arc::new(db);
        let search = SimilaritySearch::new(Arc::clone(&db));
        (db, search)
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let (_db, search) =
            search_over(MemoryDatabase::new_in_memory(Arc::new(HashingEmbeddingProvider::new(32))).unwrap());
        assert!(search.similar_messages("hello", 5).await.unwrap().is_empty());
        assert!(search.relevant_summaries("hello", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exact_text_ranks_first() {
        let (db, search) =
            search_over(MemoryDatabase::new_in_memory(Arc::new(HashingEmbeddingProvider::new(128))).unwrap());
        for text in ["planning a trip to the coast", "the quarterly budget review", "feeding the cat"] {
            db.messages.add_message(text).await.unwrap();
        }
        let results = search.similar_messages("the quarterly budget review", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "the quarterly budget review");
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_corpus_cap_limits_candidates() {
        let (db, _) =
            search_over(MemoryDatabase::new_in_memory(Arc::new(HashingEmbeddingProvider::new(64))).unwrap());
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        db.messages.add_message_at("an old note about gardening", base).await.unwrap();
        db.messages
            .add_message_at("a newer note about cooking", base + chrono::Duration::hours(1))
            .await
            .unwrap();

        let capped = SimilaritySearch::new(Arc::clone(&db)).with_corpus_cap(1);
        let results = capped.similar_messages("gardening", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "a newer note about cooking");
    }

    #[tokio::test]
    async fn test_summaries_are_searchable() {
        let (db, search) =
            search_over(MemoryDatabase::new_in_memory(Arc::new(HashingEmbeddingProvider::new(64))).unwrap());
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.summaries.add_summary("discussed hiking routes", t, t).await.unwrap();
        db.summaries.add_summary("discussed tax paperwork", t, t).await.unwrap();

        let results = search.relevant_summaries("hiking", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "discussed hiking routes");
    }
}
