//! Cosine-similarity ranking over stored messages and summaries
//!
//! Search is a linear scan. The message corpus is capped at the most recent
//! rows, which bounds the cost of each query.
pub mod similarity_search;

pub use similarity_search::SimilaritySearch;

use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::Result;
use crate::memory_db::EmbeddedText;
use crate::metrics;

/// One ranked candidate. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub source_id: i64,
    pub content: String,
    pub similarity_score: f32,
}

/// Cosine of the angle between `a` and `b`; 0.0 when the lengths differ or
/// either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    // f64 accumulation keeps self-similarity at exactly 1.0 after rounding
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Scores every candidate against `query`, sorts descending and keeps
/// `top_k`. Exact ties keep corpus order; NaN scores sink to the bottom.
pub fn rank(query: &[f32], corpus: &[EmbeddedText], top_k: usize) -> Vec<SimilarityResult> {
    if corpus.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let scores: Vec<f32> = corpus
        .par_iter()
        .map(|candidate| cosine_similarity(query, &candidate.embedding))
        .collect();

    let mut order: Vec<usize> = (0..corpus.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| compare_scores(scores[b], scores[a]));
    order.truncate(top_k);

    order
        .into_iter()
        .map(|i| SimilarityResult {
            source_id: corpus[i].id,
            content: corpus[i].text.clone(),
            similarity_score: scores[i],
        })
        .collect()
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Embeds `query` once and ranks `corpus` against it.
///
/// An empty corpus short-circuits before the provider is called.
pub async fn search(
    provider: &dyn EmbeddingProvider,
    query: &str,
    corpus: &[EmbeddedText],
    top_k: usize,
) -> Result<Vec<SimilarityResult>> {
    if corpus.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }
    let query_embedding = embed_checked(provider, query).await?;
    Ok(timed_rank(&query_embedding, corpus, top_k, "adhoc"))
}

/// `rank` with search metrics recorded under `corpus_label`.
pub(crate) fn timed_rank(
    query: &[f32],
    corpus: &[EmbeddedText],
    top_k: usize,
    corpus_label: &str,
) -> Vec<SimilarityResult> {
    let started = Instant::now();
    let results = rank(query, corpus, top_k);
    let elapsed = started.elapsed();
    metrics::inc_search(corpus_label);
    metrics::observe_search(elapsed.as_secs_f64());
    debug!(
        "Ranked {} {} candidates in {:?}, kept {}",
        corpus.len(),
        corpus_label,
        elapsed,
        results.len()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use proptest::prelude::*;

    fn entry(id: i64, embedding: Vec<f32>) -> EmbeddedText {
        EmbeddedText {
            id,
            text: format!("entry {}", id),
            embedding,
        }
    }

    #[test]
    fn test_cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_descending_and_truncates() {
        let corpus = vec![
            entry(1, vec![0.0, 1.0]),
            entry(2, vec![1.0, 0.0]),
            entry(3, vec![1.0, 1.0]),
        ];
        let results = rank(&[1.0, 0.0], &corpus, 2);
        let ids: Vec<i64> = results.iter().map(|r| r.source_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(results[0].similarity_score >= results[1].similarity_score);
    }

    #[test]
    fn test_exact_ties_keep_corpus_order() {
        let corpus = vec![
            entry(7, vec![1.0, 0.0]),
            entry(3, vec![2.0, 0.0]),
            entry(5, vec![0.5, 0.0]),
        ];
        let ids: Vec<i64> = rank(&[1.0, 0.0], &corpus, 10).iter().map(|r| r.source_id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn test_top_k_larger_than_corpus_returns_everything() {
        let corpus = vec![entry(1, vec![1.0, 0.0]), entry(2, vec![0.0, 1.0])];
        assert_eq!(rank(&[1.0, 1.0], &corpus, 50).len(), 2);
        assert!(rank(&[1.0, 1.0], &corpus, 0).is_empty());
    }

    #[test]
    fn test_nan_scores_sink() {
        let corpus = vec![entry(1, vec![f32::NAN, 0.0]), entry(2, vec![0.1, 0.0])];
        let results = rank(&[1.0, 0.0], &corpus, 2);
        assert_eq!(results[0].source_id, 2);
        assert!(results[1].similarity_score.is_nan());
    }

    #[tokio::test]
    async fn test_search_empty_corpus_is_empty() {
        let provider = HashingEmbeddingProvider::new(16);
        let results = search(&provider, "anything", &[], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_idempotent() {
        let provider = HashingEmbeddingProvider::new(64);
        let texts = ["I like hiking", "My favorite color is blue", "hiking in the blue mountains"];
        let corpus: Vec<EmbeddedText> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| EmbeddedText {
                id: i as i64 + 1,
                text: t.to_string(),
                embedding: provider.embed_sync(t).unwrap(),
            })
            .collect();

        let first = search(&provider, "hiking trips", &corpus, 3).await.unwrap();
        let second = search(&provider, "hiking trips", &corpus, 3).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_rank_length_and_order(
            vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..20),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            top_k in 0usize..30,
        ) {
            let corpus: Vec<EmbeddedText> = vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| entry(i as i64, v))
                .collect();
            let results = rank(&query, &corpus, top_k);
            prop_assert_eq!(results.len(), top_k.min(corpus.len()));
            for pair in results.windows(2) {
                prop_assert!(pair[0].similarity_score >= pair[1].similarity_score);
            }
        }

        #[test]
        fn prop_self_similarity_is_one(v in prop::collection::vec(-10.0f32..10.0, 1..64)) {
            prop_assume!(v.iter().any(|x| *x != 0.0));
            prop_assert_eq!(cosine_similarity(&v, &v), 1.0);
        }
    }
}
