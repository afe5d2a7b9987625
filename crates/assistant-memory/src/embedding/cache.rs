//! Memoising wrapper around any embedding provider.
//!
//! A turn embeds the same user text for the message search, the summary
//! search and the log write; the cache turns that into one provider call.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{MemoryError, Result};

pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();
        let cached = self
            .cache
            .try_get_with(text.to_string(), async move {
                debug!("Embedding cache miss ({} chars)", owned.len());
                inner.embed(&owned).await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<MemoryError>| MemoryError::Embedding(e.to_string()))?;
        Ok(cached.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MemoryError::Embedding("offline".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let inner = Arc::new(CountingProvider { calls: AtomicUsize::new(0), fail: false });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 16);

        let a = cached.embed("what is your job?").await.unwrap();
        let b = cached.embed("what is your job?").await.unwrap();
        let _ = cached.embed("something else").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        cached.sync().await;
        assert_eq!(cached.entry_count(), 2);
        assert_eq!(cached.dimension(), 2);
        assert_eq!(cached.model_name(), "counting");
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(CountingProvider { calls: AtomicUsize::new(0), fail: true });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 16);

        assert!(matches!(cached.embed("x").await, Err(MemoryError::Embedding(_))));
        assert!(cached.embed("x").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
