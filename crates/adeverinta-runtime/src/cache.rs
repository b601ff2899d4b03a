//! Query embedding cache.
//!
//! Users repeat themselves; caching embeddings by normalized query text
//! saves a collaborator round-trip per repeated turn.

use adeverinta_core::text::normalize;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Embedding cache using moka.
pub struct EmbeddingCache {
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    fn key(query: &str) -> String {
        normalize(query)
    }

    pub async fn get(&self, query: &str) -> Option<Arc<Vec<f32>>> {
        self.cache.get(&Self::key(query)).await
    }

    pub async fn insert(&self, query: &str, embedding: Arc<Vec<f32>>) {
        self.cache.insert(Self::key(query), embedding).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = EmbeddingCache::default();

        assert!(cache.get("Work and Travel").await.is_none());

        cache
            .insert("Work and Travel", Arc::new(vec![0.1, 0.2]))
            .await;

        let cached = cache.get("Work and Travel").await;
        assert_eq!(cached.unwrap().as_slice(), &[0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_key_ignores_case_and_diacritics() {
        let cache = EmbeddingCache::default();
        cache.insert("Adeverință pentru bursă", Arc::new(vec![1.0])).await;
        assert!(cache.get("adeverinta pentru bursa").await.is_some());
    }
}
