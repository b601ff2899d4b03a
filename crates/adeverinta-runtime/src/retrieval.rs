//! Retrieval with an embedding collaborator in front of the core engine.
//!
//! Dense retrieval needs the query embedded by the same model that built
//! the index. The embedding call is cached, bounded by a timeout, retried
//! once, and guarded by the circuit breaker; any failure degrades to the
//! lexical backend instead of failing the turn.

use adeverinta_core::{Retrieval, RetrievalEngine, RetrievalError};
use std::sync::Arc;

use crate::cache::EmbeddingCache;
use crate::config::RetrievalConfig;
use crate::providers::EmbeddingProvider;
use crate::resilience::{retry_once, CircuitBreaker, Collaborator};

/// Retrieval front-end shared by all conversations.
pub struct RetrievalService {
    engine: Arc<RetrievalEngine>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    cache: EmbeddingCache,
    circuit_breaker: Arc<CircuitBreaker>,
    config: RetrievalConfig,
}

impl RetrievalService {
    /// Lexical-only service until an embedder is attached.
    pub fn new(engine: Arc<RetrievalEngine>, config: RetrievalConfig) -> Self {
        Self {
            engine,
            embedder: None,
            cache: EmbeddingCache::default(),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// Default number of snippets per turn.
    pub fn default_k(&self) -> usize {
        self.config.k
    }

    /// Rank the corpus for `query`. Never fails because of the embedding
    /// collaborator; only an invalid `k` is an error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }

        let vector = self.query_vector(query).await;
        let retrieval = self.engine.retrieve(query, vector.as_deref().map(Vec::as_slice), k)?;

        tracing::debug!(
            backend = ?retrieval.backend,
            results = retrieval.results.len(),
            top = retrieval.results.first().map(|r| r.id.as_str()).unwrap_or(""),
            "Retrieved policy snippets"
        );
        Ok(retrieval)
    }

    /// Embed the query if dense retrieval is possible, `None` otherwise.
    async fn query_vector(&self, query: &str) -> Option<Arc<Vec<f32>>> {
        let embedder = self.embedder.as_ref()?;
        if !self.engine.has_dense() {
            return None;
        }

        if let Some(cached) = self.cache.get(query).await {
            return Some(cached);
        }

        if self.circuit_breaker.is_open(Collaborator::Embedding) {
            tracing::warn!("Embedding circuit open, using lexical index");
            return None;
        }

        let result = retry_once(
            Collaborator::Embedding,
            self.config.embedding_timeout,
            self.config.retry_delay,
            || embedder.embed(query),
        )
        .await;

        match result {
            Ok(vector) => {
                self.circuit_breaker.record_success(Collaborator::Embedding);
                let vector = Arc::new(vector);
                self.cache.insert(query, vector.clone()).await;
                Some(vector)
            }
            Err(e) => {
                self.circuit_breaker.record_failure(Collaborator::Embedding);
                tracing::warn!(
                    provider = embedder.name(),
                    error = %e,
                    "Embedding failed, using lexical index"
                );
                None
            }
        }
    }
}
