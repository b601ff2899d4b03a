//! Retrieval engine: picks a backend and ranks the corpus.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::corpus::DocumentStore;

use super::{rank, Backend, DenseIndex, LexicalIndex, RetrievalError, RetrievalResult};

/// Ranked results and the backend that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Retrieval {
    pub backend: Backend,
    pub results: Vec<RetrievalResult>,
}

impl Retrieval {
    /// Ids of the returned snippets, in rank order.
    pub fn ids(&self) -> Vec<String> {
        self.results.iter().map(|r| r.id.clone()).collect()
    }
}

/// Flat-scan retrieval over an immutable corpus.
///
/// Safe to share across threads: nothing is mutated after construction.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    store: Arc<DocumentStore>,
    lexical: LexicalIndex,
    dense: Option<DenseIndex>,
}

impl RetrievalEngine {
    /// Build both indexes over the store.
    pub fn new(store: Arc<DocumentStore>) -> Result<Self, RetrievalError> {
        let lexical = LexicalIndex::build(&store);
        let dense = DenseIndex::build(&store)?;
        tracing::debug!(
            documents = store.len(),
            dense = dense.is_some(),
            "Retrieval engine built"
        );
        Ok(Self {
            store,
            lexical,
            dense,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Whether the corpus carries embeddings for dense retrieval.
    pub fn has_dense(&self) -> bool {
        self.dense.is_some()
    }

    /// Dimension of the dense index, if any.
    pub fn dense_dimension(&self) -> Option<usize> {
        self.dense.as_ref().map(DenseIndex::dimension)
    }

    /// Rank by TF-IDF keyword score.
    pub fn retrieve_lexical(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }
        let scores = self.lexical.scores(query);
        Ok(rank(self.store.all_documents(), scores, k))
    }

    /// Rank by cosine similarity to a query embedding.
    pub fn retrieve_dense(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }
        let dense = self.dense.as_ref().ok_or(RetrievalError::DenseUnavailable)?;
        let scores = dense.scores(query_vector)?;
        Ok(rank(self.store.all_documents(), scores, k))
    }

    /// Rank with the dense backend when a query vector is available and
    /// usable, otherwise with the lexical backend.
    pub fn retrieve(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        k: usize,
    ) -> Result<Retrieval, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }

        if let (Some(vector), Some(_)) = (query_vector, &self.dense) {
            match self.retrieve_dense(vector, k) {
                Ok(results) => {
                    return Ok(Retrieval {
                        backend: Backend::Dense,
                        results,
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dense retrieval failed, using lexical index");
                }
            }
        }

        Ok(Retrieval {
            backend: Backend::Lexical,
            results: self.retrieve_lexical(query, k)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PolicyDocument;
    use proptest::prelude::*;

    fn engine() -> RetrievalEngine {
        let store = DocumentStore::from_documents(vec![
            PolicyDocument::new("motive-permise", "Motive permise: angajare, Work and Travel, bursa.")
                .with_embedding(vec![1.0, 0.0, 0.0]),
            PolicyDocument::new("motive-interzise", "Motive interzise: evaziune fiscala.")
                .with_embedding(vec![0.0, 1.0, 0.0]),
            PolicyDocument::new("termen", "Termenul de eliberare: 3 zile lucratoare, 5 pentru absolventi.")
                .with_embedding(vec![0.0, 0.0, 1.0]),
        ])
        .unwrap();
        RetrievalEngine::new(Arc::new(store)).unwrap()
    }

    #[test]
    fn test_dense_preferred_when_vector_given() {
        let engine = engine();
        let retrieval = engine.retrieve("anything", Some(&[0.1, 0.9, 0.0]), 2).unwrap();
        assert_eq!(retrieval.backend, Backend::Dense);
        assert_eq!(retrieval.ids(), vec!["motive-interzise", "motive-permise"]);
    }

    #[test]
    fn test_lexical_without_vector() {
        let engine = engine();
        let retrieval = engine.retrieve("evaziune fiscala", None, 1).unwrap();
        assert_eq!(retrieval.backend, Backend::Lexical);
        assert_eq!(retrieval.ids(), vec!["motive-interzise"]);
    }

    #[test]
    fn test_dimension_mismatch_falls_back_to_lexical() {
        let engine = engine();
        let retrieval = engine.retrieve("termenul", Some(&[1.0]), 1).unwrap();
        assert_eq!(retrieval.backend, Backend::Lexical);
        assert_eq!(retrieval.ids(), vec!["termen"]);
    }

    #[test]
    fn test_zero_k_rejected() {
        assert_eq!(
            engine().retrieve("x", None, 0),
            Err(RetrievalError::InvalidK)
        );
    }

    #[test]
    fn test_empty_corpus_returns_empty() {
        let engine = RetrievalEngine::new(Arc::new(DocumentStore::default())).unwrap();
        let retrieval = engine.retrieve("Work and Travel", None, 3).unwrap();
        assert!(retrieval.results.is_empty());
        assert!(!engine.has_dense());
    }

    proptest! {
        #[test]
        fn prop_lexical_bounded_sorted_nonnegative(query in "[a-z ]{0,40}", k in 1usize..6) {
            let engine = engine();
            let results = engine.retrieve_lexical(&query, k).unwrap();
            prop_assert!(results.len() <= k);
            prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            prop_assert!(results.iter().all(|r| r.score >= 0.0));
        }

        #[test]
        fn prop_dense_scores_within_unit_range(
            v in proptest::collection::vec(-10.0f32..10.0, 3),
            k in 1usize..6,
        ) {
            let engine = engine();
            let results = engine.retrieve_dense(&v, k).unwrap();
            prop_assert!(results.len() <= k);
            prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            prop_assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
        }

        #[test]
        fn prop_retrieval_is_idempotent(query in "[a-z ]{0,40}", k in 1usize..4) {
            let engine = engine();
            let first = engine.retrieve(&query, None, k).unwrap();
            let second = engine.retrieve(&query, None, k).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
