//! Dense index over precomputed document embeddings.

use crate::corpus::DocumentStore;

use super::RetrievalError;

/// Cosine similarity with zero-norm and length guards.
///
/// Returns 0 when either vector has zero norm or the lengths differ, and
/// clamps the result to `[-1, 1]` against rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// One embedding slot per corpus document.
///
/// Documents without an embedding hold `None` and always score 0.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dimension: usize,
    vectors: Vec<Option<Vec<f32>>>,
}

impl DenseIndex {
    /// Build from the embeddings attached to the store.
    ///
    /// Returns `Ok(None)` when no document carries an embedding, and an
    /// error when embeddings disagree on dimension.
    pub fn build(store: &DocumentStore) -> Result<Option<Self>, RetrievalError> {
        let mut dimension: Option<usize> = None;
        let mut vectors = Vec::with_capacity(store.len());

        for doc in store.all_documents() {
            if let Some(embedding) = &doc.embedding {
                match dimension {
                    None => dimension = Some(embedding.len()),
                    Some(dim) if dim != embedding.len() => {
                        return Err(RetrievalError::InconsistentEmbeddings {
                            first: dim,
                            other: embedding.len(),
                            id: doc.id.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            vectors.push(doc.embedding.clone());
        }

        Ok(dimension.map(|dimension| Self { dimension, vectors }))
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Score every document against the query vector, in corpus order.
    pub fn scores(&self, query: &[f32]) -> Result<Vec<f32>, RetrievalError> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        Ok(self
            .vectors
            .iter()
            .map(|v| v.as_deref().map_or(0.0, |v| cosine_similarity(query, v)))
            .collect())
    }
}
