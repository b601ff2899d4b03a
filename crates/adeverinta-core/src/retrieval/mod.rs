//! Retrieval over the policy corpus.
//!
//! Two flat-scan backends share one ranking contract:
//! - [`DenseIndex`]: cosine similarity against precomputed embeddings
//! - [`LexicalIndex`]: TF-IDF keyword scoring
//!
//! Results are sorted by non-increasing score; ties keep corpus order.
//! The [`RetrievalEngine`] prefers the dense backend when a query vector is
//! supplied and falls back to the lexical one otherwise.

mod dense;
mod engine;
mod lexical;

pub use dense::DenseIndex;
pub use engine::{Retrieval, RetrievalEngine};
pub use lexical::LexicalIndex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corpus::PolicyDocument;

/// Errors from retrieval.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("k must be at least 1")]
    InvalidK,

    #[error("Query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document embeddings have inconsistent dimensions ({first} vs {other} for '{id}')")]
    InconsistentEmbeddings {
        first: usize,
        other: usize,
        id: String,
    },

    #[error("Dense index not available")]
    DenseUnavailable,
}

/// Which backend served a retrieval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Dense,
    Lexical,
}

/// One ranked policy snippet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Sort documents by score (stable, descending) and keep the first `k`.
fn rank(documents: &[PolicyDocument], scores: Vec<f32>, k: usize) -> Vec<RetrievalResult> {
    let mut scored: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(k)
        .map(|(i, score)| RetrievalResult {
            id: documents[i].id.clone(),
            score,
            text: documents[i].text.clone(),
        })
        .collect()
}
