//! TF-IDF keyword index.
//!
//! `score(query, doc) = sum over distinct query terms of tf(term, doc) * idf(term)`
//! where `tf` is the raw term count in the document and
//! `idf(term) = 1 + ln(N / (1 + df(term)))`. With `df <= N` the idf stays
//! above `1 - ln 2`, so every score is non-negative.

use std::collections::{BTreeSet, HashMap};

use crate::corpus::DocumentStore;
use crate::text;

/// Term statistics for the whole corpus.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    /// Per document, in corpus order: term -> raw count.
    term_counts: Vec<HashMap<String, u32>>,

    /// Term -> inverse document frequency.
    idf: HashMap<String, f32>,
}

impl LexicalIndex {
    /// Build the index over every document of the store.
    pub fn build(store: &DocumentStore) -> Self {
        let term_counts: Vec<HashMap<String, u32>> = store
            .all_documents()
            .iter()
            .map(|doc| {
                let mut counts = HashMap::new();
                for term in text::tokenize(&doc.text) {
                    *counts.entry(term).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut document_frequency: HashMap<String, u32> = HashMap::new();
        for counts in &term_counts {
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let n = term_counts.len() as f32;
        let idf = document_frequency
            .into_iter()
            .map(|(term, df)| (term, 1.0 + (n / (1.0 + df as f32)).ln()))
            .collect();

        Self { term_counts, idf }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.term_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_counts.is_empty()
    }

    /// Score every document against the query, in corpus order.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let terms: BTreeSet<String> = text::tokenize(query).into_iter().collect();

        self.term_counts
            .iter()
            .map(|counts| {
                terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *counts.get(term)? as f32;
                        let idf = *self.idf.get(term)?;
                        Some(tf * idf)
                    })
                    .sum()
            })
            .collect()
    }
}
