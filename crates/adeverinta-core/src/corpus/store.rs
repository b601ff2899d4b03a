//! Document store: loads the corpus once, read-only afterwards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::{CorpusError, IndexRecord, PolicyDocument};

/// The immutable policy corpus.
///
/// Built once at startup and shared read-only (typically behind an `Arc`)
/// by every conversation.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<PolicyDocument>,
}

impl DocumentStore {
    /// Build a store from documents already in memory.
    ///
    /// An empty store is allowed here; retrieval over it yields no results.
    pub fn from_documents(documents: Vec<PolicyDocument>) -> Result<Self, CorpusError> {
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(CorpusError::DuplicateId(doc.id.clone()));
            }
        }
        Ok(Self { documents })
    }

    /// Load every `*.md` file of `dir` as a document, in file-name order.
    ///
    /// Fails if the directory does not exist or holds no non-empty
    /// markdown file.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CorpusError::MissingDirectory(dir.to_path_buf()));
        }

        let io_err = |source| CorpusError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files: Vec<String> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.to_lowercase().ends_with(".md"))
            .collect();
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for filename in files {
            let path = dir.join(&filename);
            let text = fs::read_to_string(&path).map_err(|source| CorpusError::Io {
                path: path.clone(),
                source,
            })?;
            let text = text.trim();
            if text.is_empty() {
                tracing::warn!(file = %filename, "Skipping empty policy document");
                continue;
            }
            let id = filename[..filename.len() - ".md".len()].to_string();
            documents.push(PolicyDocument::new(id, text));
        }

        if documents.is_empty() {
            return Err(CorpusError::EmptyDirectory(dir.to_path_buf()));
        }

        tracing::info!(dir = %dir.display(), documents = documents.len(), "Policy corpus loaded");
        Self::from_documents(documents)
    }

    /// Read the offline dense index file.
    pub fn read_index_file(path: impl AsRef<Path>) -> Result<Vec<IndexRecord>, CorpusError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| CorpusError::IndexParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Attach precomputed embeddings by document id.
    ///
    /// Records for unknown ids are ignored; documents without a record keep
    /// no embedding.
    pub fn with_embeddings(mut self, records: Vec<IndexRecord>) -> Self {
        let mut by_id: HashMap<String, Vec<f32>> = records
            .into_iter()
            .map(|r| (r.id, r.embedding))
            .collect();

        for doc in &mut self.documents {
            if let Some(embedding) = by_id.remove(&doc.id) {
                doc.embedding = Some(embedding);
            } else {
                tracing::warn!(id = %doc.id, "No precomputed embedding for policy document");
            }
        }
        for id in by_id.keys() {
            tracing::warn!(id = %id, "Index record has no matching policy document");
        }
        self
    }

    /// Every document, in corpus order.
    pub fn all_documents(&self) -> &[PolicyDocument] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&PolicyDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
