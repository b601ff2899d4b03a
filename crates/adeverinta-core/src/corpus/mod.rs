//! Policy corpus: the static set of policy documents loaded at startup.
//!
//! Documents come from a directory of markdown files (one document per
//! file, id = file stem). Precomputed embeddings are attached from the
//! offline index file, an ordered list of `{id, filename, text, embedding}`
//! records.

mod document;
mod store;

pub use document::{IndexRecord, PolicyDocument};
pub use store::DocumentStore;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the corpus. All of them are fatal at
/// startup: a process that cannot load its corpus must not serve requests.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Corpus directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("Corpus directory contains no policy documents: {0}")]
    EmptyDirectory(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse index file {path}: {source}")]
    IndexParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),
}
