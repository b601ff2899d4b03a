use serde::{Deserialize, Serialize};

/// One policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    /// Unique identifier, derived from the file name.
    pub id: String,

    /// The rule text.
    pub text: String,

    /// Precomputed embedding, when the offline index provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl PolicyDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A record of the offline dense index file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub filename: String,
    pub text: String,
    pub embedding: Vec<f32>,
}
