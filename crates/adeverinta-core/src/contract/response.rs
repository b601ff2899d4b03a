//! Wire form of a collaborator response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conversation::Status;

/// The single structured object a collaborator returns per turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaboratorResponse {
    pub status: Status,

    pub message: String,

    /// Field values collected so far, keyed by field identifier.
    #[serde(default)]
    pub payload: BTreeMap<String, String>,

    #[serde(default)]
    pub missing_fields: Vec<String>,

    #[serde(default)]
    pub next_question: String,

    #[serde(default)]
    pub instructions: String,

    /// Ids of the policy snippets the collaborator relied on.
    #[serde(default)]
    pub policy_used: Vec<String>,

    /// The user's stated reason, verbatim, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
