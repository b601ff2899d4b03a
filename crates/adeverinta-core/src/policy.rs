//! Reason policy: the forbidden and allowed request reasons.
//!
//! A reason is forbidden ONLY when it matches an entry of the forbidden list.
//! Absence from both lists makes it ambiguous, never forbidden. Each list
//! entry is grouped under the id of the policy snippet that states it, so a
//! decision can cite its source.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::text;

/// Errors from loading a reason policy.
#[derive(Error, Debug)]
pub enum ReasonPolicyError {
    #[error("Failed to read reason policy: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse reason policy: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Reason policy validation failed: {0}")]
    Validation(String),
}

/// Reasons stated by one policy snippet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasonGroup {
    /// Id of the policy snippet stating these reasons.
    pub snippet: String,

    /// Reasons in their canonical spelling.
    pub reasons: Vec<String>,
}

/// The forbidden and allowed reason lists.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReasonPolicy {
    #[serde(default)]
    pub forbidden: Vec<ReasonGroup>,

    #[serde(default)]
    pub allowed: Vec<ReasonGroup>,
}

/// How a stated reason relates to the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ReasonClass {
    /// No reason stated yet.
    Unknown,

    /// Matches the forbidden list.
    Forbidden { reason: String, snippets: Vec<String> },

    /// Matches the allowed list.
    Allowed { reason: String, snippets: Vec<String> },

    /// Stated but found in neither list.
    Ambiguous { reason: String },
}

impl ReasonClass {
    /// Snippet ids justifying the classification.
    pub fn snippets(&self) -> &[String] {
        match self {
            ReasonClass::Forbidden { snippets, .. } | ReasonClass::Allowed { snippets, .. } => {
                snippets
            }
            _ => &[],
        }
    }
}

impl ReasonPolicy {
    /// Parse a policy from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ReasonPolicyError> {
        let policy: ReasonPolicy = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ReasonPolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), ReasonPolicyError> {
        if self.forbidden.iter().chain(&self.allowed).all(|g| g.reasons.is_empty()) {
            return Err(ReasonPolicyError::Validation(
                "policy lists no reasons".to_string(),
            ));
        }

        let mut forbidden = HashSet::new();
        for group in &self.forbidden {
            Self::validate_group(group)?;
            forbidden.extend(group.reasons.iter().map(|r| text::normalize(r)));
        }
        for group in &self.allowed {
            Self::validate_group(group)?;
            if let Some(r) = group
                .reasons
                .iter()
                .find(|r| forbidden.contains(&text::normalize(r)))
            {
                return Err(ReasonPolicyError::Validation(format!(
                    "reason '{}' is both forbidden and allowed",
                    r
                )));
            }
        }
        Ok(())
    }

    fn validate_group(group: &ReasonGroup) -> Result<(), ReasonPolicyError> {
        if group.snippet.trim().is_empty() {
            return Err(ReasonPolicyError::Validation(
                "reason group without snippet id".to_string(),
            ));
        }
        if group.reasons.iter().any(|r| text::normalize(r).is_empty()) {
            return Err(ReasonPolicyError::Validation(format!(
                "empty reason under snippet '{}'",
                group.snippet
            )));
        }
        Ok(())
    }

    /// Find a reason in a list; returns its canonical spelling and the ids
    /// of every snippet listing it.
    fn lookup(groups: &[ReasonGroup], normalized: &str) -> Option<(String, Vec<String>)> {
        let mut canonical = None;
        let mut snippets = Vec::new();
        for group in groups {
            if let Some(r) = group.reasons.iter().find(|r| text::normalize(r) == normalized) {
                canonical.get_or_insert_with(|| r.clone());
                if !snippets.contains(&group.snippet) {
                    snippets.push(group.snippet.clone());
                }
            }
        }
        canonical.map(|c| (c, snippets))
    }

    /// Classify a stated reason. Forbidden is checked first.
    pub fn classify(&self, reason: Option<&str>) -> ReasonClass {
        let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
            return ReasonClass::Unknown;
        };
        let normalized = text::normalize(reason);

        if let Some((reason, snippets)) = Self::lookup(&self.forbidden, &normalized) {
            return ReasonClass::Forbidden { reason, snippets };
        }
        if let Some((reason, snippets)) = Self::lookup(&self.allowed, &normalized) {
            return ReasonClass::Allowed { reason, snippets };
        }
        ReasonClass::Ambiguous {
            reason: reason.to_string(),
        }
    }

    /// Every listed reason (forbidden first), for phrase spotting in free text.
    pub fn all_reasons(&self) -> impl Iterator<Item = &str> {
        self.forbidden
            .iter()
            .chain(&self.allowed)
            .flat_map(|g| g.reasons.iter().map(String::as_str))
    }

    /// First listed reason named in `input` as a whole phrase, forbidden
    /// reasons first.
    pub fn find_in(&self, input: &str) -> Option<&str> {
        self.all_reasons().find(|r| text::contains_phrase(input, r))
    }
}
