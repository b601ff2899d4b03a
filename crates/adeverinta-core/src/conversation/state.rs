//! Form state and per-turn field updates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::form::{FieldName, FieldValues, SchemaError};

/// Status of a certificate request.
///
/// `need_info` is the only non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Forbidden,
    #[default]
    NeedInfo,
    Ready,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::NeedInfo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Forbidden => "forbidden",
            Status::NeedInfo => "need_info",
            Status::Ready => "ready",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collected values and the current status of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FormState {
    values: FieldValues,
    status: Status,
}

impl FormState {
    /// Empty `need_info` state at conversation start.
    pub fn new() -> Self {
        Self::default()
    }

    /// A `need_info` state holding `values`.
    pub fn collecting(values: FieldValues) -> Self {
        Self {
            values,
            status: Status::NeedInfo,
        }
    }

    pub(crate) fn forbidden() -> Self {
        Self {
            values: FieldValues::new(),
            status: Status::Forbidden,
        }
    }

    pub(crate) fn with_status(values: FieldValues, status: Status) -> Self {
        Self { values, status }
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Whether no further turns are accepted.
    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Candidate field values extracted from one user turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldUpdates(BTreeMap<FieldName, String>);

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a collaborator payload, rejecting keys outside the field set.
    pub fn from_payload(payload: &BTreeMap<String, String>) -> Result<Self, SchemaError> {
        let mut updates = Self::new();
        for (key, value) in payload {
            updates.insert(key.parse()?, value.clone());
        }
        Ok(updates)
    }

    /// Set a field, replacing any earlier value from the same turn.
    pub fn insert(&mut self, field: FieldName, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, field: FieldName, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0.contains_key(&field)
    }

    pub fn remove(&mut self, field: FieldName) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Merge `other` into `self`; values from `other` win.
    pub fn extend(&mut self, other: FieldUpdates) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(FieldName, String)> for FieldUpdates {
    fn from_iter<I: IntoIterator<Item = (FieldName, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
