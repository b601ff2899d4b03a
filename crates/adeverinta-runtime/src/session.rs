//! One conversation: history, collected form state, last prompt.
//!
//! A session is owned by whoever handles its current turn (`&mut`), so
//! two turns of the same conversation can never interleave. Nothing is
//! persisted; dropping or resetting a session discards it.

use adeverinta_core::{FieldName, FormState, TurnOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::ChatMessage;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: String,
    history: Vec<ChatMessage>,
    state: FormState,

    /// Fields the last question asked for
    asked: Vec<FieldName>,

    created_at: DateTime<Utc>,
    turns: u32,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            state: FormState::new(),
            asked: Vec::new(),
            created_at: Utc::now(),
            turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn asked(&self) -> &[FieldName] {
        &self.asked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of committed turns.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Start over: history and collected values are discarded.
    pub fn reset(&mut self) {
        tracing::debug!(session = %self.id, turns = self.turns, "Session reset");
        self.history.clear();
        self.state = FormState::new();
        self.asked.clear();
        self.created_at = Utc::now();
        self.turns = 0;
    }

    /// Apply a successful turn. The only place a session changes.
    pub(crate) fn commit(&mut self, user_text: &str, reply_text: String, outcome: &TurnOutcome) {
        self.history.push(ChatMessage::user(user_text));
        self.history.push(ChatMessage::assistant(reply_text));
        self.state = outcome.state.clone();
        self.asked = outcome.prompt_fields.clone();
        self.turns += 1;
    }
}
