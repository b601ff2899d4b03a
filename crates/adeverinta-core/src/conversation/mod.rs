//! Conversation state machine.
//!
//! A conversation starts as an empty `need_info` [`FormState`]. Each user
//! turn yields [`FieldUpdates`]; [`ConversationMachine::advance`] turns the
//! prior state and those updates into a [`TurnOutcome`] without touching the
//! prior state, so a failed turn leaves nothing half-applied.

mod machine;
mod state;

pub use machine::{prompt_fields, question_for, ConversationMachine, TurnOutcome, MAX_PROMPT_FIELDS};
pub use state::{FieldUpdates, FormState, Status};

use thiserror::Error;

use crate::form::SchemaError;

/// Errors from advancing a conversation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversationError {
    #[error("Conversation is closed with status {0}; reset to start a new request")]
    Closed(Status),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
