//! Contract between the core and the language collaborator.
//!
//! The collaborator returns one JSON object per turn. Nothing in it is
//! trusted until it passes two stages: a JSON Schema shape check, then the
//! semantic checks of [`ContractValidator`]. A failure at either stage is a
//! [`ContractViolation`], distinct from transport failures.

mod response;
mod schema;
mod validator;

pub use response::CollaboratorResponse;
pub use schema::validate_response_shape;
pub use validator::{ContractValidator, ValidatedResponse};

use thiserror::Error;

use crate::conversation::Status;
use crate::form::{FieldName, SchemaError};

/// Ways a collaborator response can break the contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("Malformed response: {}", .0.join("; "))]
    Malformed(Vec<String>),

    #[error("missing_fields must be non-empty exactly when status is need_info (status: {status})")]
    MissingFieldsMismatch { status: Status },

    #[error("next_question is empty while status is need_info")]
    EmptyNextQuestion,

    #[error("next_question asks for {field}, which is not in missing_fields")]
    QuestionOutsideMissing { field: FieldName },

    #[error("instructions must be non-empty exactly when status is ready (status: {status})")]
    InstructionsMismatch { status: Status },

    #[error("policy_used cites '{id}', which was not retrieved this turn")]
    PolicyNotRetrieved { id: String },

    #[error("Forbidden response carries a payload")]
    ForbiddenWithPayload,

    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaError),
}
