//! Form schema: the closed field set, per-field value domains and the
//! conditional requirement rules.

mod field;
mod schema;

pub use field::FieldName;
pub use schema::{
    Domain, FieldSpec, FieldValues, FormSchema, Requirement, DA_NU, MOTIV_ECHIVALARE,
    NIVEL_STUDIU, NOT_APPLICABLE, REGIM_STUDIU, SITUATIE_STUDENT, TIP_MEDIE,
};

use thiserror::Error;

/// Errors raised when data does not fit the form schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: '{value}' (expected {expected})")]
    InvalidValue {
        field: FieldName,
        value: String,
        expected: String,
    },

    #[error("Required fields missing: {0:?}")]
    Incomplete(Vec<FieldName>),
}
