//! JSON Schema shape check for collaborator responses.
//!
//! The schema is embedded at compile time from
//! `schema/collaborator_response.schema.json` and compiled once.

use std::sync::OnceLock;

const RESPONSE_SCHEMA_JSON: &str = include_str!("../../schema/collaborator_response.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(RESPONSE_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });
    result.as_ref().map_err(Clone::clone)
}

/// Validate a raw response value against the schema.
///
/// Returns every schema error, each with the offending instance path.
pub fn validate_response_shape(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
