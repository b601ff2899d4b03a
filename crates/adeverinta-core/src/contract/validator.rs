//! Semantic checks on collaborator responses.

use std::collections::BTreeSet;

use super::{validate_response_shape, CollaboratorResponse, ContractViolation};
use crate::conversation::{FieldUpdates, Status};
use crate::form::{FieldName, FieldValues, FormSchema};

/// A response that passed every check, with its payload as typed updates.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse {
    pub response: CollaboratorResponse,

    /// Non-empty payload values, canonicalized.
    pub updates: FieldUpdates,

    pub missing_fields: Vec<FieldName>,
}

/// Checks collaborator output before anything in it is trusted.
#[derive(Debug, Clone, Default)]
pub struct ContractValidator {
    schema: FormSchema,
}

impl ContractValidator {
    pub fn new(schema: FormSchema) -> Self {
        Self { schema }
    }

    /// Parse raw collaborator text and run every check.
    pub fn validate(
        &self,
        raw: &str,
        retrieved_ids: &[String],
    ) -> Result<ValidatedResponse, ContractViolation> {
        let response = Self::parse(raw)?;
        self.check(response, retrieved_ids)
    }

    /// JSON parse plus schema shape check.
    pub fn parse(raw: &str) -> Result<CollaboratorResponse, ContractViolation> {
        let value: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| ContractViolation::Malformed(vec![format!("Invalid JSON: {}", e)]))?;
        validate_response_shape(&value).map_err(ContractViolation::Malformed)?;
        serde_json::from_value(value)
            .map_err(|e| ContractViolation::Malformed(vec![e.to_string()]))
    }

    /// Semantic checks on an already parsed response.
    pub fn check(
        &self,
        response: CollaboratorResponse,
        retrieved_ids: &[String],
    ) -> Result<ValidatedResponse, ContractViolation> {
        let status = response.status;

        let missing_fields = response
            .missing_fields
            .iter()
            .map(|f| f.parse::<FieldName>())
            .collect::<Result<Vec<_>, _>>()?;

        if missing_fields.is_empty() == (status == Status::NeedInfo) {
            return Err(ContractViolation::MissingFieldsMismatch { status });
        }

        if status == Status::NeedInfo && response.next_question.trim().is_empty() {
            return Err(ContractViolation::EmptyNextQuestion);
        }

        let missing: BTreeSet<FieldName> = missing_fields.iter().copied().collect();
        if let Some(field) = FieldName::mentioned_in(&response.next_question)
            .into_iter()
            .find(|f| !missing.contains(f))
        {
            return Err(ContractViolation::QuestionOutsideMissing { field });
        }

        if response.instructions.trim().is_empty() == (status == Status::Ready) {
            return Err(ContractViolation::InstructionsMismatch { status });
        }

        if let Some(id) = response
            .policy_used
            .iter()
            .find(|id| !retrieved_ids.contains(id))
        {
            return Err(ContractViolation::PolicyNotRetrieved { id: id.clone() });
        }

        if status == Status::Forbidden && !response.payload.is_empty() {
            return Err(ContractViolation::ForbiddenWithPayload);
        }

        let raw_updates = FieldUpdates::from_payload(&response.payload)?;
        let mut values = FieldValues::new();
        for (field, raw) in raw_updates.iter() {
            if raw.trim().is_empty() {
                continue;
            }
            values.insert(field, self.schema.canonicalize(field, raw)?);
        }

        if status == Status::Ready {
            self.schema.check_complete(&values)?;
        }

        Ok(ValidatedResponse {
            updates: values.into_iter().collect(),
            missing_fields,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::SchemaError;
    use serde_json::json;

    fn retrieved() -> Vec<String> {
        vec!["motive-permise".into(), "motive-interzise".into(), "termen".into()]
    }

    fn need_info() -> serde_json::Value {
        json!({
            "status": "need_info",
            "message": "Motivul este acceptat.",
            "payload": { "motiv": "angajare", "nivel_studiu": "Licenta" },
            "missing_fields": ["nume_prenume_complet", "email"],
            "next_question": "Care este numele complet si adresa de email?",
            "instructions": "",
            "policy_used": ["motive-permise"]
        })
    }

    fn validate(value: serde_json::Value) -> Result<ValidatedResponse, ContractViolation> {
        ContractValidator::default().validate(&value.to_string(), &retrieved())
    }

    #[test]
    fn test_valid_need_info_response() {
        let validated = validate(need_info()).unwrap();
        assert_eq!(validated.updates.get(FieldName::NivelStudiu), Some("licenta"));
        assert_eq!(
            validated.missing_fields,
            vec![FieldName::NumePrenumeComplet, FieldName::Email]
        );
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let result = ContractValidator::default().validate("not json", &retrieved());
        assert!(matches!(result, Err(ContractViolation::Malformed(_))));
    }

    #[test]
    fn test_need_info_requires_missing_fields() {
        let mut value = need_info();
        value["missing_fields"] = json!([]);
        value["next_question"] = json!("Mai ai ceva de adaugat?");
        assert_eq!(
            validate(value),
            Err(ContractViolation::MissingFieldsMismatch {
                status: Status::NeedInfo
            })
        );
    }

    #[test]
    fn test_need_info_requires_question() {
        let mut value = need_info();
        value["next_question"] = json!("  ");
        assert_eq!(validate(value), Err(ContractViolation::EmptyNextQuestion));
    }

    #[test]
    fn test_question_must_stay_within_missing_fields() {
        let mut value = need_info();
        value["next_question"] = json!("Care este numele complet si numarul de telefon?");
        assert_eq!(
            validate(value),
            Err(ContractViolation::QuestionOutsideMissing {
                field: FieldName::Telefon
            })
        );
    }

    #[test]
    fn test_inflected_field_word_is_not_a_mention() {
        let mut value = need_info();
        value["next_question"] =
            json!("Am notat motivele tale. Care este numele complet si adresa de email?");
        assert!(validate(value).is_ok());
    }

    #[test]
    fn test_policy_must_come_from_retrieval() {
        let mut value = need_info();
        value["policy_used"] = json!(["regulament-general"]);
        assert_eq!(
            validate(value),
            Err(ContractViolation::PolicyNotRetrieved {
                id: "regulament-general".into()
            })
        );
    }

    #[test]
    fn test_instructions_only_when_ready() {
        let mut value = need_info();
        value["instructions"] = json!("Depune cererea.");
        assert!(matches!(
            validate(value),
            Err(ContractViolation::InstructionsMismatch { .. })
        ));
    }

    #[test]
    fn test_forbidden_payload_must_be_empty() {
        let value = json!({
            "status": "forbidden",
            "message": "Motiv interzis.",
            "payload": { "motiv": "evaziune fiscala" },
            "missing_fields": [],
            "next_question": "",
            "instructions": "",
            "policy_used": ["motive-interzise"],
            "reason": "evaziune fiscala"
        });
        assert_eq!(validate(value), Err(ContractViolation::ForbiddenWithPayload));
    }

    #[test]
    fn test_ready_with_incomplete_payload_is_schema_violation() {
        let value = json!({
            "status": "ready",
            "message": "Gata.",
            "payload": { "motiv": "angajare" },
            "missing_fields": [],
            "next_question": "",
            "instructions": "Depune cererea online.",
            "policy_used": []
        });
        assert!(matches!(
            validate(value),
            Err(ContractViolation::Schema(SchemaError::Incomplete(_)))
        ));
    }

    #[test]
    fn test_payload_value_outside_domain() {
        let mut value = need_info();
        value["payload"] = json!({ "regim_studiu": "gratuit" });
        assert!(matches!(
            validate(value),
            Err(ContractViolation::Schema(SchemaError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_empty_payload_values_are_dropped() {
        let mut value = need_info();
        value["payload"] = json!({ "motiv": "angajare", "email": "" });
        let validated = validate(value).unwrap();
        assert!(!validated.updates.contains(FieldName::Email));
    }
}
