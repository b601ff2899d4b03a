//! Field specifications for the certificate request form.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::{FieldName, SchemaError};
use crate::text;

/// Collected field values, ordered by field declaration.
pub type FieldValues = BTreeMap<FieldName, String>;

/// Sentinel meaning "not applicable".
pub const NOT_APPLICABLE: &str = "-";

lazy_static! {
    /// Email address shape (RFC 5322 simplified).
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();

    /// Phone number: optional leading +, 7 to 15 digits with common separators.
    static ref PHONE_PATTERN: Regex = Regex::new(
        r"^\+?[0-9](?:[\s.-]?[0-9]){6,14}$"
    ).unwrap();
}

/// The value domain of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// One of a closed set of spellings (compared after normalization).
    Choice(&'static [&'static str]),

    /// Any non-empty text other than the sentinel.
    Text,

    /// Any non-empty text, or the `"-"` sentinel.
    TextOrNotApplicable,

    /// An email address.
    Email,

    /// A phone number.
    Phone,
}

impl Domain {
    /// Map a raw value onto its canonical spelling, or `None` if the value
    /// is outside the domain.
    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        match self {
            Domain::Choice(options) => {
                let wanted = text::normalize(value);
                options
                    .iter()
                    .find(|opt| text::normalize(opt) == wanted)
                    .map(|opt| opt.to_string())
            }
            Domain::Text => (value != NOT_APPLICABLE).then(|| value.to_string()),
            Domain::TextOrNotApplicable => {
                let norm = text::normalize(value);
                if value == NOT_APPLICABLE || norm == "nu se aplica" || norm == "n a" {
                    Some(NOT_APPLICABLE.to_string())
                } else {
                    Some(value.to_string())
                }
            }
            Domain::Email => EMAIL_PATTERN
                .is_match(value)
                .then(|| value.to_lowercase()),
            Domain::Phone => PHONE_PATTERN.is_match(value).then(|| value.to_string()),
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Domain::Choice(options) => format!("one of {:?}", options),
            Domain::Text => "non-empty text".to_string(),
            Domain::TextOrNotApplicable => "text or \"-\"".to_string(),
            Domain::Email => "an email address".to_string(),
            Domain::Phone => "a phone number".to_string(),
        }
    }
}

/// When a field must be collected.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// Always required.
    Always,

    /// Required only while `field` currently holds `equals`.
    When {
        field: FieldName,
        equals: &'static str,
    },
}

/// Declaration of a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: FieldName,
    pub requirement: Requirement,
    pub domain: Domain,
}

impl FieldSpec {
    fn always(name: FieldName, domain: Domain) -> Self {
        Self {
            name,
            requirement: Requirement::Always,
            domain,
        }
    }

    fn when(name: FieldName, field: FieldName, equals: &'static str, domain: Domain) -> Self {
        Self {
            name,
            requirement: Requirement::When { field, equals },
            domain,
        }
    }
}

/// The certificate request form.
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
}

pub const SITUATIE_STUDENT: &[&str] = &["student in prezent", "absolvent", "retras"];
pub const NIVEL_STUDIU: &[&str] = &["licenta", "master"];
pub const REGIM_STUDIU: &[&str] = &["buget", "taxa", "prelungire studii"];
pub const DA_NU: &[&str] = &["Da", "Nu"];
pub const TIP_MEDIE: &[&str] = &["medie admitere", "medie semestru anterior", "medie an anterior"];

/// Reason value that triggers the course-equivalence field.
pub const MOTIV_ECHIVALARE: &str = "echivalare disciplina";

impl FormSchema {
    /// The standard certificate form: 14 unconditional fields and 2
    /// conditional ones.
    pub fn standard() -> Self {
        use FieldName::*;
        Self {
            fields: vec![
                FieldSpec::always(NumePrenumeComplet, Domain::Text),
                FieldSpec::always(NumarMatricol, Domain::Text),
                FieldSpec::always(SituatieStudent, Domain::Choice(SITUATIE_STUDENT)),
                FieldSpec::always(NivelStudiu, Domain::Choice(NIVEL_STUDIU)),
                FieldSpec::always(RegimStudiu, Domain::Choice(REGIM_STUDIU)),
                FieldSpec::always(AnStudiu, Domain::Text),
                FieldSpec::always(Specializare, Domain::Text),
                FieldSpec::always(PersoanaBeneficiar, Domain::TextOrNotApplicable),
                FieldSpec::always(InstitutieDestinatie, Domain::TextOrNotApplicable),
                FieldSpec::always(JudetSauTara, Domain::TextOrNotApplicable),
                FieldSpec::always(Motiv, Domain::Text),
                FieldSpec::when(EchivalareDisciplina, Motiv, MOTIV_ECHIVALARE, Domain::Text),
                FieldSpec::always(MediePeAdeverinta, Domain::Choice(DA_NU)),
                FieldSpec::when(TipMedie, MediePeAdeverinta, "Da", Domain::Choice(TIP_MEDIE)),
                FieldSpec::always(Telefon, Domain::Phone),
                FieldSpec::always(Email, Domain::Email),
            ],
        }
    }

    /// All field specs in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Spec for one field.
    pub fn spec(&self, field: FieldName) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.name == field)
    }

    /// Fields required regardless of other values.
    pub fn unconditional_fields(&self) -> Vec<FieldName> {
        self.fields
            .iter()
            .filter(|s| s.requirement == Requirement::Always)
            .map(|s| s.name)
            .collect()
    }

    /// Required fields given the current values: every unconditional field
    /// plus each conditional field whose trigger currently holds.
    pub fn required_fields(&self, values: &FieldValues) -> BTreeSet<FieldName> {
        self.fields
            .iter()
            .filter(|s| match &s.requirement {
                Requirement::Always => true,
                Requirement::When { field, equals } => values
                    .get(field)
                    .is_some_and(|v| text::normalize(v) == text::normalize(equals)),
            })
            .map(|s| s.name)
            .collect()
    }

    /// Required fields not yet present, in declaration order.
    pub fn missing_fields(&self, values: &FieldValues) -> Vec<FieldName> {
        let required = self.required_fields(values);
        self.fields
            .iter()
            .map(|s| s.name)
            .filter(|f| required.contains(f) && !values.contains_key(f))
            .collect()
    }

    /// Remove conditional fields whose trigger field is set to a different
    /// value. A conditional field given before its trigger is kept.
    pub fn prune_stale(&self, values: &mut FieldValues) -> Vec<FieldName> {
        let stale: Vec<FieldName> = self
            .fields
            .iter()
            .filter(|s| values.contains_key(&s.name))
            .filter(|s| match &s.requirement {
                Requirement::Always => false,
                Requirement::When { field, equals } => values
                    .get(field)
                    .is_some_and(|v| text::normalize(v) != text::normalize(equals)),
            })
            .map(|s| s.name)
            .collect();
        for field in &stale {
            values.remove(field);
        }
        stale
    }

    /// Canonicalize a value against the field's domain.
    pub fn canonicalize(&self, field: FieldName, raw: &str) -> Result<String, SchemaError> {
        let spec = self
            .spec(field)
            .ok_or_else(|| SchemaError::UnknownField(field.to_string()))?;
        spec.domain
            .canonicalize(raw)
            .ok_or_else(|| SchemaError::InvalidValue {
                field,
                value: raw.to_string(),
                expected: spec.domain.describe(),
            })
    }

    /// Fail unless every currently required field is present.
    pub fn check_complete(&self, values: &FieldValues) -> Result<(), SchemaError> {
        let missing = self.missing_fields(values);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Incomplete(missing))
        }
    }
}

impl Default for FormSchema {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_unconditional() -> FieldValues {
        let mut values = FieldValues::new();
        values.insert(FieldName::NumePrenumeComplet, "Popescu Ion".into());
        values.insert(FieldName::NumarMatricol, "1234".into());
        values.insert(FieldName::SituatieStudent, "student in prezent".into());
        values.insert(FieldName::NivelStudiu, "licenta".into());
        values.insert(FieldName::RegimStudiu, "buget".into());
        values.insert(FieldName::AnStudiu, "2".into());
        values.insert(FieldName::Specializare, "Engleza-Franceza".into());
        values.insert(FieldName::PersoanaBeneficiar, "-".into());
        values.insert(FieldName::InstitutieDestinatie, "-".into());
        values.insert(FieldName::JudetSauTara, "-".into());
        values.insert(FieldName::Motiv, "angajare".into());
        values.insert(FieldName::MediePeAdeverinta, "Nu".into());
        values.insert(FieldName::Telefon, "0722 123 456".into());
        values.insert(FieldName::Email, "ion@example.com".into());
        values
    }

    #[test]
    fn test_fourteen_unconditional_fields() {
        let schema = FormSchema::standard();
        assert_eq!(schema.unconditional_fields().len(), 14);
        assert_eq!(schema.fields().len(), 16);
        assert_eq!(schema.required_fields(&FieldValues::new()).len(), 14);
    }

    #[test]
    fn test_echivalare_triggered_by_reason() {
        let schema = FormSchema::standard();
        let mut values = all_unconditional();
        assert!(schema.missing_fields(&values).is_empty());

        values.insert(FieldName::Motiv, "Echivalare disciplina".into());
        assert_eq!(
            schema.missing_fields(&values),
            vec![FieldName::EchivalareDisciplina]
        );
    }

    #[test]
    fn test_tip_medie_follows_current_trigger_value() {
        let schema = FormSchema::standard();
        let mut values = all_unconditional();
        values.insert(FieldName::MediePeAdeverinta, "Da".into());
        assert_eq!(schema.missing_fields(&values), vec![FieldName::TipMedie]);

        values.insert(FieldName::MediePeAdeverinta, "Nu".into());
        assert!(schema.check_complete(&values).is_ok());
    }

    #[test]
    fn test_prune_stale_drops_untriggered_conditionals() {
        let schema = FormSchema::standard();
        let mut values = all_unconditional();
        values.insert(FieldName::MediePeAdeverinta, "Nu".into());
        values.insert(FieldName::TipMedie, "medie admitere".into());
        values.insert(FieldName::EchivalareDisciplina, "Latina".into());

        let pruned = schema.prune_stale(&mut values);
        assert_eq!(pruned, vec![FieldName::EchivalareDisciplina, FieldName::TipMedie]);
        assert!(!values.contains_key(&FieldName::TipMedie));
        assert!(!values.contains_key(&FieldName::EchivalareDisciplina));
    }

    #[test]
    fn test_prune_stale_keeps_value_given_before_trigger() {
        let schema = FormSchema::standard();
        let mut values = FieldValues::new();
        values.insert(FieldName::TipMedie, "medie admitere".into());
        assert!(schema.prune_stale(&mut values).is_empty());
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_choice_domain_canonicalizes() {
        let schema = FormSchema::standard();
        assert_eq!(
            schema.canonicalize(FieldName::NivelStudiu, " Licență ").unwrap(),
            "licenta"
        );
        assert_eq!(schema.canonicalize(FieldName::MediePeAdeverinta, "da").unwrap(), "Da");
        assert!(matches!(
            schema.canonicalize(FieldName::NivelStudiu, "doctorat"),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_sentinel_only_where_allowed() {
        let schema = FormSchema::standard();
        assert_eq!(schema.canonicalize(FieldName::JudetSauTara, "-").unwrap(), "-");
        assert_eq!(
            schema.canonicalize(FieldName::InstitutieDestinatie, "nu se aplica").unwrap(),
            "-"
        );
        assert!(schema.canonicalize(FieldName::NumePrenumeComplet, "-").is_err());
    }

    #[test]
    fn test_contact_patterns() {
        let schema = FormSchema::standard();
        assert!(schema.canonicalize(FieldName::Email, "Ion.Pop@UBB.ro").is_ok());
        assert!(schema.canonicalize(FieldName::Email, "not-an-email").is_err());
        assert!(schema.canonicalize(FieldName::Telefon, "+40 722 123 456").is_ok());
        assert!(schema.canonicalize(FieldName::Telefon, "0722-123-456").is_ok());
        assert!(schema.canonicalize(FieldName::Telefon, "12").is_err());
    }

    #[test]
    fn test_check_complete_reports_missing() {
        let schema = FormSchema::standard();
        let mut values = all_unconditional();
        values.remove(&FieldName::Email);
        assert_eq!(
            schema.check_complete(&values),
            Err(SchemaError::Incomplete(vec![FieldName::Email]))
        );
    }
}
