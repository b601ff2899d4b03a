//! Rule-based field extraction from free text.
//!
//! The [`Extractor`] trait is the seam for turning a user turn into
//! [`FieldUpdates`]. [`KeywordExtractor`] is the deterministic implementation;
//! a model-backed collaborator can replace it without touching the machine.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::conversation::{FieldUpdates, FormState};
use crate::form::{Domain, FieldName, FormSchema, NOT_APPLICABLE};
use crate::policy::ReasonPolicy;
use crate::text;

lazy_static! {
    static ref SEGMENT_SPLIT: Regex = Regex::new(r"[,;\n]+").unwrap();
    static ref EMAIL_IN_TEXT: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();
    static ref PHONE_IN_TEXT: Regex = Regex::new(r"\+?\d(?:[\s.-]?\d){8,14}").unwrap();
}

/// What the extractor knows about the conversation so far.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub state: &'a FormState,

    /// Fields the previous question asked for.
    pub asked: &'a [FieldName],
}

/// Maps one user turn to candidate field values.
pub trait Extractor: Send + Sync {
    fn extract(&self, turn: &str, context: &ExtractionContext<'_>) -> FieldUpdates;
}

/// Keyword and pattern based extractor.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    schema: FormSchema,
    policy: Arc<ReasonPolicy>,
}

impl KeywordExtractor {
    pub fn new(schema: FormSchema, policy: Arc<ReasonPolicy>) -> Self {
        Self { schema, policy }
    }

    /// `field: value`, where the left side is an identifier or mention keyword.
    fn labelled_pair(&self, segment: &str) -> Option<(FieldName, String)> {
        let (left, right) = segment.split_once(':')?;
        let value = clean_value(right);
        if value.is_empty() {
            return None;
        }
        let key = text::normalize(left).replace(' ', "_");
        if let Ok(field) = key.parse::<FieldName>() {
            return Some((field, value));
        }
        match FieldName::mentioned_in(left).as_slice() {
            [field] => Some((*field, value)),
            _ => None,
        }
    }

    /// Closed-choice values named anywhere in the segment.
    fn choices(&self, segment: &str, asked: &[FieldName], updates: &mut FieldUpdates) -> bool {
        let mut hit = false;
        for spec in self.schema.fields() {
            let Domain::Choice(options) = spec.domain else {
                continue;
            };
            // Bare "da" / "nu" only count as answers to a direct question.
            if spec.name == FieldName::MediePeAdeverinta {
                if asked.contains(&spec.name) {
                    if let Some(opt) = options.iter().find(|o| text::normalize(segment) == text::normalize(o)) {
                        updates.insert(spec.name, *opt);
                        hit = true;
                    }
                }
                continue;
            }
            if let Some(opt) = options.iter().find(|o| text::contains_phrase(segment, o)) {
                updates.insert(spec.name, *opt);
                hit = true;
            }
        }
        if !updates.contains(FieldName::RegimStudiu) && text::contains_phrase(segment, "prelungire") {
            updates.insert(FieldName::RegimStudiu, "prelungire studii");
            hit = true;
        }
        hit
    }

    /// Fixed phrases for beneficiary and average.
    fn phrases(&self, segment: &str, updates: &mut FieldUpdates) -> bool {
        let mut hit = false;
        if text::contains_phrase(segment, "pentru mine") {
            updates.insert(FieldName::PersoanaBeneficiar, NOT_APPLICABLE);
            hit = true;
        }
        if ["nu vreau medie", "nu vreau media", "fara medie"]
            .iter()
            .any(|p| text::contains_phrase(segment, p))
        {
            updates.insert(FieldName::MediePeAdeverinta, "Nu");
            hit = true;
        } else if ["vreau medie", "vreau media", "cu medie", "cu media"]
            .iter()
            .any(|p| text::contains_phrase(segment, p))
        {
            updates.insert(FieldName::MediePeAdeverinta, "Da");
            hit = true;
        }
        hit
    }

    fn contacts(&self, segment: &str, updates: &mut FieldUpdates) -> bool {
        let mut hit = false;
        let mut rest = segment.to_string();
        if let Some(m) = EMAIL_IN_TEXT.find(segment) {
            updates.insert(FieldName::Email, m.as_str());
            rest = rest.replace(m.as_str(), " ");
            hit = true;
        }
        if let Some(m) = PHONE_IN_TEXT.find(&rest) {
            updates.insert(FieldName::Telefon, m.as_str().trim());
            hit = true;
        }
        hit
    }

    fn is_free_text(&self, field: FieldName) -> bool {
        self.schema
            .spec(field)
            .is_some_and(|s| matches!(s.domain, Domain::Text | Domain::TextOrNotApplicable))
    }

}

impl Extractor for KeywordExtractor {
    fn extract(&self, turn: &str, context: &ExtractionContext<'_>) -> FieldUpdates {
        let mut updates = FieldUpdates::new();
        let mut unrecognized = Vec::new();

        for segment in SEGMENT_SPLIT.split(turn).map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((field, value)) = self.labelled_pair(segment) {
                updates.insert(field, value);
                continue;
            }

            let reason = self.policy.find_in(segment);
            let mut hit = false;
            if let Some(reason) = reason {
                updates.insert(FieldName::Motiv, reason);
                hit = true;
            }
            hit |= self.contacts(segment, &mut updates);
            hit |= self.phrases(segment, &mut updates);
            // Words inside a reason ("bursa de master") are not form answers.
            if reason.is_none() {
                hit |= self.choices(segment, context.asked, &mut updates);
            }

            if !hit {
                unrecognized.push(clean_value(segment));
            }
        }

        let reason_on_file = context.state.get(FieldName::Motiv).is_some();
        if updates.is_empty() && !reason_on_file {
            let whole = clean_value(turn);
            if !whole.is_empty() {
                updates.insert(FieldName::Motiv, whole);
            }
            return updates;
        }

        let free_slots: Vec<FieldName> = context
            .asked
            .iter()
            .copied()
            .filter(|f| self.is_free_text(*f) && !updates.contains(*f))
            .collect();
        let values = unrecognized.into_iter().filter(|v| !v.is_empty());
        for (field, value) in free_slots.into_iter().zip(values) {
            updates.insert(field, value);
        }

        tracing::debug!(fields = updates.len(), "Keyword extraction finished");
        updates
    }
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string()
}
