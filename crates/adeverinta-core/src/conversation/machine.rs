//! The deterministic transition function.
//!
//! Rules, first match wins:
//! 1. The stated reason matches the forbidden list: `forbidden`, values cleared.
//! 2. The reason matches the allowed list or is not known yet: merge the
//!    updates, then `ready` when nothing required is missing, `need_info`
//!    otherwise.
//! 3. The reason is stated but listed nowhere: `need_info` asking for the
//!    reason again.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ConversationError, FieldUpdates, FormState, Status};
use crate::decision::{compute_instructions, Instructions};
use crate::form::{FieldName, FieldValues, FormSchema};
use crate::policy::{ReasonClass, ReasonPolicy};

/// Maximum number of fields requested in one question.
pub const MAX_PROMPT_FIELDS: usize = 3;

/// Result of one transition. The caller commits `state` to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub state: FormState,

    /// Classification of the reason governing this turn.
    pub classification: ReasonClass,

    /// Required fields still absent; non-empty iff `need_info`.
    pub missing_fields: Vec<FieldName>,

    /// The 1 to 3 fields `next_question` asks for.
    pub prompt_fields: Vec<FieldName>,

    /// Snippet ids of the reason rule applied.
    pub policy_used: Vec<String>,

    pub message: String,
    pub next_question: String,

    /// Present iff the state is `ready`.
    pub instructions: Option<Instructions>,
}

impl TurnOutcome {
    pub fn status(&self) -> Status {
        self.state.status()
    }
}

/// Owns every transition decision of a conversation.
///
/// Stateless between calls; one machine serves any number of conversations.
#[derive(Debug, Clone)]
pub struct ConversationMachine {
    schema: FormSchema,
    policy: Arc<ReasonPolicy>,
}

impl ConversationMachine {
    pub fn new(schema: FormSchema, policy: Arc<ReasonPolicy>) -> Self {
        Self { schema, policy }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn policy(&self) -> &ReasonPolicy {
        &self.policy
    }

    /// Compute the next state from `prior` and this turn's updates.
    ///
    /// Pure: `prior` is never modified. Fails without side effects when the
    /// conversation is closed or an update lies outside its field domain.
    pub fn advance(
        &self,
        prior: &FormState,
        updates: &FieldUpdates,
    ) -> Result<TurnOutcome, ConversationError> {
        if prior.is_closed() {
            return Err(ConversationError::Closed(prior.status()));
        }

        let mut accepted = self.canonicalize(updates)?;
        let stated = accepted.remove(&FieldName::Motiv);

        let on_file = self.policy.classify(prior.get(FieldName::Motiv));
        let classification = match &stated {
            Some(reason) => match self.policy.classify(Some(reason.as_str())) {
                ReasonClass::Ambiguous { reason } if matches!(on_file, ReasonClass::Allowed { .. }) => {
                    tracing::debug!(reason = %reason, "Unrecognized reason ignored, keeping reason on file");
                    on_file
                }
                class => class,
            },
            None => on_file,
        };

        match classification {
            ReasonClass::Forbidden { reason, snippets } => {
                tracing::info!(reason = %reason, "Request refused: forbidden reason");
                Ok(self.refuse(reason, snippets))
            }
            ReasonClass::Ambiguous { reason } => {
                let mut values = prior.values().clone();
                merge(&mut values, accepted);
                self.drop_stale(&mut values);
                Ok(self.clarify_reason(values, reason))
            }
            class @ (ReasonClass::Allowed { .. } | ReasonClass::Unknown) => {
                let mut values = prior.values().clone();
                if let ReasonClass::Allowed { reason, .. } = &class {
                    values.insert(FieldName::Motiv, reason.clone());
                }
                merge(&mut values, accepted);
                self.drop_stale(&mut values);
                let newly_accepted = stated.is_some() && matches!(class, ReasonClass::Allowed { .. });
                Ok(self.collect(values, class, newly_accepted))
            }
        }
    }

    /// Canonicalize every non-empty update; one invalid value fails the turn.
    fn canonicalize(&self, updates: &FieldUpdates) -> Result<FieldValues, ConversationError> {
        let mut accepted = FieldValues::new();
        for (field, raw) in updates.iter() {
            if raw.trim().is_empty() {
                continue;
            }
            accepted.insert(field, self.schema.canonicalize(field, raw)?);
        }
        Ok(accepted)
    }

    fn drop_stale(&self, values: &mut FieldValues) {
        let dropped = self.schema.prune_stale(values);
        if !dropped.is_empty() {
            tracing::debug!(fields = ?dropped, "Dropped conditional fields no longer required");
        }
    }

    fn refuse(&self, reason: String, snippets: Vec<String>) -> TurnOutcome {
        TurnOutcome {
            state: FormState::forbidden(),
            message: format!(
                "Nu putem elibera adeverinta pentru motivul '{}', conform regulamentului.",
                reason
            ),
            classification: ReasonClass::Forbidden {
                reason,
                snippets: snippets.clone(),
            },
            missing_fields: Vec::new(),
            prompt_fields: Vec::new(),
            policy_used: snippets,
            next_question: String::new(),
            instructions: None,
        }
    }

    fn clarify_reason(&self, values: FieldValues, reason: String) -> TurnOutcome {
        let prompt_fields = vec![FieldName::Motiv];
        TurnOutcome {
            state: FormState::collecting(values),
            message: format!(
                "Motivul '{}' nu se regaseste in lista motivelor acceptate.",
                reason
            ),
            next_question: question_for(&prompt_fields),
            classification: ReasonClass::Ambiguous { reason },
            missing_fields: prompt_fields.clone(),
            prompt_fields,
            policy_used: Vec::new(),
            instructions: None,
        }
    }

    fn collect(&self, values: FieldValues, class: ReasonClass, newly_accepted: bool) -> TurnOutcome {
        let missing = self.schema.missing_fields(&values);
        let policy_used = class.snippets().to_vec();

        if missing.is_empty() {
            let instructions = compute_instructions(&values);
            tracing::info!(eta_working_days = instructions.eta_working_days, "Request ready");
            return TurnOutcome {
                state: FormState::with_status(values, Status::Ready),
                classification: class,
                missing_fields: Vec::new(),
                prompt_fields: Vec::new(),
                policy_used,
                message: "Am toate datele necesare pentru adeverinta.".to_string(),
                next_question: String::new(),
                instructions: Some(instructions),
            };
        }

        let prompt_fields = prompt_fields(&missing);
        let message = match (&class, newly_accepted) {
            (ReasonClass::Allowed { reason, .. }, true) => {
                format!("Motivul '{}' este acceptat.", reason)
            }
            _ if values.is_empty() => "Te pot ajuta cu cererea de adeverinta.".to_string(),
            _ => "Am notat datele primite.".to_string(),
        };
        TurnOutcome {
            state: FormState::collecting(values),
            classification: class,
            next_question: question_for(&prompt_fields),
            missing_fields: missing,
            prompt_fields,
            policy_used,
            message,
            instructions: None,
        }
    }
}

/// Existing fields are overwritten only by new non-empty values.
fn merge(values: &mut FieldValues, updates: FieldValues) {
    for (field, value) in updates {
        values.insert(field, value);
    }
}

/// Pick the fields to ask next: the reason first when missing, then
/// declaration order.
pub fn prompt_fields(missing: &[FieldName]) -> Vec<FieldName> {
    let mut ordered: Vec<FieldName> = missing.to_vec();
    ordered.sort_by_key(|f| (*f != FieldName::Motiv, *f));
    ordered.truncate(MAX_PROMPT_FIELDS);
    ordered
}

/// A question asking for exactly `fields`, by their labels.
pub fn question_for(fields: &[FieldName]) -> String {
    let labels: Vec<&str> = fields.iter().map(FieldName::label).collect();
    let joined = match labels.as_slice() {
        [] => return String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} si {}", init.join(", "), last),
    };
    format!("Te rog sa imi spui {}.", joined)
}
