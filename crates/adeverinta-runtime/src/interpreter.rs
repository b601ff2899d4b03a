//! Turn interpreters: the NLU collaborator seam.
//!
//! An interpreter turns the latest user message into candidate field
//! updates. Two implementations:
//! - [`KeywordInterpreter`]: deterministic, in-process, never fails
//! - [`LlmInterpreter`]: model-backed; its output must pass the contract
//!   validator before any of it is used

use adeverinta_core::{
    CollaboratorResponse, ContractValidator, ContractViolation, ExtractionContext, Extractor,
    FieldName, FieldUpdates, FormSchema, FormState, KeywordExtractor, ReasonPolicy,
    RetrievalResult,
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

use crate::prompts::build_system_prompt;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

lazy_static! {
    /// A reply wrapped in a markdown code fence.
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").unwrap();
}

/// Errors from interpreting a turn.
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Collaborator call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Collaborator broke the response contract: {0}")]
    Contract(#[from] ContractViolation),
}

impl InterpretError {
    /// Whether the same turn may succeed if retried.
    pub fn is_retriable(&self) -> bool {
        match self {
            InterpretError::Provider(e) => e.is_retriable(),
            // Sampling may produce a valid answer next time
            InterpretError::Contract(_) => true,
        }
    }
}

/// Everything an interpreter may look at for one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// Earlier messages of the conversation, oldest first
    pub history: &'a [ChatMessage],

    /// The user message being interpreted
    pub turn: &'a str,

    pub state: &'a FormState,

    /// Fields the previous question asked for
    pub asked: &'a [FieldName],

    /// Policy snippets retrieved for this turn
    pub snippets: &'a [RetrievalResult],
}

/// What an interpreter extracted from a turn.
#[derive(Debug, Clone, Default)]
pub struct Interpretation {
    pub updates: FieldUpdates,

    /// The validated collaborator answer, when a model produced one
    pub response: Option<CollaboratorResponse>,

    pub usage: Option<TokenUsage>,
}

/// Maps a user turn to field updates.
#[async_trait]
pub trait TurnInterpreter: Send + Sync {
    async fn interpret(&self, context: &TurnContext<'_>) -> Result<Interpretation, InterpretError>;

    /// Name for logs.
    fn name(&self) -> &str;
}

/// Deterministic interpreter over the core keyword extractor.
pub struct KeywordInterpreter {
    extractor: KeywordExtractor,
}

impl KeywordInterpreter {
    pub fn new(schema: FormSchema, policy: Arc<ReasonPolicy>) -> Self {
        Self {
            extractor: KeywordExtractor::new(schema, policy),
        }
    }
}

#[async_trait]
impl TurnInterpreter for KeywordInterpreter {
    async fn interpret(&self, context: &TurnContext<'_>) -> Result<Interpretation, InterpretError> {
        let updates = self.extractor.extract(
            context.turn,
            &ExtractionContext {
                state: context.state,
                asked: context.asked,
            },
        );
        Ok(Interpretation {
            updates,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Model-backed interpreter.
pub struct LlmInterpreter {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    schema: FormSchema,
    policy: Arc<ReasonPolicy>,
    validator: ContractValidator,
}

impl LlmInterpreter {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
        schema: FormSchema,
        policy: Arc<ReasonPolicy>,
    ) -> Self {
        Self {
            provider,
            completion,
            validator: ContractValidator::new(schema.clone()),
            schema,
            policy,
        }
    }

    fn messages(&self, context: &TurnContext<'_>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(context.history.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(
            &self.schema,
            &self.policy,
            context.snippets,
        )));
        messages.extend(context.history.iter().cloned());
        messages.push(ChatMessage::user(context.turn));
        messages
    }
}

/// Strip a markdown code fence around the JSON body, if any.
fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str())
}

#[async_trait]
impl TurnInterpreter for LlmInterpreter {
    async fn interpret(&self, context: &TurnContext<'_>) -> Result<Interpretation, InterpretError> {
        let completion = self
            .provider
            .complete(self.messages(context), &self.completion)
            .await?;

        let retrieved: Vec<String> = context.snippets.iter().map(|s| s.id.clone()).collect();
        let validated = self
            .validator
            .validate(strip_code_fence(&completion.content), &retrieved)
            .inspect_err(|e| {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Collaborator response rejected"
                );
            })?;

        // A forbidden reply carries an empty payload, so the reason has to
        // reach the machine some other way: the `reason` key, or else a
        // listed reason spotted in the user's own words.
        let mut updates = validated.updates;
        if !updates.contains(FieldName::Motiv) {
            let stated = validated
                .response
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .or_else(|| self.policy.find_in(context.turn));
            if let Some(reason) = stated {
                updates.insert(FieldName::Motiv, reason);
            }
        }

        tracing::debug!(
            provider = self.provider.name(),
            claimed = %validated.response.status,
            fields = updates.len(),
            tokens = completion.usage.total(),
            "Collaborator response accepted"
        );

        Ok(Interpretation {
            updates,
            response: Some(validated.response),
            usage: Some(completion.usage),
        })
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CompletionResponse;
    use adeverinta_core::{ConversationMachine, Status};
    use serde_json::json;
    use std::sync::Mutex;

    const POLICY: &str = r#"
forbidden:
  - snippet: motive-interzise
    reasons: ["evaziune fiscala"]
allowed:
  - snippet: motive-permise
    reasons: ["Work and Travel", "angajare"]
"#;

    /// Replies with a fixed body and records the prompts it was sent.
    struct ScriptedProvider {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen.lock().unwrap().push(messages);
            Ok(CompletionResponse {
                content: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 120,
                    completion_tokens: 40,
                },
                model: "scripted".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn policy() -> Arc<ReasonPolicy> {
        Arc::new(ReasonPolicy::from_yaml(POLICY).unwrap())
    }

    fn snippets() -> Vec<RetrievalResult> {
        vec![RetrievalResult {
            id: "motive-permise".into(),
            score: 0.9,
            text: "Motive permise: angajare, Work and Travel.".into(),
        }]
    }

    fn llm(reply: serde_json::Value) -> (Arc<ScriptedProvider>, LlmInterpreter) {
        let provider = Arc::new(ScriptedProvider::new(reply.to_string()));
        let interpreter = LlmInterpreter::new(
            provider.clone(),
            CompletionConfig::default(),
            FormSchema::standard(),
            policy(),
        );
        (provider, interpreter)
    }

    fn need_info_reply() -> serde_json::Value {
        json!({
            "status": "need_info",
            "message": "Motivul este acceptat.",
            "payload": { "motiv": "angajare" },
            "missing_fields": ["nume_prenume_complet"],
            "next_question": "Care este numele complet?",
            "instructions": "",
            "policy_used": ["motive-permise"]
        })
    }

    #[tokio::test]
    async fn test_keyword_interpreter_extracts() {
        let interpreter = KeywordInterpreter::new(FormSchema::standard(), policy());
        let state = FormState::new();
        let result = interpreter
            .interpret(&TurnContext {
                history: &[],
                turn: "am nevoie de adeverinta pentru angajare",
                state: &state,
                asked: &[],
                snippets: &[],
            })
            .await
            .unwrap();
        assert_eq!(result.updates.get(FieldName::Motiv), Some("angajare"));
        assert!(result.response.is_none());
    }

    #[tokio::test]
    async fn test_llm_interpreter_accepts_valid_reply() {
        let (provider, interpreter) = llm(need_info_reply());
        let state = FormState::new();
        let history = vec![ChatMessage::assistant("Cu ce te pot ajuta?")];
        let snippets = snippets();

        let result = interpreter
            .interpret(&TurnContext {
                history: &history,
                turn: "pentru angajare",
                state: &state,
                asked: &[],
                snippets: &snippets,
            })
            .await
            .unwrap();

        assert_eq!(result.updates.get(FieldName::Motiv), Some("angajare"));
        assert_eq!(result.usage.unwrap().total(), 160);

        let seen = provider.seen.lock().unwrap();
        let messages = &seen[0];
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("ID: motive-permise"));
        assert_eq!(messages[2], ChatMessage::user("pentru angajare"));
    }

    #[tokio::test]
    async fn test_reason_field_feeds_motiv_on_forbidden() {
        let (_, interpreter) = llm(json!({
            "status": "forbidden",
            "message": "Nu putem elibera adeverinta.",
            "payload": {},
            "missing_fields": [],
            "next_question": "",
            "instructions": "",
            "policy_used": [],
            "reason": "evaziune fiscala"
        }));
        let state = FormState::new();
        let result = interpreter
            .interpret(&TurnContext {
                history: &[],
                turn: "pentru evaziune fiscala",
                state: &state,
                asked: &[],
                snippets: &[],
            })
            .await
            .unwrap();
        assert_eq!(result.updates.get(FieldName::Motiv), Some("evaziune fiscala"));
    }

    #[tokio::test]
    async fn test_forbidden_reply_without_reason_uses_turn_text() {
        let (_, interpreter) = llm(json!({
            "status": "forbidden",
            "message": "Nu putem elibera adeverinta.",
            "payload": {},
            "missing_fields": [],
            "next_question": "",
            "instructions": "",
            "policy_used": []
        }));
        let state = FormState::new();
        let turn = "Vreau adeverinta pentru evaziune fiscala";
        let result = interpreter
            .interpret(&TurnContext {
                history: &[],
                turn,
                state: &state,
                asked: &[],
                snippets: &[],
            })
            .await
            .unwrap();
        assert_eq!(result.updates.get(FieldName::Motiv), Some("evaziune fiscala"));

        let machine = ConversationMachine::new(FormSchema::standard(), policy());
        let outcome = machine.advance(&state, &result.updates).unwrap();
        assert_eq!(outcome.status(), Status::Forbidden);
        assert_eq!(outcome.policy_used, vec!["motive-interzise".to_string()]);
    }

    #[tokio::test]
    async fn test_question_with_inflected_field_word_is_accepted() {
        let mut reply = need_info_reply();
        reply["missing_fields"] = json!(["nume_prenume_complet", "email"]);
        reply["next_question"] =
            json!("Am notat motivele tale. Care este numele complet si adresa de email?");
        let (_, interpreter) = llm(reply);
        let state = FormState::new();
        let snippets = snippets();

        let result = interpreter
            .interpret(&TurnContext {
                history: &[],
                turn: "pentru angajare",
                state: &state,
                asked: &[],
                snippets: &snippets,
            })
            .await
            .unwrap();
        assert_eq!(result.updates.get(FieldName::Motiv), Some("angajare"));
    }

    #[tokio::test]
    async fn test_unretrieved_policy_is_contract_violation() {
        let mut reply = need_info_reply();
        reply["policy_used"] = json!(["inventat"]);
        let (_, interpreter) = llm(reply);
        let state = FormState::new();
        let snippets = snippets();

        let err = interpreter
            .interpret(&TurnContext {
                history: &[],
                turn: "angajare",
                state: &state,
                asked: &[],
                snippets: &snippets,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InterpretError::Contract(ContractViolation::PolicyNotRetrieved { .. })
        ));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }
}
