//! Turn orchestrator: one user message in, one committed transition out.
//!
//! For each turn the orchestrator:
//! 1. Rejects turns on a closed (ready or forbidden) session
//! 2. Retrieves the top-k policy snippets for the message
//! 3. Asks the interpreter for field updates (timeout + circuit breaker)
//! 4. Advances the deterministic machine
//! 5. Commits history and state to the session
//!
//! Any failure before step 5 leaves the session exactly as it was.

use adeverinta_core::{
    ConversationError, ConversationMachine, ContractViolation, DocumentStore, FormSchema,
    ReasonPolicy, Retrieval, RetrievalEngine, RetrievalError, SchemaError, Status, TurnOutcome,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::EmbeddingCache;
use crate::config::{AppConfig, EmbeddingKind, InterpreterKind};
use crate::interpreter::{InterpretError, KeywordInterpreter, TurnContext, TurnInterpreter};
use crate::resilience::{CircuitBreaker, Collaborator};
use crate::retrieval::RetrievalService;
use crate::session::Session;
use crate::RuntimeError;

/// Why a turn failed. The session is unchanged in every case.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Conversation is closed ({0}); reset to start a new request")]
    ConversationClosed(Status),

    #[error("{collaborator} collaborator unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        retriable: bool,
        message: String,
    },

    #[error("Collaborator response rejected: {0}")]
    ContractViolation(#[from] ContractViolation),

    #[error("Invalid field value: {0}")]
    InvalidValue(#[from] SchemaError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

impl TurnError {
    /// Whether resubmitting the same message may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            TurnError::CollaboratorUnavailable { retriable, .. } => *retriable,
            TurnError::ContractViolation(_) => true,
            _ => false,
        }
    }
}

impl From<ConversationError> for TurnError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::Closed(status) => TurnError::ConversationClosed(status),
            ConversationError::Schema(e) => TurnError::InvalidValue(e),
        }
    }
}

/// Result of a committed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub outcome: TurnOutcome,

    /// Snippets retrieved for the turn and the backend that ranked them
    pub retrieval: Retrieval,

    /// Earliest pickup date when the request is ready, counted from today
    pub earliest_pickup: Option<NaiveDate>,

    /// Status the model collaborator claimed, when one was consulted
    pub collaborator_status: Option<Status>,
}

impl TurnReply {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    /// The assistant's answer as shown to the user.
    pub fn text(&self) -> String {
        let mut parts = vec![self.outcome.message.as_str()];
        if !self.outcome.next_question.is_empty() {
            parts.push(&self.outcome.next_question);
        }
        if let Some(instructions) = &self.outcome.instructions {
            parts.push(&instructions.text);
        }
        parts.join(" ")
    }
}

/// Applies user turns to sessions.
///
/// `Send + Sync`: share one orchestrator behind an `Arc` across every
/// concurrently handled conversation.
pub struct TurnOrchestrator {
    machine: ConversationMachine,
    retrieval: RetrievalService,
    interpreter: Arc<dyn TurnInterpreter>,
    interpreter_timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl TurnOrchestrator {
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::new()
    }

    /// Build everything from configuration. Corpus and policy problems are
    /// fatal here, before any turn is served.
    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let mut store = DocumentStore::load_dir(&config.corpus_dir)?;
        if let Some(index_path) = &config.index_path {
            store = store.with_embeddings(DocumentStore::read_index_file(index_path)?);
        }
        let engine = Arc::new(RetrievalEngine::new(Arc::new(store))?);
        let policy = Arc::new(ReasonPolicy::from_yaml_file(&config.reasons_path)?);
        let schema = FormSchema::standard();

        let circuit_breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let mut retrieval = RetrievalService::new(engine, config.retrieval.clone())
            .with_cache(EmbeddingCache::new(config.cache.max_entries, config.cache.ttl))
            .with_circuit_breaker(circuit_breaker.clone());
        if let Some(embedder) = providers::embedder(config)? {
            retrieval = retrieval.with_embedder(embedder);
        }

        let interpreter = providers::interpreter(config, &schema, &policy)?;
        tracing::info!(
            interpreter = interpreter.name(),
            dense = retrieval.engine().has_dense(),
            "Turn orchestrator ready"
        );

        TurnOrchestrator::builder()
            .machine(ConversationMachine::new(schema, policy))
            .retrieval(retrieval)
            .interpreter(interpreter)
            .interpreter_timeout(config.interpreter.timeout)
            .circuit_breaker(circuit_breaker)
            .build()
    }

    pub fn machine(&self) -> &ConversationMachine {
        &self.machine
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    /// Process one user message. On success the session holds the new
    /// state; on error it is untouched.
    pub async fn handle_turn(&self, session: &mut Session, text: &str) -> Result<TurnReply, TurnError> {
        if session.is_closed() {
            return Err(TurnError::ConversationClosed(session.state().status()));
        }

        let retrieval = self
            .retrieval
            .retrieve(text, self.retrieval.default_k())
            .await?;

        let interpretation = self.interpret(session, text, &retrieval).await?;
        let mut outcome = self.machine.advance(session.state(), &interpretation.updates)?;

        // A reply may only cite snippets shown for this turn.
        let retrieved = retrieval.ids();
        let cited = outcome.policy_used.len();
        outcome.policy_used.retain(|id| retrieved.contains(id));
        if outcome.policy_used.len() < cited {
            tracing::debug!(
                session = %session.id(),
                dropped = cited - outcome.policy_used.len(),
                "Reason snippets not retrieved this turn left uncited"
            );
        }

        let collaborator_status = interpretation.response.as_ref().map(|r| r.status);
        if let Some(claimed) = collaborator_status {
            if claimed != outcome.status() {
                tracing::warn!(
                    session = %session.id(),
                    claimed = %claimed,
                    decided = %outcome.status(),
                    "Collaborator status overridden by state machine"
                );
            }
        }

        let earliest_pickup = outcome
            .instructions
            .as_ref()
            .map(|i| i.earliest_pickup(Utc::now().date_naive()));

        let reply = TurnReply {
            outcome,
            retrieval,
            earliest_pickup,
            collaborator_status,
        };

        session.commit(text, reply.text(), &reply.outcome);
        tracing::info!(
            session = %session.id(),
            status = %reply.status(),
            missing = reply.outcome.missing_fields.len(),
            backend = ?reply.retrieval.backend,
            "Turn committed"
        );
        Ok(reply)
    }

    async fn interpret(
        &self,
        session: &Session,
        text: &str,
        retrieval: &Retrieval,
    ) -> Result<crate::interpreter::Interpretation, TurnError> {
        if self.circuit_breaker.is_open(Collaborator::Interpreter) {
            return Err(TurnError::CollaboratorUnavailable {
                collaborator: Collaborator::Interpreter,
                retriable: true,
                message: "circuit open after repeated failures".to_string(),
            });
        }

        let context = TurnContext {
            history: session.history(),
            turn: text,
            state: session.state(),
            asked: session.asked(),
            snippets: &retrieval.results,
        };

        let result =
            tokio::time::timeout(self.interpreter_timeout, self.interpreter.interpret(&context))
                .await;

        match result {
            Ok(Ok(interpretation)) => {
                self.circuit_breaker.record_success(Collaborator::Interpreter);
                Ok(interpretation)
            }
            Ok(Err(InterpretError::Contract(violation))) => {
                // The collaborator answered; its answer was bad
                self.circuit_breaker.record_success(Collaborator::Interpreter);
                Err(TurnError::ContractViolation(violation))
            }
            Ok(Err(InterpretError::Provider(e))) => {
                self.circuit_breaker.record_failure(Collaborator::Interpreter);
                tracing::warn!(
                    interpreter = self.interpreter.name(),
                    error = %e,
                    "Interpreter call failed"
                );
                Err(TurnError::CollaboratorUnavailable {
                    collaborator: Collaborator::Interpreter,
                    retriable: e.is_retriable(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                self.circuit_breaker.record_failure(Collaborator::Interpreter);
                tracing::warn!(
                    interpreter = self.interpreter.name(),
                    timeout = ?self.interpreter_timeout,
                    "Interpreter timed out"
                );
                Err(TurnError::CollaboratorUnavailable {
                    collaborator: Collaborator::Interpreter,
                    retriable: true,
                    message: format!("no answer within {:?}", self.interpreter_timeout),
                })
            }
        }
    }
}

/// Builder for TurnOrchestrator.
pub struct TurnOrchestratorBuilder {
    machine: Option<ConversationMachine>,
    retrieval: Option<RetrievalService>,
    interpreter: Option<Arc<dyn TurnInterpreter>>,
    interpreter_timeout: Duration,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl TurnOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            machine: None,
            retrieval: None,
            interpreter: None,
            interpreter_timeout: Duration::from_secs(20),
            circuit_breaker: None,
        }
    }

    pub fn machine(mut self, machine: ConversationMachine) -> Self {
        self.machine = Some(machine);
        self
    }

    pub fn retrieval(mut self, retrieval: RetrievalService) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Defaults to the keyword interpreter over the machine's schema and policy.
    pub fn interpreter(mut self, interpreter: Arc<dyn TurnInterpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    pub fn interpreter_timeout(mut self, timeout: Duration) -> Self {
        self.interpreter_timeout = timeout;
        self
    }

    pub fn circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn build(self) -> Result<TurnOrchestrator, RuntimeError> {
        let machine = self
            .machine
            .ok_or_else(|| RuntimeError::NotConfigured("No conversation machine set".to_string()))?;
        let retrieval = self
            .retrieval
            .ok_or_else(|| RuntimeError::NotConfigured("No retrieval service set".to_string()))?;
        let interpreter = self.interpreter.unwrap_or_else(|| {
            Arc::new(KeywordInterpreter::new(
                machine.schema().clone(),
                Arc::new(machine.policy().clone()),
            ))
        });

        Ok(TurnOrchestrator {
            machine,
            retrieval,
            interpreter,
            interpreter_timeout: self.interpreter_timeout,
            circuit_breaker: self.circuit_breaker.unwrap_or_default(),
        })
    }
}

impl Default for TurnOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators selected by configuration.
mod providers {
    use super::*;
    use crate::providers::EmbeddingProvider;

    pub(super) fn embedder(
        config: &AppConfig,
    ) -> Result<Option<Arc<dyn EmbeddingProvider>>, RuntimeError> {
        match config.embedding.kind {
            EmbeddingKind::None => Ok(None),
            #[cfg(feature = "openai")]
            EmbeddingKind::OpenAi => {
                let provider = crate::providers::OpenAiProvider::from_config(
                    config.embedding.api_key.as_deref(),
                )?
                .with_embedding_model(&config.embedding.model)
                .with_embedding_timeout(config.retrieval.embedding_timeout);
                Ok(Some(Arc::new(provider)))
            }
            #[cfg(not(feature = "openai"))]
            EmbeddingKind::OpenAi => Err(RuntimeError::FeatureDisabled("openai")),
        }
    }

    pub(super) fn interpreter(
        config: &AppConfig,
        schema: &FormSchema,
        policy: &Arc<ReasonPolicy>,
    ) -> Result<Arc<dyn TurnInterpreter>, RuntimeError> {
        match config.interpreter.kind {
            InterpreterKind::Keyword => Ok(Arc::new(KeywordInterpreter::new(
                schema.clone(),
                policy.clone(),
            ))),
            #[cfg(feature = "openai")]
            InterpreterKind::OpenAi => {
                let provider = crate::providers::OpenAiProvider::from_config(
                    config.interpreter.api_key.as_deref(),
                )?;
                Ok(llm(Arc::new(provider), config, schema, policy))
            }
            #[cfg(feature = "anthropic")]
            InterpreterKind::Anthropic => {
                let provider = crate::providers::AnthropicProvider::from_config(
                    config.interpreter.api_key.as_deref(),
                )?;
                Ok(llm(Arc::new(provider), config, schema, policy))
            }
            #[cfg(not(feature = "openai"))]
            InterpreterKind::OpenAi => Err(RuntimeError::FeatureDisabled("openai")),
            #[cfg(not(feature = "anthropic"))]
            InterpreterKind::Anthropic => Err(RuntimeError::FeatureDisabled("anthropic")),
        }
    }

    #[cfg(any(feature = "openai", feature = "anthropic"))]
    fn llm(
        provider: Arc<dyn crate::providers::LlmProvider>,
        config: &AppConfig,
        schema: &FormSchema,
        policy: &Arc<ReasonPolicy>,
    ) -> Arc<dyn TurnInterpreter> {
        let completion = crate::providers::CompletionConfig {
            model: config.interpreter.model.clone(),
            timeout: config.interpreter.timeout,
            ..Default::default()
        };
        Arc::new(crate::interpreter::LlmInterpreter::new(
            provider,
            completion,
            schema.clone(),
            policy.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::interpreter::Interpretation;
    use crate::providers::ProviderError;
    use adeverinta_core::{FieldName, PolicyDocument};
    use async_trait::async_trait;
    use tempfile::TempDir;

    const POLICY: &str = r#"
forbidden:
  - snippet: motive-interzise
    reasons: ["evaziune fiscala"]
allowed:
  - snippet: motive-permise
    reasons: ["Work and Travel", "angajare", "echivalare disciplina"]
"#;

    fn policy() -> Arc<ReasonPolicy> {
        Arc::new(ReasonPolicy::from_yaml(POLICY).unwrap())
    }

    fn retrieval() -> RetrievalService {
        let store = DocumentStore::from_documents(vec![
            PolicyDocument::new("motive-permise", "Motive permise: angajare, Work and Travel."),
            PolicyDocument::new("motive-interzise", "Motive interzise: evaziune fiscala."),
            PolicyDocument::new("termen-eliberare", "Termen: 3 zile lucratoare, 5 pentru absolventi."),
        ])
        .unwrap();
        let engine = Arc::new(RetrievalEngine::new(Arc::new(store)).unwrap());
        RetrievalService::new(engine, RetrievalConfig::default())
    }

    fn orchestrator() -> TurnOrchestrator {
        TurnOrchestrator::builder()
            .machine(ConversationMachine::new(FormSchema::standard(), policy()))
            .retrieval(retrieval())
            .build()
            .unwrap()
    }

    struct FailingInterpreter;

    #[async_trait]
    impl TurnInterpreter for FailingInterpreter {
        async fn interpret(&self, _: &TurnContext<'_>) -> Result<Interpretation, InterpretError> {
            Err(InterpretError::Provider(ProviderError::HttpError("503".into())))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowInterpreter;

    #[async_trait]
    impl TurnInterpreter for SlowInterpreter {
        async fn interpret(&self, _: &TurnContext<'_>) -> Result<Interpretation, InterpretError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Interpretation::default())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn with_interpreter(interpreter: Arc<dyn TurnInterpreter>) -> TurnOrchestrator {
        TurnOrchestrator::builder()
            .machine(ConversationMachine::new(FormSchema::standard(), policy()))
            .retrieval(retrieval())
            .interpreter(interpreter)
            .interpreter_timeout(Duration::from_millis(20))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_conversation_reaches_ready() {
        let orchestrator = orchestrator();
        let mut session = Session::new("full");

        let turns = [
            "Buna, am nevoie de adeverinta pentru angajare",
            "Popescu Ion, 4521, absolvent",
            "licenta, buget, an de studiu: 3",
            "Engleza-Franceza, e pentru mine, institutie: -",
            "judet: Cluj, nu vreau medie, ion.pop@example.com, 0712345678",
        ];
        let mut last = None;
        for turn in turns {
            last = Some(orchestrator.handle_turn(&mut session, turn).await.unwrap());
        }

        let reply = last.unwrap();
        assert_eq!(reply.status(), Status::Ready);
        assert!(reply.earliest_pickup.is_some());
        assert!(reply.text().contains("5 zile lucratoare"));
        assert_eq!(session.turns(), 5);
        assert_eq!(session.history().len(), 10);

        let err = orchestrator.handle_turn(&mut session, "inca ceva").await.unwrap_err();
        assert!(matches!(err, TurnError::ConversationClosed(Status::Ready)));
    }

    #[tokio::test]
    async fn test_policy_used_limited_to_retrieved_snippets() {
        let mut config = RetrievalConfig::default();
        config.k = 1;
        let orchestrator = TurnOrchestrator::builder()
            .machine(ConversationMachine::new(FormSchema::standard(), policy()))
            .retrieval(RetrievalService::new(Arc::new(retrieval().engine().clone()), config))
            .build()
            .unwrap();
        let mut session = Session::new("cited");

        let reply = orchestrator.handle_turn(&mut session, "pentru angajare").await.unwrap();
        assert_eq!(reply.retrieval.ids(), vec!["motive-permise".to_string()]);
        assert_eq!(reply.outcome.policy_used, vec!["motive-permise".to_string()]);

        let reply = orchestrator
            .handle_turn(&mut session, "Termen: 0712345678")
            .await
            .unwrap();
        assert_eq!(reply.retrieval.ids(), vec!["termen-eliberare".to_string()]);
        assert!(reply.outcome.policy_used.is_empty());
        assert_eq!(session.state().get(FieldName::Telefon), Some("0712345678"));
        assert_eq!(session.state().get(FieldName::Motiv), Some("angajare"));
    }

    #[tokio::test]
    async fn test_forbidden_reason_closes_session() {
        let orchestrator = orchestrator();
        let mut session = Session::new("forbidden");

        let reply = orchestrator
            .handle_turn(&mut session, "Vreau adeverinta pentru evaziune fiscala")
            .await
            .unwrap();
        assert_eq!(reply.status(), Status::Forbidden);
        assert_eq!(reply.outcome.policy_used, vec!["motive-interzise".to_string()]);
        assert_eq!(reply.retrieval.results[0].id, "motive-interzise");
        assert!(session.state().values().is_empty());
        assert!(session.is_closed());

        session.reset();
        let reply = orchestrator
            .handle_turn(&mut session, "pentru Work and Travel")
            .await
            .unwrap();
        assert_eq!(reply.status(), Status::NeedInfo);
    }

    #[tokio::test]
    async fn test_invalid_value_leaves_session_unchanged() {
        let orchestrator = orchestrator();
        let mut session = Session::new("invalid");
        orchestrator
            .handle_turn(&mut session, "pentru angajare")
            .await
            .unwrap();
        let before = session.state().clone();

        let err = orchestrator
            .handle_turn(&mut session, "email: nu am")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidValue(_)));
        assert_eq!(session.state(), &before);
        assert_eq!(session.turns(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_retriable_and_atomic() {
        let orchestrator = with_interpreter(Arc::new(FailingInterpreter));
        let mut session = Session::new("down");

        let err = orchestrator
            .handle_turn(&mut session, "pentru angajare")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::CollaboratorUnavailable {
                collaborator: Collaborator::Interpreter,
                retriable: true,
                ..
            }
        ));
        assert!(err.is_retriable());
        assert!(session.history().is_empty());
        assert_eq!(session.state().get(FieldName::Motiv), None);
    }

    #[tokio::test]
    async fn test_interpreter_timeout_fails_turn() {
        let orchestrator = with_interpreter(Arc::new(SlowInterpreter));
        let mut session = Session::new("slow");

        let err = orchestrator
            .handle_turn(&mut session, "pentru angajare")
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(session.turns(), 0);
    }

    #[tokio::test]
    async fn test_repeated_failures_open_interpreter_circuit() {
        let orchestrator = with_interpreter(Arc::new(FailingInterpreter));
        let mut session = Session::new("breaker");

        for _ in 0..3 {
            let _ = orchestrator.handle_turn(&mut session, "angajare").await;
        }
        let err = orchestrator
            .handle_turn(&mut session, "angajare")
            .await
            .unwrap_err();
        match err {
            TurnError::CollaboratorUnavailable { message, .. } => {
                assert!(message.contains("circuit open"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_sessions_are_independent() {
        let orchestrator = Arc::new(orchestrator());

        let handles = (0..8).map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let mut session = Session::new(format!("s-{i}"));
                let text = if i % 2 == 0 {
                    "pentru evaziune fiscala"
                } else {
                    "pentru Work and Travel"
                };
                let reply = orchestrator.handle_turn(&mut session, text).await.unwrap();
                (i, reply.status())
            })
        });

        for result in futures::future::join_all(handles).await {
            let (i, status) = result.unwrap();
            let expected = if i % 2 == 0 {
                Status::Forbidden
            } else {
                Status::NeedInfo
            };
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_from_config_requires_corpus() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            corpus_dir: dir.path().join("kb"),
            ..Default::default()
        };
        let err = TurnOrchestrator::from_config(&config).err().unwrap();
        assert!(matches!(err, RuntimeError::Corpus(_)));
    }

    #[tokio::test]
    async fn test_from_config_builds_keyword_orchestrator() {
        let dir = TempDir::new().unwrap();
        let kb = dir.path().join("kb");
        std::fs::create_dir(&kb).unwrap();
        std::fs::write(kb.join("motive-permise.md"), "Motive permise: angajare.").unwrap();
        std::fs::write(kb.join("motive-interzise.md"), "Motive interzise: evaziune fiscala.").unwrap();
        let reasons = dir.path().join("reasons.yaml");
        std::fs::write(&reasons, POLICY).unwrap();

        let config = AppConfig {
            corpus_dir: kb,
            reasons_path: reasons,
            ..Default::default()
        };
        let orchestrator = TurnOrchestrator::from_config(&config).unwrap();
        let mut session = Session::new("cfg");
        let reply = orchestrator
            .handle_turn(&mut session, "pentru angajare")
            .await
            .unwrap();
        assert_eq!(reply.status(), Status::NeedInfo);
        assert_eq!(reply.retrieval.results.len(), 2);
    }
}
