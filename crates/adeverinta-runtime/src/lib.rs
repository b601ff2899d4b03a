//! # adeverinta-runtime
//!
//! Async runtime around the deterministic `adeverinta-core` engine.
//!
//! This crate owns everything that talks to the outside world:
//! - Embedding and language-model providers (behind cargo features)
//! - Retrieval with embedding cache, retry-once and lexical fallback
//! - Turn interpreters (keyword or model-backed) and the contract check
//! - The turn orchestrator that commits a turn to a session atomically
//!
//! ## Important
//!
//! The state machine in `adeverinta-core` decides every transition. A model
//! collaborator only proposes field values; its claimed status is logged
//! and overridden when it disagrees.
//!
//! ## Example
//!
//! ```rust,ignore
//! use adeverinta_runtime::{AppConfig, Session, TurnOrchestrator};
//!
//! let config = AppConfig::load("config/adeverinta.yaml")?;
//! let orchestrator = TurnOrchestrator::from_config(&config)?;
//!
//! let mut session = Session::new("demo");
//! let reply = orchestrator.handle_turn(&mut session, "Am nevoie de o adeverinta pentru angajare").await?;
//! println!("{}", reply.text());
//! ```

pub mod cache;
pub mod config;
pub mod interpreter;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod retrieval;
pub mod session;

pub use cache::EmbeddingCache;
pub use config::{AppConfig, ConfigError, EmbeddingKind, InterpreterKind, LogFormat};
pub use interpreter::{
    InterpretError, Interpretation, KeywordInterpreter, LlmInterpreter, TurnContext,
    TurnInterpreter,
};
pub use orchestrator::{TurnError, TurnOrchestrator, TurnOrchestratorBuilder, TurnReply};
pub use providers::{EmbeddingProvider, LlmProvider, ProviderError};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, Collaborator};
pub use retrieval::RetrievalService;
pub use session::Session;

use adeverinta_core::{CorpusError, ReasonPolicyError, RetrievalError};
use thiserror::Error;

/// Startup errors. Any of these means the process must not serve turns.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Reason policy error: {0}")]
    Policy(#[from] ReasonPolicyError),

    #[error("Retrieval index error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider '{0}' is not compiled in; rebuild with `--features {0}`")]
    FeatureDisabled(&'static str),

    #[error("Orchestrator not configured: {0}")]
    NotConfigured(String),
}
