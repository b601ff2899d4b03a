//! # adeverinta-core
//!
//! Deterministic engine behind the student certificate (adeverinta) desk.
//!
//! This crate answers, for every user turn:
//! - Which policy snippets are relevant?
//! - Is the stated reason forbidden, allowed or unclear?
//! - Which form fields are still missing, and is the request ready?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same prior state and updates, same outcome
//! 2. **No network calls**: retrieval scores precomputed embeddings or TF-IDF
//! 3. **Traceable**: every refusal cites the policy snippet that lists the reason
//! 4. **Atomic turns**: a failed turn leaves the prior state untouched
//!
//! ## Example
//!
//! ```rust,ignore
//! use adeverinta_core::{ConversationMachine, FieldName, FieldUpdates, FormSchema, FormState, ReasonPolicy};
//!
//! let policy = ReasonPolicy::from_yaml_file("config/reasons.yaml")?;
//! let machine = ConversationMachine::new(FormSchema::standard(), Arc::new(policy));
//! let updates = FieldUpdates::new().with(FieldName::Motiv, "Work and Travel");
//! let outcome = machine.advance(&FormState::new(), &updates)?;
//!
//! match outcome.status() {
//!     Status::Forbidden => println!("REFUSED: {:?}", outcome.policy_used),
//!     Status::NeedInfo => println!("ASK: {}", outcome.next_question),
//!     Status::Ready => println!("READY: {}", outcome.instructions.unwrap().text),
//! }
//! ```

pub mod contract;
pub mod conversation;
pub mod corpus;
pub mod decision;
pub mod form;
pub mod nlu;
pub mod policy;
pub mod retrieval;
pub mod text;

// Re-export main types at crate root
pub use contract::{CollaboratorResponse, ContractValidator, ContractViolation, ValidatedResponse};
pub use conversation::{
    ConversationError, ConversationMachine, FieldUpdates, FormState, Status, TurnOutcome,
};
pub use corpus::{CorpusError, DocumentStore, IndexRecord, PolicyDocument};
pub use decision::{compute_instructions, Instructions};
pub use form::{FieldName, FieldValues, FormSchema, SchemaError};
pub use nlu::{ExtractionContext, Extractor, KeywordExtractor};
pub use policy::{ReasonClass, ReasonPolicy, ReasonPolicyError};
pub use retrieval::{Backend, Retrieval, RetrievalEngine, RetrievalError, RetrievalResult};
