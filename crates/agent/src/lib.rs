//! Agent runtime for the Rise Construction staff assistant.
//!
//! A chat turn flows through a constrained loop:
//! 1. **Role policy** (`policy`) - resolve the caller tier to a persona and tool subset
//! 2. **Session** (`session`) - load or create the conversation under a per-session lock
//! 3. **Model call** (`llm`) - send persona, transcript and tool schemas to the model
//! 4. **Tool dispatch** (`tools`) - validate arguments and run each call against the store
//! 5. **Checkpoint** - persist the transcript after every dispatch round and at the end
//!
//! The model never touches the database directly. Every read or write goes through
//! a typed tool, and read-only SQL from the details lookup passes `guardrails` first.

pub mod audit;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod policy;
pub mod runtime;
pub mod session;
pub mod tools;

pub use error::AgentError;
pub use runtime::{AgentRuntime, TurnOutcome, TurnRequest, TurnResponse, FALLBACK_RESPONSE};
