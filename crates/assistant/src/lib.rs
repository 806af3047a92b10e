//! Natural-language journal assistant.
//!
//! The language model answers in free text and may embed a structured action
//! (add/edit a trade or account). This crate extracts that action, validates
//! it, holds it until the user confirms and finally applies it to the journal.

pub mod action;
pub mod coerce;
pub mod context;
pub mod controller;
pub mod error;
pub mod executor;
pub mod llm;
pub mod parser;
pub mod render;
pub mod session;
pub mod typed;
pub mod validator;

pub use action::{Action, ActionKind};
pub use controller::{CallbackAction, ChatController, Keyboard, OutgoingMessage, Reply};
pub use executor::{ActionExecutor, ExecutionOutcome};
pub use session::{ConversationPhase, SessionStore};
