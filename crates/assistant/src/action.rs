use std::fmt;

use serde_json::{Map, Value, json};

use crate::parser;

pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    AddTrade,
    AddAccount,
    EditTrade,
    EditAccount,
    None,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddTrade => "add_trade",
            Self::AddAccount => "add_account",
            Self::EditTrade => "edit_trade",
            Self::EditAccount => "edit_account",
            Self::None => "none",
        }
    }

    /// Case-insensitive lookup of a wire name. Unknown names are rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "add_trade" => Some(Self::AddTrade),
            "add_account" => Some(Self::AddAccount),
            "edit_trade" => Some(Self::EditTrade),
            "edit_account" => Some(Self::EditAccount),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured request extracted from one assistant reply.
///
/// Immutable once built. `confidence` is always within `[0.0, 1.0]` and an
/// action of kind `None` never asks for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    kind: ActionKind,
    payload: Payload,
    confidence: f64,
    confirmation_text: String,
    needs_confirmation: bool,
}

impl Action {
    pub fn new(kind: ActionKind, payload: Payload) -> Self {
        Self {
            kind,
            payload,
            confidence: 1.0,
            confirmation_text: String::new(),
            needs_confirmation: kind.is_mutation(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_confirmation_text(mut self, text: impl Into<String>) -> Self {
        self.confirmation_text = text.into();
        self
    }

    pub fn with_needs_confirmation(mut self, needs_confirmation: bool) -> Self {
        self.needs_confirmation = needs_confirmation && self.kind.is_mutation();
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn confirmation_text(&self) -> &str {
        &self.confirmation_text
    }

    pub fn needs_confirmation(&self) -> bool {
        self.needs_confirmation
    }

    /// Serializes into the same object shape the language model emits, so
    /// the stored form can be read back with [`Action::from_value`].
    pub fn to_value(&self) -> Value {
        json!({
            "action": self.kind.as_str(),
            "data": Value::Object(self.payload.clone()),
            "confirmation_message": self.confirmation_text,
            "confidence": self.confidence,
            "requires_confirmation": self.needs_confirmation,
        })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().and_then(parser::action_from_object)
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(0.0, 1.0)
}
