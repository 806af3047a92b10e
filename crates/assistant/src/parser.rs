//! Extraction of structured actions from free-form assistant replies.
//!
//! The model is asked to wrap actions in a fenced ```json block, but it does
//! not always comply, so a bare `{ "action": ... }` object is accepted too.
//! Anything that does not decode cleanly is treated as "no action".

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::action::{Action, ActionKind, Payload, clamp_confidence};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?i:json)[ \t]*\r?\n?(.*?)```").expect("Invalid fenced block regex")
});

// A brace-delimited object with a top-level "action" field and at most one
// level of nested braces. Edit actions nest two levels and only parse fenced.
static RAW_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{(?:[^{}]|\{[^{}]*\})*"action"(?:[^{}]|\{[^{}]*\})*\}"#)
        .expect("Invalid raw object regex")
});

/// Parses the first structured action found in `text`.
///
/// Returns `None` when there is no candidate, when it is not valid JSON, when
/// it lacks an `"action"` key or names an unknown action.
pub fn parse(text: &str) -> Option<Action> {
    if text.trim().is_empty() {
        return None;
    }

    let candidate = find_candidate(text)?;

    let decoded: Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(e) => {
            warn!("Discarding malformed action block: {}", e);
            return None;
        }
    };

    match decoded.as_object() {
        Some(obj) => action_from_object(obj),
        None => {
            debug!("Action block is not an object, ignoring");
            None
        }
    }
}

/// Removes the structured block from `text`, leaving the prose around it.
pub fn strip_action_block(text: &str) -> String {
    let stripped = if FENCED_BLOCK.is_match(text) {
        FENCED_BLOCK.replace(text, "")
    } else {
        RAW_OBJECT.replace(text, "")
    };
    stripped.trim().to_string()
}

fn find_candidate(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim());
    }
    RAW_OBJECT.find(text).map(|m| m.as_str())
}

/// Builds an [`Action`] from an already decoded wire object.
pub(crate) fn action_from_object(obj: &Map<String, Value>) -> Option<Action> {
    let name = match obj.get("action") {
        Some(Value::String(name)) => name,
        Some(other) => {
            debug!("Ignoring non-string action field: {}", other);
            return None;
        }
        None => {
            debug!("Structured block has no 'action' key");
            return None;
        }
    };

    let Some(kind) = ActionKind::from_name(name) else {
        warn!("Unknown action '{}' rejected", name);
        return None;
    };

    let payload: Payload = match obj.get("data") {
        Some(Value::Object(map)) => map.clone(),
        _ => Payload::new(),
    };

    let confirmation_text = match obj.get("confirmation_message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let confidence = match obj.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(1.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(1.0),
        _ => 1.0,
    };

    let needs_confirmation = match obj.get("requires_confirmation") {
        Some(Value::Bool(b)) => *b,
        _ => true,
    };

    Some(
        Action::new(kind, payload)
            .with_confidence(clamp_confidence(confidence))
            .with_confirmation_text(confirmation_text)
            .with_needs_confirmation(needs_confirmation),
    )
}
