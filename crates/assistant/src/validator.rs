//! Field-level checks run before an action is ever offered for confirmation.
//!
//! Every rule violation is collected so the full report can be logged in one
//! go. Validation never fails itself; it only produces a report.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::action::ActionKind;
use crate::coerce::{non_empty_str, to_decimal};

pub const TRADE_NUMERIC_FIELDS: &[&str] =
    &["entry_price", "sl_price", "tp_price", "exit_price", "lot_size"];
pub const TRADE_EDITABLE_FIELDS: &[&str] = &[
    "sl_price",
    "tp_price",
    "entry_price",
    "exit_price",
    "lot_size",
    "notes",
    "status",
];
pub const ACCOUNT_EDITABLE_FIELDS: &[&str] = &["name", "broker", "currency", "is_active"];
pub const TRADE_STATUSES: &[&str] = &["open", "closed", "cancelled"];

// Columns that are NOT NULL in the journal and so cannot be cleared by an edit.
const TRADE_UNCLEARABLE: &[&str] = &["entry_price", "lot_size", "status"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

pub fn validate(kind: ActionKind, payload: &Value) -> ValidationReport {
    match kind {
        ActionKind::AddTrade => validate_trade(payload),
        ActionKind::AddAccount => validate_account(payload),
        ActionKind::EditTrade => validate_edit_trade(payload),
        ActionKind::EditAccount => validate_edit_account(payload),
        ActionKind::None => ValidationReport::default(),
    }
}

pub fn validate_trade(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(data) = as_mapping(payload, &mut report) else {
        return report;
    };

    for field in ["instrument", "direction", "entry_price"] {
        require(data, field, &mut report);
    }

    if let Some(value) = present(data, "instrument") {
        if non_empty_str(value).is_none() {
            report.push("Field 'instrument' must be a non-empty string");
        }
    }

    if let Some(value) = present(data, "direction") {
        check_direction(value, &mut report);
    }

    for field in TRADE_NUMERIC_FIELDS {
        if let Some(value) = present(data, field) {
            check_positive(field, value, &mut report);
        }
    }

    if let Some(value) = present(data, "notes") {
        if !value.is_string() {
            report.push("Field 'notes' must be a string");
        }
    }

    report
}

pub fn validate_account(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(data) = as_mapping(payload, &mut report) else {
        return report;
    };

    for field in ["name", "starting_balance"] {
        require(data, field, &mut report);
    }

    if let Some(value) = present(data, "name") {
        check_name(value, &mut report);
    }

    if let Some(value) = present(data, "starting_balance") {
        match to_decimal(value) {
            None => report.push("Field 'starting_balance' must be a number"),
            Some(d) if d < Decimal::ZERO => {
                report.push("Field 'starting_balance' must not be negative")
            }
            Some(_) => {}
        }
    }

    if let Some(value) = present(data, "currency") {
        check_currency(value, &mut report);
    }

    if let Some(value) = present(data, "broker") {
        if !value.is_string() {
            report.push("Field 'broker' must be a string");
        }
    }

    report
}

pub fn validate_edit_trade(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(data) = as_mapping(payload, &mut report) else {
        return report;
    };

    check_target(data, "instrument", &mut report);

    let Some(changes) = changes_of(data, TRADE_EDITABLE_FIELDS, &mut report) else {
        return report;
    };

    for (field, value) in changes {
        if !TRADE_EDITABLE_FIELDS.contains(&field.as_str()) {
            continue;
        }
        if value.is_null() {
            if TRADE_UNCLEARABLE.contains(&field.as_str()) {
                report.push(format!("Field '{}' cannot be cleared", field));
            }
            continue;
        }
        match field.as_str() {
            "status" => check_status(value, &mut report),
            "notes" => {
                if !value.is_string() {
                    report.push("Field 'notes' must be a string");
                }
            }
            numeric => check_positive(numeric, value, &mut report),
        }
    }

    report
}

pub fn validate_edit_account(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(data) = as_mapping(payload, &mut report) else {
        return report;
    };

    check_target(data, "name", &mut report);

    let Some(changes) = changes_of(data, ACCOUNT_EDITABLE_FIELDS, &mut report) else {
        return report;
    };

    for (field, value) in changes {
        match field.as_str() {
            "name" if value.is_null() => report.push("Field 'name' cannot be cleared"),
            "name" => check_name(value, &mut report),
            "currency" if value.is_null() => report.push("Field 'currency' cannot be cleared"),
            "currency" => check_currency(value, &mut report),
            "broker" => {
                if !(value.is_null() || value.is_string()) {
                    report.push("Field 'broker' must be a string");
                }
            }
            "is_active" => {
                if !value.is_boolean() {
                    report.push("Field 'is_active' must be a boolean");
                }
            }
            _ => {}
        }
    }

    report
}

fn as_mapping<'a>(
    payload: &'a Value,
    report: &mut ValidationReport,
) -> Option<&'a Map<String, Value>> {
    let map = payload.as_object();
    if map.is_none() {
        report.push("Payload must be a dictionary");
    }
    map
}

fn require(data: &Map<String, Value>, field: &str, report: &mut ValidationReport) {
    match data.get(field) {
        None => report.push(format!("Missing required field: '{}'", field)),
        Some(Value::Null) => report.push(format!("Field '{}' must not be null", field)),
        Some(_) => {}
    }
}

/// A field that is present with a non-null value.
fn present<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

fn check_positive(field: &str, value: &Value, report: &mut ValidationReport) {
    match to_decimal(value) {
        None => report.push(format!("Field '{}' must be a number", field)),
        Some(d) if d <= Decimal::ZERO => {
            report.push(format!("Field '{}' must be a positive number", field))
        }
        Some(_) => {}
    }
}

fn check_direction(value: &Value, report: &mut ValidationReport) {
    match value.as_str() {
        None => report.push("Field 'direction' must be a string"),
        Some(s) if !matches!(s.trim().to_lowercase().as_str(), "long" | "short") => {
            report.push(format!(
                "Field 'direction' must be 'long' or 'short', got '{}'",
                s
            ))
        }
        Some(_) => {}
    }
}

fn check_status(value: &Value, report: &mut ValidationReport) {
    let valid = value
        .as_str()
        .is_some_and(|s| TRADE_STATUSES.contains(&s.trim().to_lowercase().as_str()));
    if !valid {
        report.push(format!(
            "Field 'status' must be one of: {}",
            TRADE_STATUSES.join(", ")
        ));
    }
}

fn check_name(value: &Value, report: &mut ValidationReport) {
    match value.as_str() {
        None => report.push("Field 'name' must be a string"),
        Some(s) if s.trim().is_empty() => report.push("Field 'name' must not be empty"),
        Some(_) => {}
    }
}

fn check_currency(value: &Value, report: &mut ValidationReport) {
    if non_empty_str(value).is_none() {
        report.push("Field 'currency' must be a non-empty string");
    }
}

fn check_target(data: &Map<String, Value>, name_key: &str, report: &mut ValidationReport) {
    match data.get("target") {
        None => report.push("Missing required field: 'target'"),
        Some(Value::Null) => report.push("Field 'target' must not be null"),
        Some(target) => {
            if let Err(e) = crate::typed::EditTarget::from_value(target, name_key) {
                report.push(e);
            }
        }
    }
}

fn changes_of<'a>(
    data: &'a Map<String, Value>,
    allowed: &[&str],
    report: &mut ValidationReport,
) -> Option<&'a Map<String, Value>> {
    let changes = match data.get("changes") {
        None => {
            report.push("Missing required field: 'changes'");
            return None;
        }
        Some(Value::Object(changes)) => changes,
        Some(_) => {
            report.push("Field 'changes' must be a dictionary");
            return None;
        }
    };

    if changes.is_empty() {
        report.push("Field 'changes' must contain at least one change");
        return None;
    }

    for field in changes.keys() {
        if !allowed.contains(&field.as_str()) {
            report.push(format!(
                "Field '{}' cannot be edited (allowed: {})",
                field,
                allowed.join(", ")
            ));
        }
    }

    Some(changes)
}
