//! Strongly typed actions, built only from payloads that passed validation.

use std::fmt;
use std::str::FromStr;

use common::models::{Direction, TradeStatus};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::action::{Action, ActionKind};
use crate::coerce::{non_empty_str, to_decimal, to_id};
use crate::error::ActionError;
use crate::validator;

/// Identifies the entity an edit applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Id(i64),
    /// Case-insensitive fragment of an instrument or account name.
    Name(String),
}

impl EditTarget {
    /// Accepts `{"id": 3}`, `{"<name_key>": "DAX"}`, a bare id or a bare name.
    pub fn from_value(value: &Value, name_key: &str) -> Result<Self, String> {
        match value {
            Value::Number(_) => to_id(value)
                .map(Self::Id)
                .ok_or_else(|| "Target 'id' must be a positive integer".to_string()),
            Value::String(_) => non_empty_str(value)
                .map(|s| Self::Name(s.to_string()))
                .ok_or_else(|| format!("Target '{}' must be a non-empty string", name_key)),
            Value::Object(obj) => {
                let id = obj.get("id").filter(|v| !v.is_null());
                let name = obj.get(name_key).filter(|v| !v.is_null());
                match (id, name) {
                    (Some(_), Some(_)) => Err(format!(
                        "Target must include only one of 'id' or '{}'",
                        name_key
                    )),
                    (None, None) => Err(format!("Target must include 'id' or '{}'", name_key)),
                    (Some(id), None) => to_id(id)
                        .map(Self::Id)
                        .ok_or_else(|| "Target 'id' must be a positive integer".to_string()),
                    (None, Some(name)) => non_empty_str(name)
                        .map(|s| Self::Name(s.to_string()))
                        .ok_or_else(|| {
                            format!("Target '{}' must be a non-empty string", name_key)
                        }),
                }
            }
            _ => Err("Field 'target' must be a dictionary".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub sl_price: Option<Decimal>,
    pub tp_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub lot_size: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub starting_balance: Decimal,
    pub currency: String,
    pub broker: Option<String>,
}

/// One allow-listed trade edit. `None` clears the column.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeChange {
    SlPrice(Option<Decimal>),
    TpPrice(Option<Decimal>),
    EntryPrice(Decimal),
    ExitPrice(Option<Decimal>),
    LotSize(Decimal),
    Notes(Option<String>),
    Status(TradeStatus),
}

impl TradeChange {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SlPrice(_) => "Stop Loss",
            Self::TpPrice(_) => "Take Profit",
            Self::EntryPrice(_) => "Entry Price",
            Self::ExitPrice(_) => "Exit Price",
            Self::LotSize(_) => "Lot Size",
            Self::Notes(_) => "Notes",
            Self::Status(_) => "Status",
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            Self::SlPrice(v) | Self::TpPrice(v) | Self::ExitPrice(v) => opt_decimal(*v),
            Self::EntryPrice(v) | Self::LotSize(v) => v.normalize().to_string(),
            Self::Notes(v) => v.clone().unwrap_or_else(|| CLEAR.to_string()),
            Self::Status(s) => s.to_string(),
        }
    }
}

/// One allow-listed account edit.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountChange {
    Name(String),
    Broker(Option<String>),
    Currency(String),
    IsActive(bool),
}

impl AccountChange {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name(_) => "Name",
            Self::Broker(_) => "Broker",
            Self::Currency(_) => "Currency",
            Self::IsActive(_) => "Active",
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            Self::Name(v) | Self::Currency(v) => v.clone(),
            Self::Broker(v) => v.clone().unwrap_or_else(|| CLEAR.to_string()),
            Self::IsActive(v) => yes_no(*v).to_string(),
        }
    }
}

pub(crate) const CLEAR: &str = "(clear)";

pub(crate) fn opt_decimal(value: Option<Decimal>) -> String {
    value
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| CLEAR.to_string())
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedAction {
    AddTrade(NewTrade),
    AddAccount(NewAccount),
    EditTrade {
        target: EditTarget,
        changes: Vec<TradeChange>,
    },
    EditAccount {
        target: EditTarget,
        changes: Vec<AccountChange>,
    },
}

impl TypedAction {
    /// Validates the raw payload and converts it. Actions of kind `None`
    /// carry no mutation and are rejected.
    pub fn from_action(action: &Action) -> Result<Self, ActionError> {
        let payload = Value::Object(action.payload().clone());
        let report = validator::validate(action.kind(), &payload);
        if !report.is_ok() {
            return Err(ActionError::Invalid(report.into_errors()));
        }

        let data = action.payload();
        match action.kind() {
            ActionKind::AddTrade => build_new_trade(data).map(Self::AddTrade),
            ActionKind::AddAccount => build_new_account(data).map(Self::AddAccount),
            ActionKind::EditTrade => {
                let target = build_target(data, "instrument")?;
                let changes = changes(data)
                    .iter()
                    .map(|(field, value)| build_trade_change(field, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::EditTrade { target, changes })
            }
            ActionKind::EditAccount => {
                let target = build_target(data, "name")?;
                let changes = changes(data)
                    .iter()
                    .map(|(field, value)| build_account_change(field, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::EditAccount { target, changes })
            }
            ActionKind::None => Err(ActionError::Invalid(vec![
                "Action 'none' carries no change".to_string(),
            ])),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AddTrade(_) => ActionKind::AddTrade,
            Self::AddAccount(_) => ActionKind::AddAccount,
            Self::EditTrade { .. } => ActionKind::EditTrade,
            Self::EditAccount { .. } => ActionKind::EditAccount,
        }
    }
}

impl fmt::Display for EditTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{}", id),
            Self::Name(name) => write!(f, "'{}'", name),
        }
    }
}

fn invalid(message: impl Into<String>) -> ActionError {
    ActionError::Invalid(vec![message.into()])
}

fn changes(data: &Map<String, Value>) -> Map<String, Value> {
    data.get("changes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn build_target(data: &Map<String, Value>, name_key: &str) -> Result<EditTarget, ActionError> {
    let value = data
        .get("target")
        .ok_or_else(|| invalid("Missing required field: 'target'"))?;
    EditTarget::from_value(value, name_key).map_err(invalid)
}

fn required_decimal(data: &Map<String, Value>, field: &str) -> Result<Decimal, ActionError> {
    data.get(field)
        .and_then(to_decimal)
        .ok_or_else(|| invalid(format!("Field '{}' must be a number", field)))
}

fn optional_decimal(data: &Map<String, Value>, field: &str) -> Option<Decimal> {
    data.get(field).and_then(to_decimal)
}

fn optional_text(data: &Map<String, Value>, field: &str) -> Option<String> {
    data.get(field)
        .and_then(non_empty_str)
        .map(str::to_string)
}

fn build_new_trade(data: &Map<String, Value>) -> Result<NewTrade, ActionError> {
    let instrument = optional_text(data, "instrument")
        .ok_or_else(|| invalid("Field 'instrument' must be a non-empty string"))?;
    let direction = data
        .get("direction")
        .and_then(Value::as_str)
        .and_then(|s| Direction::from_str(s).ok())
        .ok_or_else(|| invalid("Field 'direction' must be 'long' or 'short'"))?;

    Ok(NewTrade {
        instrument,
        direction,
        entry_price: required_decimal(data, "entry_price")?,
        sl_price: optional_decimal(data, "sl_price"),
        tp_price: optional_decimal(data, "tp_price"),
        exit_price: optional_decimal(data, "exit_price"),
        lot_size: optional_decimal(data, "lot_size").unwrap_or(Decimal::ONE),
        notes: optional_text(data, "notes"),
    })
}

fn build_new_account(data: &Map<String, Value>) -> Result<NewAccount, ActionError> {
    let name = optional_text(data, "name")
        .ok_or_else(|| invalid("Field 'name' must not be empty"))?;

    Ok(NewAccount {
        name,
        starting_balance: required_decimal(data, "starting_balance")?,
        currency: optional_text(data, "currency")
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "USD".to_string()),
        broker: optional_text(data, "broker"),
    })
}

fn build_trade_change(field: &str, value: &Value) -> Result<TradeChange, ActionError> {
    let decimal = || -> Result<Option<Decimal>, ActionError> {
        if value.is_null() {
            return Ok(None);
        }
        to_decimal(value)
            .map(Some)
            .ok_or_else(|| invalid(format!("Field '{}' must be a number", field)))
    };
    let not_null = |v: Option<Decimal>| {
        v.ok_or_else(|| invalid(format!("Field '{}' cannot be cleared", field)))
    };

    match field {
        "sl_price" => Ok(TradeChange::SlPrice(decimal()?)),
        "tp_price" => Ok(TradeChange::TpPrice(decimal()?)),
        "exit_price" => Ok(TradeChange::ExitPrice(decimal()?)),
        "entry_price" => Ok(TradeChange::EntryPrice(not_null(decimal()?)?)),
        "lot_size" => Ok(TradeChange::LotSize(not_null(decimal()?)?)),
        "notes" => Ok(TradeChange::Notes(non_empty_str(value).map(str::to_string))),
        "status" => {
            let raw = value.as_str().unwrap_or_default();
            TradeStatus::from_str(raw)
                .map(TradeChange::Status)
                .map_err(|e| ActionError::InvalidStatus(e.value))
        }
        other => Err(invalid(format!("Field '{}' cannot be edited", other))),
    }
}

fn build_account_change(field: &str, value: &Value) -> Result<AccountChange, ActionError> {
    match field {
        "name" => non_empty_str(value)
            .map(|s| AccountChange::Name(s.to_string()))
            .ok_or_else(|| invalid("Field 'name' must not be empty")),
        "currency" => non_empty_str(value)
            .map(|s| AccountChange::Currency(s.to_uppercase()))
            .ok_or_else(|| invalid("Field 'currency' must be a non-empty string")),
        "broker" => Ok(AccountChange::Broker(
            non_empty_str(value).map(str::to_string),
        )),
        "is_active" => value
            .as_bool()
            .map(AccountChange::IsActive)
            .ok_or_else(|| invalid("Field 'is_active' must be a boolean")),
        other => Err(invalid(format!("Field '{}' cannot be edited", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Payload;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn action(kind: ActionKind, data: Value) -> Action {
        let payload: Payload = data.as_object().cloned().unwrap_or_default();
        Action::new(kind, payload)
    }

    #[test]
    fn test_target_forms() {
        assert_eq!(
            EditTarget::from_value(&json!({"id": 4}), "instrument"),
            Ok(EditTarget::Id(4))
        );
        assert_eq!(
            EditTarget::from_value(&json!({"instrument": " DAX "}), "instrument"),
            Ok(EditTarget::Name("DAX".to_string()))
        );
        assert_eq!(EditTarget::from_value(&json!(9), "name"), Ok(EditTarget::Id(9)));
        assert_eq!(
            EditTarget::from_value(&json!("Prop"), "name"),
            Ok(EditTarget::Name("Prop".to_string()))
        );
    }

    #[test]
    fn test_target_rejections() {
        assert!(EditTarget::from_value(&json!({}), "name").is_err());
        assert!(EditTarget::from_value(&json!({"id": 1, "name": "A"}), "name").is_err());
        assert!(EditTarget::from_value(&json!({"id": "abc"}), "name").is_err());
        assert!(EditTarget::from_value(&json!([1]), "name").is_err());
    }

    #[test]
    fn test_add_trade_defaults() {
        let typed = TypedAction::from_action(&action(
            ActionKind::AddTrade,
            json!({"instrument": "DAX", "direction": "LONG", "entry_price": 18500}),
        ))
        .unwrap();

        let TypedAction::AddTrade(trade) = typed else {
            panic!("expected AddTrade");
        };
        assert_eq!(trade.direction, Direction::Long);
        assert_eq!(trade.entry_price, dec!(18500));
        assert_eq!(trade.lot_size, dec!(1));
        assert_eq!(trade.sl_price, None);
    }

    #[test]
    fn test_add_account_currency_defaults_and_uppercases() {
        let typed = TypedAction::from_action(&action(
            ActionKind::AddAccount,
            json!({"name": " Swing ", "starting_balance": "5000"}),
        ))
        .unwrap();
        assert_eq!(
            typed,
            TypedAction::AddAccount(NewAccount {
                name: "Swing".to_string(),
                starting_balance: dec!(5000),
                currency: "USD".to_string(),
                broker: None,
            })
        );

        let typed = TypedAction::from_action(&action(
            ActionKind::AddAccount,
            json!({"name": "Euro", "starting_balance": 1, "currency": "eur"}),
        ))
        .unwrap();
        let TypedAction::AddAccount(account) = typed else {
            panic!("expected AddAccount");
        };
        assert_eq!(account.currency, "EUR");
    }

    #[test]
    fn test_edit_trade_changes() {
        let typed = TypedAction::from_action(&action(
            ActionKind::EditTrade,
            json!({
                "target": {"instrument": "DAX"},
                "changes": {"sl_price": 18350, "tp_price": null, "status": "CLOSED"}
            }),
        ))
        .unwrap();

        let TypedAction::EditTrade { target, changes } = typed else {
            panic!("expected EditTrade");
        };
        assert_eq!(target, EditTarget::Name("DAX".to_string()));
        assert!(changes.contains(&TradeChange::SlPrice(Some(dec!(18350)))));
        assert!(changes.contains(&TradeChange::TpPrice(None)));
        assert!(changes.contains(&TradeChange::Status(TradeStatus::Closed)));
    }

    #[test]
    fn test_invalid_payload_rejected() {
        let err = TypedAction::from_action(&action(
            ActionKind::AddTrade,
            json!({"instrument": "DAX", "direction": "up", "entry_price": 1}),
        ))
        .unwrap_err();
        assert!(matches!(err, ActionError::Invalid(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_none_kind_rejected() {
        let err = TypedAction::from_action(&Action::new(ActionKind::None, Payload::new()));
        assert!(err.is_err());
    }

    #[test]
    fn test_change_display() {
        assert_eq!(TradeChange::SlPrice(None).display_value(), "(clear)");
        assert_eq!(
            TradeChange::EntryPrice(dec!(18500.0)).display_value(),
            "18500"
        );
        assert_eq!(AccountChange::IsActive(false).display_value(), "No");
        assert_eq!(AccountChange::IsActive(true).label(), "Active");
    }

    #[test]
    fn test_status_builder_reports_invalid_status() {
        let err = build_trade_change("status", &json!("pending")).unwrap_err();
        assert!(matches!(err, ActionError::InvalidStatus(ref v) if v == "pending"));
    }
}
