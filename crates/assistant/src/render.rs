use common::models::Direction;
use rust_decimal::Decimal;

use crate::action::Action;
use crate::typed::{EditTarget, NewAccount, NewTrade, TypedAction};

/// Text of the confirmation card. A message prepared by the model wins;
/// otherwise one is synthesized from the typed action.
pub fn render_confirmation(action: &Action, typed: &TypedAction) -> String {
    let prepared = action.confirmation_text().trim();
    if !prepared.is_empty() {
        return prepared.to_string();
    }

    match typed {
        TypedAction::AddTrade(trade) => render_new_trade(trade),
        TypedAction::AddAccount(account) => render_new_account(account),
        TypedAction::EditTrade { target, changes } => render_edit(
            "✏️ Update trade?",
            &describe_trade_target(target),
            changes.iter().map(|c| (c.label(), c.display_value())),
        ),
        TypedAction::EditAccount { target, changes } => render_edit(
            "✏️ Update account?",
            &describe_account_target(target),
            changes.iter().map(|c| (c.label(), c.display_value())),
        ),
    }
}

pub fn describe_trade_target(target: &EditTarget) -> String {
    match target {
        EditTarget::Id(id) => format!("trade #{}", id),
        EditTarget::Name(instrument) => format!("most recent open {} trade", instrument),
    }
}

pub fn describe_account_target(target: &EditTarget) -> String {
    match target {
        EditTarget::Id(id) => format!("account #{}", id),
        EditTarget::Name(name) => format!("account '{}'", name),
    }
}

fn line(out: &mut String, label: &str, value: impl AsRef<str>) {
    out.push_str(label);
    out.push_str(": ");
    out.push_str(value.as_ref());
    out.push('\n');
}

fn num(value: Decimal) -> String {
    value.normalize().to_string()
}

fn render_new_trade(trade: &NewTrade) -> String {
    let arrow = match trade.direction {
        Direction::Long => "📈",
        Direction::Short => "📉",
    };
    let mut out = format!("{} Add new trade?\n\n", arrow);

    line(&mut out, "Instrument", &trade.instrument);
    line(&mut out, "Direction", trade.direction.to_string());
    line(&mut out, "Entry Price", num(trade.entry_price));
    if let Some(sl) = trade.sl_price {
        line(&mut out, "Stop Loss", num(sl));
    }
    if let Some(tp) = trade.tp_price {
        line(&mut out, "Take Profit", num(tp));
    }
    if let Some(exit) = trade.exit_price {
        line(&mut out, "Exit Price", num(exit));
    }
    line(&mut out, "Lot Size", num(trade.lot_size));
    if let Some(notes) = &trade.notes {
        line(&mut out, "Notes", notes);
    }

    out.trim_end().to_string()
}

fn render_new_account(account: &NewAccount) -> String {
    let mut out = String::from("🏦 Create new account?\n\n");

    line(&mut out, "Name", &account.name);
    line(&mut out, "Starting Balance", num(account.starting_balance));
    line(&mut out, "Currency", &account.currency);
    if let Some(broker) = &account.broker {
        line(&mut out, "Broker", broker);
    }

    out.trim_end().to_string()
}

fn render_edit<'a>(
    title: &str,
    target: &str,
    changes: impl Iterator<Item = (&'a str, String)>,
) -> String {
    let mut out = format!("{}\n\nTarget: {}\n\nChanges:\n", title, target);
    for (label, value) in changes {
        out.push_str("• ");
        line(&mut out, label, value);
    }
    out.trim_end().to_string()
}
