use std::str::FromStr;

use common::models::{Account, Direction, Trade, TradeStatus, User};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

fn decode_err<E>(column: &str, source: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| decode_err(column, e))
}

fn opt_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|v| Decimal::from_str(&v).map_err(|e| decode_err(column, e)))
        .transpose()
}

pub(crate) fn encode_decimal(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        telegram_id: row.try_get("telegram_id")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        broker: row.try_get("broker")?,
        currency: row.try_get("currency")?,
        starting_balance: decimal(row, "starting_balance")?,
        current_balance: decimal(row, "current_balance")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn trade_from_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;

    Ok(Trade {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        instrument: row.try_get("instrument")?,
        direction: Direction::from_str(&direction).map_err(|e| decode_err("direction", e))?,
        entry_price: decimal(row, "entry_price")?,
        exit_price: opt_decimal(row, "exit_price")?,
        sl_price: opt_decimal(row, "sl_price")?,
        tp_price: opt_decimal(row, "tp_price")?,
        lot_size: decimal(row, "lot_size")?,
        status: TradeStatus::from_str(&status).map_err(|e| decode_err("status", e))?,
        notes: row.try_get("notes")?,
        entry_time: row.try_get("entry_time")?,
        exit_time: row.try_get("exit_time")?,
    })
}
