use common::models::{AccountInsert, TradeInsert, TradeStatus, User};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use storage::db::now_ts;
use storage::repositories::{AccountRepository, TradeRepository, UserRepository};
use tracing::{error, info, warn};

use crate::action::Action;
use crate::coerce::fmt_decimal;
use crate::error::ActionError;
use crate::typed::{
    AccountChange, EditTarget, NewAccount, NewTrade, TradeChange, TypedAction, yes_no,
};

/// Placeholder for an empty field in result messages, before and after a change.
const UNSET: &str = "-";

fn shown_decimal(value: Option<Decimal>) -> String {
    value.map(fmt_decimal).unwrap_or_else(|| UNSET.to_string())
}

fn shown_text(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNSET.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
}

impl ExecutionOutcome {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn failed(error: &ActionError) -> Self {
        Self {
            success: false,
            message: format!("❌ {}", error),
        }
    }
}

/// Applies confirmed actions to the journal. Every call runs in its own
/// transaction and always yields an outcome, never an error.
#[derive(Clone)]
pub struct ActionExecutor {
    pool: SqlitePool,
}

impl ActionExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn execute(&self, telegram_id: i64, action: &Action) -> ExecutionOutcome {
        let result = match TypedAction::from_action(action) {
            Ok(typed) => self.run(telegram_id, &typed).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(message) => {
                info!("Executed {} for user {}", action.kind(), telegram_id);
                ExecutionOutcome::ok(message)
            }
            Err(e) => {
                match &e {
                    ActionError::Database(db_err) => error!(
                        "Database failure executing {} for user {}: {}",
                        action.kind(),
                        telegram_id,
                        db_err
                    ),
                    other => warn!(
                        "Could not execute {} for user {}: {}",
                        action.kind(),
                        telegram_id,
                        other
                    ),
                }
                ExecutionOutcome::failed(&e)
            }
        }
    }

    async fn run(&self, telegram_id: i64, action: &TypedAction) -> Result<String, ActionError> {
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::find_by_telegram_id(&mut *tx, telegram_id)
            .await?
            .ok_or(ActionError::UserNotFound)?;

        let message = match action {
            TypedAction::AddTrade(trade) => add_trade(&mut tx, &user, trade).await?,
            TypedAction::AddAccount(account) => add_account(&mut tx, &user, account).await?,
            TypedAction::EditTrade { target, changes } => {
                edit_trade(&mut tx, &user, target, changes).await?
            }
            TypedAction::EditAccount { target, changes } => {
                edit_account(&mut tx, &user, target, changes).await?
            }
        };

        tx.commit().await?;
        Ok(message)
    }
}

async fn add_trade(
    tx: &mut Transaction<'_, Sqlite>,
    user: &User,
    trade: &NewTrade,
) -> Result<String, ActionError> {
    let account = AccountRepository::find_first_active(&mut **tx, user.id)
        .await?
        .ok_or(ActionError::NoActiveAccount)?;

    let insert = TradeInsert {
        account_id: account.id,
        instrument: trade.instrument.clone(),
        direction: trade.direction,
        entry_price: trade.entry_price,
        exit_price: trade.exit_price,
        sl_price: trade.sl_price,
        tp_price: trade.tp_price,
        lot_size: trade.lot_size,
        notes: trade.notes.clone(),
        entry_time: now_ts(),
    };
    let id = TradeRepository::insert(&mut **tx, &insert).await?;

    Ok(format!(
        "✅ Trade #{} recorded: {} {} @ {}, size {} on account '{}'.",
        id,
        trade.instrument,
        trade.direction,
        fmt_decimal(trade.entry_price),
        fmt_decimal(trade.lot_size),
        account.name
    ))
}

async fn add_account(
    tx: &mut Transaction<'_, Sqlite>,
    user: &User,
    account: &NewAccount,
) -> Result<String, ActionError> {
    let insert = AccountInsert {
        user_id: user.id,
        name: account.name.clone(),
        broker: account.broker.clone(),
        currency: account.currency.to_uppercase(),
        starting_balance: account.starting_balance,
        current_balance: account.starting_balance,
    };
    let id = AccountRepository::insert(&mut **tx, &insert).await?;

    Ok(format!(
        "✅ Account #{} '{}' created with balance {} {} (broker: {}).",
        id,
        insert.name,
        fmt_decimal(insert.starting_balance),
        insert.currency,
        insert.broker.as_deref().unwrap_or(UNSET)
    ))
}

async fn edit_trade(
    tx: &mut Transaction<'_, Sqlite>,
    user: &User,
    target: &EditTarget,
    changes: &[TradeChange],
) -> Result<String, ActionError> {
    let found = match target {
        EditTarget::Id(id) => TradeRepository::find_by_id_for_user(&mut **tx, user.id, *id).await?,
        EditTarget::Name(instrument) => {
            TradeRepository::find_open_by_instrument(&mut **tx, user.id, instrument).await?
        }
    };
    let mut trade = found.ok_or_else(|| ActionError::TradeNotFound(target.clone()))?;

    let mut diff = Vec::with_capacity(changes.len());
    for change in changes {
        let (old, new) = match change {
            TradeChange::SlPrice(v) => {
                let old = std::mem::replace(&mut trade.sl_price, *v);
                (shown_decimal(old), shown_decimal(*v))
            }
            TradeChange::TpPrice(v) => {
                let old = std::mem::replace(&mut trade.tp_price, *v);
                (shown_decimal(old), shown_decimal(*v))
            }
            TradeChange::ExitPrice(v) => {
                let old = std::mem::replace(&mut trade.exit_price, *v);
                (shown_decimal(old), shown_decimal(*v))
            }
            TradeChange::EntryPrice(v) => {
                let old = std::mem::replace(&mut trade.entry_price, *v);
                (fmt_decimal(old), fmt_decimal(*v))
            }
            TradeChange::LotSize(v) => {
                let old = std::mem::replace(&mut trade.lot_size, *v);
                (fmt_decimal(old), fmt_decimal(*v))
            }
            TradeChange::Notes(v) => {
                let old = std::mem::replace(&mut trade.notes, v.clone());
                (shown_text(old), shown_text(v.clone()))
            }
            TradeChange::Status(status) => {
                let old = trade.status.to_string();
                trade.status = *status;
                match status {
                    TradeStatus::Closed if trade.exit_time.is_none() => {
                        trade.exit_time = Some(now_ts())
                    }
                    TradeStatus::Open => trade.exit_time = None,
                    _ => {}
                }
                (old, status.to_string())
            }
        };
        diff.push(format!("• {}: {} → {}", change.label(), old, new));
    }

    TradeRepository::update(&mut **tx, &trade).await?;

    Ok(format!(
        "✅ Updated trade #{} ({} {}):\n{}",
        trade.id,
        trade.instrument,
        trade.direction,
        diff.join("\n")
    ))
}

async fn edit_account(
    tx: &mut Transaction<'_, Sqlite>,
    user: &User,
    target: &EditTarget,
    changes: &[AccountChange],
) -> Result<String, ActionError> {
    let found = match target {
        EditTarget::Id(id) => {
            AccountRepository::find_by_id_for_user(&mut **tx, user.id, *id).await?
        }
        EditTarget::Name(name) => {
            AccountRepository::find_by_name_fuzzy(&mut **tx, user.id, name).await?
        }
    };
    let mut account = found.ok_or_else(|| ActionError::AccountNotFound(target.clone()))?;

    let mut diff = Vec::with_capacity(changes.len());
    for change in changes {
        let (old, new) = match change {
            AccountChange::Name(name) => {
                let old = std::mem::replace(&mut account.name, name.trim().to_string());
                (old, account.name.clone())
            }
            AccountChange::Broker(broker) => {
                let trimmed = broker
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string);
                let old = std::mem::replace(&mut account.broker, trimmed);
                (shown_text(old), shown_text(account.broker.clone()))
            }
            AccountChange::Currency(currency) => {
                let old = std::mem::replace(&mut account.currency, currency.to_uppercase());
                (old, account.currency.clone())
            }
            AccountChange::IsActive(active) => {
                let old = yes_no(account.is_active).to_string();
                account.is_active = *active;
                (old, yes_no(*active).to_string())
            }
        };
        diff.push(format!("• {}: {} → {}", change.label(), old, new));
    }

    AccountRepository::update(&mut **tx, &account).await?;

    Ok(format!(
        "✅ Updated account #{} '{}':\n{}",
        account.id,
        account.name,
        diff.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, Payload};
    use common::models::Direction;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use storage::db::open_in_memory;

    const TG_ID: i64 = 777;

    fn action(kind: ActionKind, data: Value) -> Action {
        let payload: Payload = data.as_object().cloned().unwrap_or_default();
        Action::new(kind, payload)
    }

    async fn setup() -> (SqlitePool, ActionExecutor, i64) {
        let pool = open_in_memory().await.unwrap();
        let user = UserRepository::get_or_create(&pool, TG_ID, Some("trader"))
            .await
            .unwrap();
        (pool.clone(), ActionExecutor::new(pool), user.id)
    }

    async fn seed_account(pool: &SqlitePool, user_id: i64, name: &str) -> i64 {
        AccountRepository::insert(
            pool,
            &AccountInsert {
                user_id,
                name: name.to_string(),
                broker: None,
                currency: "EUR".to_string(),
                starting_balance: dec!(10000),
                current_balance: dec!(10000),
            },
        )
        .await
        .unwrap()
    }

    fn dax_trade() -> Action {
        action(
            ActionKind::AddTrade,
            json!({
                "instrument": "DAX",
                "direction": "long",
                "entry_price": 18500,
                "sl_price": 18400,
                "tp_price": 18700
            }),
        )
    }

    #[tokio::test]
    async fn test_add_trade_uses_first_active_account() {
        let (pool, executor, user_id) = setup().await;
        let account_id = seed_account(&pool, user_id, "Main").await;
        seed_account(&pool, user_id, "Second").await;

        let outcome = executor.execute(TG_ID, &dax_trade()).await;
        assert!(outcome.success, "{}", outcome.message);

        let trades = TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap();
        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.account_id, account_id);
        assert_eq!(trade.direction, Direction::Long);
        assert_eq!(trade.lot_size, dec!(1));
        assert_eq!(trade.tp_price, Some(dec!(18700)));

        assert!(outcome.message.contains(&format!("#{}", trade.id)));
        assert!(outcome.message.contains("DAX"));
        assert!(outcome.message.contains("Main"));
    }

    #[tokio::test]
    async fn test_add_trade_without_account() {
        let (_pool, executor, _) = setup().await;
        let outcome = executor.execute(TG_ID, &dax_trade()).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("No active account"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (_pool, executor, _) = setup().await;
        let outcome = executor.execute(999, &dax_trade()).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("User not found"));
    }

    #[tokio::test]
    async fn test_add_account() {
        let (pool, executor, user_id) = setup().await;
        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::AddAccount,
                    json!({"name": "Prop", "starting_balance": 50000, "currency": "gbp", "broker": "FTMO"}),
                ),
            )
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.contains("50000 GBP"));
        assert!(outcome.message.contains("FTMO"));

        let accounts = AccountRepository::list_for_user(&pool, user_id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].current_balance, dec!(50000));
        assert_eq!(accounts[0].currency, "GBP");
    }

    #[tokio::test]
    async fn test_edit_trade_by_instrument() {
        let (pool, executor, user_id) = setup().await;
        seed_account(&pool, user_id, "Main").await;
        assert!(executor.execute(TG_ID, &dax_trade()).await.success);

        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditTrade,
                    json!({"target": {"instrument": "dax"}, "changes": {"sl_price": 18350, "notes": "moved to BE"}}),
                ),
            )
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.contains("Stop Loss: 18400 → 18350"));
        assert!(outcome.message.contains("Notes: - → moved to BE"));

        let trade = &TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap()[0];
        assert_eq!(trade.sl_price, Some(dec!(18350)));
    }

    #[tokio::test]
    async fn test_edit_trade_empty_values_share_placeholder() {
        let (pool, executor, user_id) = setup().await;
        seed_account(&pool, user_id, "Main").await;
        assert!(executor.execute(TG_ID, &dax_trade()).await.success);

        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditTrade,
                    json!({"target": {"instrument": "DAX"}, "changes": {"notes": null, "tp_price": null, "exit_price": 18650}}),
                ),
            )
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.contains("Notes: - → -"), "{}", outcome.message);
        assert!(outcome.message.contains("Take Profit: 18700 → -"));
        assert!(outcome.message.contains("Exit Price: - → 18650"));
        assert!(!outcome.message.contains("(clear)"));

        let trade = &TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap()[0];
        assert_eq!(trade.tp_price, None);
        assert_eq!(trade.notes, None);
    }

    #[tokio::test]
    async fn test_edit_trade_missing_instrument_leaves_rows_untouched() {
        let (pool, executor, user_id) = setup().await;
        seed_account(&pool, user_id, "Main").await;
        let eurusd = action(
            ActionKind::AddTrade,
            json!({"instrument": "EURUSD", "direction": "short", "entry_price": 1.085, "sl_price": 1.09}),
        );
        assert!(executor.execute(TG_ID, &eurusd).await.success);

        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditTrade,
                    json!({"target": {"instrument": "DAX"}, "changes": {"sl_price": 18350}}),
                ),
            )
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("DAX"));

        let trade = &TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap()[0];
        assert_eq!(trade.sl_price, Some(dec!(1.09)));
    }

    #[tokio::test]
    async fn test_close_trade_by_id_sets_exit_time() {
        let (pool, executor, user_id) = setup().await;
        seed_account(&pool, user_id, "Main").await;
        assert!(executor.execute(TG_ID, &dax_trade()).await.success);
        let id = TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap()[0]
            .id;

        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditTrade,
                    json!({"target": {"id": id}, "changes": {"status": "closed", "exit_price": 18650}}),
                ),
            )
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.contains("Status: open → closed"));

        let trade = TradeRepository::find_by_id_for_user(&pool, user_id, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(dec!(18650)));
        assert!(trade.exit_time.is_some());
    }

    #[tokio::test]
    async fn test_edit_trade_of_other_user_not_found() {
        let (pool, executor, user_id) = setup().await;
        seed_account(&pool, user_id, "Main").await;
        assert!(executor.execute(TG_ID, &dax_trade()).await.success);
        let id = TradeRepository::list_open_for_user(&pool, user_id)
            .await
            .unwrap()[0]
            .id;

        UserRepository::get_or_create(&pool, 888, None).await.unwrap();
        let outcome = executor
            .execute(
                888,
                &action(
                    ActionKind::EditTrade,
                    json!({"target": {"id": id}, "changes": {"sl_price": 1}}),
                ),
            )
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains(&format!("Trade #{} not found", id)));
    }

    #[tokio::test]
    async fn test_edit_account_by_name() {
        let (pool, executor, user_id) = setup().await;
        let id = seed_account(&pool, user_id, "Swing Account").await;

        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditAccount,
                    json!({
                        "target": {"name": "swing"},
                        "changes": {"is_active": false, "currency": "usd", "broker": "  IBKR "}
                    }),
                ),
            )
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.contains("Active: Yes → No"));
        assert!(outcome.message.contains("Currency: EUR → USD"));
        assert!(outcome.message.contains("Broker: - → IBKR"));

        let account = AccountRepository::find_by_id_for_user(&pool, user_id, id)
            .await
            .unwrap()
            .unwrap();
        assert!(!account.is_active);
        assert_eq!(account.broker.as_deref(), Some("IBKR"));
    }

    #[tokio::test]
    async fn test_edit_account_not_found() {
        let (_pool, executor, _) = setup().await;
        let outcome = executor
            .execute(
                TG_ID,
                &action(
                    ActionKind::EditAccount,
                    json!({"target": {"id": 42}, "changes": {"name": "X"}}),
                ),
            )
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("Account #42 not found"));
    }

    #[tokio::test]
    async fn test_invalid_action_is_reported_not_raised() {
        let (_pool, executor, _) = setup().await;
        let outcome = executor
            .execute(TG_ID, &action(ActionKind::AddTrade, json!({})))
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("Invalid action"));
    }
}
