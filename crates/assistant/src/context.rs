use std::fmt::Write;

use common::models::{Account, Trade};
use sqlx::SqlitePool;
use storage::repositories::{AccountRepository, TradeRepository, UserRepository};
use tracing::warn;

use crate::coerce::fmt_decimal;

/// Renders the user's journal as plain text for the language model.
#[derive(Clone)]
pub struct ContextBuilder {
    pool: SqlitePool,
}

impl ContextBuilder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store failures are logged and yield an empty context.
    pub async fn build(&self, telegram_id: i64) -> String {
        match self.load(telegram_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to build chat context for user {}: {}", telegram_id, e);
                String::new()
            }
        }
    }

    async fn load(&self, telegram_id: i64) -> Result<String, sqlx::Error> {
        let Some(user) = UserRepository::find_by_telegram_id(&self.pool, telegram_id).await? else {
            return Ok(String::new());
        };

        let accounts = AccountRepository::list_for_user(&self.pool, user.id).await?;
        let trades = TradeRepository::list_open_for_user(&self.pool, user.id).await?;
        Ok(render(&accounts, &trades))
    }
}

fn render(accounts: &[Account], trades: &[Trade]) -> String {
    let mut out = String::from("Accounts:\n");
    if accounts.is_empty() {
        out.push_str("- none\n");
    }
    for a in accounts {
        let _ = writeln!(
            out,
            "- #{} {}: {} {} ({})",
            a.id,
            a.name,
            fmt_decimal(a.current_balance),
            a.currency,
            if a.is_active { "active" } else { "inactive" }
        );
    }

    out.push_str("Open trades:\n");
    if trades.is_empty() {
        out.push_str("- none\n");
    }
    for t in trades {
        let _ = write!(
            out,
            "- #{} {} {} entry {}",
            t.id,
            t.instrument,
            t.direction,
            fmt_decimal(t.entry_price)
        );
        if let Some(sl) = t.sl_price {
            let _ = write!(out, ", SL {}", fmt_decimal(sl));
        }
        if let Some(tp) = t.tp_price {
            let _ = write!(out, ", TP {}", fmt_decimal(tp));
        }
        let _ = writeln!(out, ", size {}", fmt_decimal(t.lot_size));
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{AccountInsert, Direction, TradeInsert};
    use rust_decimal_macros::dec;
    use storage::db::open_in_memory;

    #[tokio::test]
    async fn test_unknown_user_gets_empty_context() {
        let pool = open_in_memory().await.unwrap();
        let builder = ContextBuilder::new(pool);
        assert_eq!(builder.build(1).await, "");
    }

    #[tokio::test]
    async fn test_lists_accounts_and_open_trades() {
        let pool = open_in_memory().await.unwrap();
        let user = UserRepository::get_or_create(&pool, 42, None).await.unwrap();
        let account_id = AccountRepository::insert(
            &pool,
            &AccountInsert {
                user_id: user.id,
                name: "Main".to_string(),
                broker: None,
                currency: "EUR".to_string(),
                starting_balance: dec!(10000.00),
                current_balance: dec!(10250.50),
            },
        )
        .await
        .unwrap();
        TradeRepository::insert(
            &pool,
            &TradeInsert {
                account_id,
                instrument: "DAX".to_string(),
                direction: Direction::Long,
                entry_price: dec!(18500),
                exit_price: None,
                sl_price: Some(dec!(18400)),
                tp_price: None,
                lot_size: dec!(0.5),
                notes: None,
                entry_time: 1_700_000_000,
            },
        )
        .await
        .unwrap();

        let context = ContextBuilder::new(pool).build(42).await;
        assert!(context.contains("- #1 Main: 10250.5 EUR (active)"), "{}", context);
        assert!(context.contains("DAX LONG entry 18500, SL 18400, size 0.5"), "{}", context);
        assert!(!context.contains("TP"));
    }

    #[test]
    fn test_render_empty_journal() {
        assert_eq!(render(&[], &[]), "Accounts:\n- none\nOpen trades:\n- none");
    }
}
