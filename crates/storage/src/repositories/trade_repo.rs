use common::models::{Trade, TradeInsert, TradeStatus};
use sqlx::SqliteExecutor;

use crate::row::{encode_decimal, trade_from_row};

pub struct TradeRepository;

impl TradeRepository {
    pub async fn insert<'e, E>(conn: E, trade: &TradeInsert) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO trades (
                    account_id, instrument, direction, entry_price, exit_price, sl_price,
                    tp_price, lot_size, status, notes, entry_time
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
            "#,
        )
        .bind(trade.account_id)
        .bind(&trade.instrument)
        .bind(trade.direction.as_str())
        .bind(encode_decimal(Some(trade.entry_price)))
        .bind(encode_decimal(trade.exit_price))
        .bind(encode_decimal(trade.sl_price))
        .bind(encode_decimal(trade.tp_price))
        .bind(encode_decimal(Some(trade.lot_size)))
        .bind(TradeStatus::Open.as_str())
        .bind(&trade.notes)
        .bind(trade.entry_time)
        .fetch_one(conn)
        .await
    }

    /// Looks a trade up by id, but only among the accounts owned by `user_id`.
    pub async fn find_by_id_for_user<'e, E>(
        conn: E,
        user_id: i64,
        trade_id: i64,
    ) -> Result<Option<Trade>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
                SELECT t.* FROM trades t
                JOIN accounts a ON a.id = t.account_id
                WHERE t.id = ? AND a.user_id = ?
            "#,
        )
        .bind(trade_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        row.as_ref().map(trade_from_row).transpose()
    }

    /// Case-insensitive substring match on the instrument among the user's open
    /// trades. The most recently opened trade wins.
    pub async fn find_open_by_instrument<'e, E>(
        conn: E,
        user_id: i64,
        needle: &str,
    ) -> Result<Option<Trade>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
                SELECT t.* FROM trades t
                JOIN accounts a ON a.id = t.account_id
                WHERE a.user_id = ?
                  AND t.status = 'open'
                  AND instr(lower(t.instrument), lower(?)) > 0
                ORDER BY t.entry_time DESC, t.id DESC
                LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(needle.trim())
        .fetch_optional(conn)
        .await?;

        row.as_ref().map(trade_from_row).transpose()
    }

    pub async fn list_open_for_user<'e, E>(
        conn: E,
        user_id: i64,
    ) -> Result<Vec<Trade>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let rows = sqlx::query(
            r#"
                SELECT t.* FROM trades t
                JOIN accounts a ON a.id = t.account_id
                WHERE a.user_id = ? AND t.status = 'open'
                ORDER BY t.entry_time DESC, t.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        rows.iter().map(trade_from_row).collect()
    }

    /// Writes back every mutable column of `trade`.
    pub async fn update<'e, E>(conn: E, trade: &Trade) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
                UPDATE trades
                SET entry_price = ?, exit_price = ?, sl_price = ?, tp_price = ?,
                    lot_size = ?, status = ?, notes = ?, exit_time = ?
                WHERE id = ?
            "#,
        )
        .bind(encode_decimal(Some(trade.entry_price)))
        .bind(encode_decimal(trade.exit_price))
        .bind(encode_decimal(trade.sl_price))
        .bind(encode_decimal(trade.tp_price))
        .bind(encode_decimal(Some(trade.lot_size)))
        .bind(trade.status.as_str())
        .bind(&trade.notes)
        .bind(trade.exit_time)
        .bind(trade.id)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::repositories::{AccountRepository, UserRepository};
    use common::models::{AccountInsert, Direction};
    use rust_decimal_macros::dec;
    use sqlx::SqlitePool;

    async fn seed(pool: &SqlitePool) -> (i64, i64) {
        let user = UserRepository::get_or_create(pool, 555, Some("trader"))
            .await
            .unwrap();
        let account_id = AccountRepository::insert(
            pool,
            &AccountInsert {
                user_id: user.id,
                name: "Main".to_string(),
                broker: None,
                currency: "USD".to_string(),
                starting_balance: dec!(10000),
                current_balance: dec!(10000),
            },
        )
        .await
        .unwrap();
        (user.id, account_id)
    }

    fn new_trade(account_id: i64, instrument: &str, entry_time: i64) -> TradeInsert {
        TradeInsert {
            account_id,
            instrument: instrument.to_string(),
            direction: Direction::Long,
            entry_price: dec!(18500),
            exit_price: None,
            sl_price: Some(dec!(18400)),
            tp_price: Some(dec!(18700)),
            lot_size: dec!(1.0),
            notes: None,
            entry_time,
        }
    }

    #[tokio::test]
    async fn test_insert_round_trip() {
        let pool = open_in_memory().await.unwrap();
        let (user_id, account_id) = seed(&pool).await;

        let id = TradeRepository::insert(&pool, &new_trade(account_id, "DAX", 100))
            .await
            .unwrap();
        let trade = TradeRepository::find_by_id_for_user(&pool, user_id, id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(trade.instrument, "DAX");
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.sl_price, Some(dec!(18400)));
        assert_eq!(trade.lot_size, dec!(1));
    }

    #[tokio::test]
    async fn test_fuzzy_instrument_prefers_latest_open() {
        let pool = open_in_memory().await.unwrap();
        let (user_id, account_id) = seed(&pool).await;

        TradeRepository::insert(&pool, &new_trade(account_id, "DAX40", 100))
            .await
            .unwrap();
        let latest = TradeRepository::insert(&pool, &new_trade(account_id, "dax", 200))
            .await
            .unwrap();

        let found = TradeRepository::find_open_by_instrument(&pool, user_id, "DAX")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, latest);
    }

    #[tokio::test]
    async fn test_fuzzy_instrument_ignores_closed() {
        let pool = open_in_memory().await.unwrap();
        let (user_id, account_id) = seed(&pool).await;

        let id = TradeRepository::insert(&pool, &new_trade(account_id, "EURUSD", 100))
            .await
            .unwrap();
        let mut trade = TradeRepository::find_by_id_for_user(&pool, user_id, id)
            .await
            .unwrap()
            .unwrap();
        trade.status = TradeStatus::Closed;
        trade.exit_price = Some(dec!(1.0950));
        TradeRepository::update(&pool, &trade).await.unwrap();

        let found = TradeRepository::find_open_by_instrument(&pool, user_id, "eur")
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(
            TradeRepository::list_open_for_user(&pool, user_id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
