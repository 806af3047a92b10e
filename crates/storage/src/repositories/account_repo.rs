use common::models::{Account, AccountInsert};
use sqlx::SqliteExecutor;

use crate::db::now_ts;
use crate::row::{account_from_row, encode_decimal};

pub struct AccountRepository;

impl AccountRepository {
    pub async fn insert<'e, E>(conn: E, account: &AccountInsert) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO accounts (
                    user_id, name, broker, currency, starting_balance, current_balance,
                    is_active, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
                RETURNING id
            "#,
        )
        .bind(account.user_id)
        .bind(&account.name)
        .bind(&account.broker)
        .bind(&account.currency)
        .bind(encode_decimal(Some(account.starting_balance)))
        .bind(encode_decimal(Some(account.current_balance)))
        .bind(now_ts())
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id_for_user<'e, E>(
        conn: E,
        user_id: i64,
        account_id: i64,
    ) -> Result<Option<Account>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ? AND user_id = ?")
            .bind(account_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    /// Lowest-id active account, used as the default home for new trades.
    pub async fn find_first_active<'e, E>(
        conn: E,
        user_id: i64,
    ) -> Result<Option<Account>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT * FROM accounts WHERE user_id = ? AND is_active = 1 ORDER BY id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn find_by_name_fuzzy<'e, E>(
        conn: E,
        user_id: i64,
        needle: &str,
    ) -> Result<Option<Account>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
                SELECT * FROM accounts
                WHERE user_id = ? AND instr(lower(name), lower(?)) > 0
                ORDER BY id
                LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(needle.trim())
        .fetch_optional(conn)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn list_for_user<'e, E>(conn: E, user_id: i64) -> Result<Vec<Account>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let rows = sqlx::query("SELECT * FROM accounts WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(conn)
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    /// Writes back every mutable column of `account`.
    pub async fn update<'e, E>(conn: E, account: &Account) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
                UPDATE accounts
                SET name = ?, broker = ?, currency = ?, current_balance = ?, is_active = ?
                WHERE id = ?
            "#,
        )
        .bind(&account.name)
        .bind(&account.broker)
        .bind(&account.currency)
        .bind(encode_decimal(Some(account.current_balance)))
        .bind(account.is_active)
        .bind(account.id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
