use common::models::User;
use sqlx::SqliteExecutor;

use crate::db::now_ts;
use crate::row::user_from_row;

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_telegram_id<'e, E>(
        conn: E,
        telegram_id: i64,
    ) -> Result<Option<User>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query("SELECT * FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(conn)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Registers the user on first contact. A known user keeps its row; only
    /// the username is refreshed.
    pub async fn get_or_create<'e, E>(
        conn: E,
        telegram_id: i64,
        username: Option<&str>,
    ) -> Result<User, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
                INSERT INTO users (telegram_id, username, created_at)
                VALUES (?, ?, ?)
                ON CONFLICT(telegram_id) DO UPDATE SET username = excluded.username
                RETURNING *
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .bind(now_ts())
        .fetch_one(conn)
        .await?;

        user_from_row(&row)
    }
}
