//! SQLite-backed repository for users.

use super::helpers::{decode_k_factor, map_write_error};
use super::SqliteStore;
use crate::model::User;
use crate::persistence::traits::UserRepository;
use crate::persistence::PersistenceError;

type UserRow = (String, String, f64, i64, i64, Option<String>, Option<String>);

const SELECT_USER: &str = r#"
    SELECT id, login, rating, k_factor, games_played, cur_game_id, sid
    FROM users
"#;

fn user_from_row(row: UserRow) -> Result<User, PersistenceError> {
    let (id, login, rating, k_factor, games_played, cur_game_id, sid) = row;
    Ok(User {
        id,
        login,
        rating,
        k_factor: decode_k_factor(k_factor)?,
        games_played: games_played as u32,
        cur_game_id,
        sid,
    })
}

impl UserRepository for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, login, rating, k_factor, games_played, cur_game_id, sid)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.login)
        .bind(user.rating)
        .bind(i64::from(user.k_factor.value()))
        .bind(i64::from(user.games_played))
        .bind(&user.cur_game_id)
        .bind(&user.sid)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("user {}", user.login)))?;

        Ok(())
    }

    async fn load_user(&self, id: &str) -> Result<Option<User>, PersistenceError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, PersistenceError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE login = ?"))
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn save_user(&self, user: &User) -> Result<(), PersistenceError> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET login = ?, rating = ?, k_factor = ?, games_played = ?, cur_game_id = ?, sid = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.login)
        .bind(user.rating)
        .bind(i64::from(user.k_factor.value()))
        .bind(i64::from(user.games_played))
        .bind(&user.cur_game_id)
        .bind(&user.sid)
        .bind(&user.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(PersistenceError::Missing(format!("user {}", user.id)));
        }
        Ok(())
    }
}
