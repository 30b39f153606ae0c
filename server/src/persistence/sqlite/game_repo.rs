//! SQLite-backed repository for games.

use super::helpers::{
    decode_closing, decode_moves, decode_result, encode_closing, encode_moves, encode_result,
    map_write_error,
};
use super::SqliteStore;
use crate::model::Game;
use crate::persistence::traits::GameRepository;
use crate::persistence::PersistenceError;

type GameRow = (
    String,
    String,
    String,
    bool,
    bool,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    i64,
    Option<i64>,
);

const SELECT_GAME: &str = r#"
    SELECT id, board_state, moves, is_started, is_finished, result, reason, closing,
           white_player_id, black_player_id, created_at, finished_at
    FROM games
"#;

fn game_from_row(row: GameRow) -> Result<Game, PersistenceError> {
    let (
        id,
        board_state,
        moves,
        is_started,
        is_finished,
        result,
        reason,
        closing,
        white_player_id,
        black_player_id,
        created_at,
        finished_at,
    ) = row;

    Ok(Game {
        id,
        board_state,
        moves: decode_moves(&moves)?,
        is_started,
        is_finished,
        result: decode_result(result)?,
        reason,
        closing: decode_closing(closing)?,
        white_player_id,
        black_player_id,
        created_at: created_at as u64,
        finished_at: finished_at.map(|t| t as u64),
    })
}

impl GameRepository for SqliteStore {
    async fn create_game(&self, game: &Game) -> Result<(), PersistenceError> {
        let moves = encode_moves(&game.moves)?;
        let closing = encode_closing(game.closing.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO games
                (id, board_state, moves, is_started, is_finished, result, reason, closing,
                 white_player_id, black_player_id, created_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.id)
        .bind(&game.board_state)
        .bind(moves)
        .bind(game.is_started)
        .bind(game.is_finished)
        .bind(encode_result(game.result))
        .bind(&game.reason)
        .bind(&closing)
        .bind(&game.white_player_id)
        .bind(&game.black_player_id)
        .bind(game.created_at as i64)
        .bind(game.finished_at.map(|t| t as i64))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("game {}", game.id)))?;

        Ok(())
    }

    async fn load_game(&self, id: &str) -> Result<Option<Game>, PersistenceError> {
        let row: Option<GameRow> = sqlx::query_as(&format!("{SELECT_GAME} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(game_from_row).transpose()
    }

    async fn save_game(&self, game: &Game) -> Result<(), PersistenceError> {
        let moves = encode_moves(&game.moves)?;
        let closing = encode_closing(game.closing.as_ref())?;

        let updated = sqlx::query(
            r#"
            UPDATE games
            SET board_state = ?, moves = ?, is_started = ?, is_finished = ?,
                result = ?, reason = ?, closing = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&game.board_state)
        .bind(moves)
        .bind(game.is_started)
        .bind(game.is_finished)
        .bind(encode_result(game.result))
        .bind(&game.reason)
        .bind(&closing)
        .bind(game.finished_at.map(|t| t as i64))
        .bind(&game.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(PersistenceError::Missing(format!("game {}", game.id)));
        }
        Ok(())
    }

    async fn list_unstarted(&self) -> Result<Vec<Game>, PersistenceError> {
        let rows: Vec<GameRow> = sqlx::query_as(&format!(
            "{SELECT_GAME} WHERE is_started = 0 AND is_finished = 0 ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(game_from_row).collect()
    }
}
