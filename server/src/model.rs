//! Game and user records shared by the store, the orchestrator and the wire.

use std::fmt;
use std::str::FromStr;

use chess::{Outcome, Side, STARTING_FEN};
use rating::{GameDeltas, KFactor, Score, DEFAULT_RATING};
use serde::{Deserialize, Serialize};

/// Final result stored on a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    Interrupted,
}

/// A player's personal view of a [`GameResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Won,
    Lost,
    Draw,
    Interrupted,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown game result: {0}")]
pub struct UnknownResult(pub String);

impl GameResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhiteWin => "white_win",
            Self::BlackWin => "black_win",
            Self::Draw => "draw",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => Self::WhiteWin,
            Side::Black => Self::BlackWin,
        }
    }

    pub fn label_for(self, side: Side) -> OutcomeLabel {
        match (self, side) {
            (Self::WhiteWin, Side::White) | (Self::BlackWin, Side::Black) => OutcomeLabel::Won,
            (Self::WhiteWin, Side::Black) | (Self::BlackWin, Side::White) => OutcomeLabel::Lost,
            (Self::Draw, _) => OutcomeLabel::Draw,
            (Self::Interrupted, _) => OutcomeLabel::Interrupted,
        }
    }

    /// `None` for interrupted games, which are never rated.
    pub fn score_for(self, side: Side) -> Option<Score> {
        match self.label_for(side) {
            OutcomeLabel::Won => Some(Score::Win),
            OutcomeLabel::Lost => Some(Score::Loss),
            OutcomeLabel::Draw => Some(Score::Draw),
            OutcomeLabel::Interrupted => None,
        }
    }
}

impl From<Outcome> for GameResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::WhiteWin => Self::WhiteWin,
            Outcome::BlackWin => Self::BlackWin,
            Outcome::Draw => Self::Draw,
        }
    }
}

impl FromStr for GameResult {
    type Err = UnknownResult;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white_win" => Ok(Self::WhiteWin),
            "black_win" => Ok(Self::BlackWin),
            "draw" => Ok(Self::Draw),
            "interrupted" => Ok(Self::Interrupted),
            other => Err(UnknownResult(other.to_string())),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome fixed by the first finalize attempt. Retries replay it rather
/// than recompute from ratings that settlement may already have moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closing {
    pub result: GameResult,
    pub reason: String,
    /// Rating tables from the pre-game ratings; `None` for unrated games.
    pub deltas: Option<GameDeltas>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    /// FEN of the current position.
    pub board_state: String,
    /// Accepted move notations, in play order.
    pub moves: Vec<String>,
    pub is_started: bool,
    pub is_finished: bool,
    /// Set iff `is_finished`.
    pub result: Option<GameResult>,
    pub reason: String,
    /// Set once finalization has begun; the game accepts no more play.
    pub closing: Option<Closing>,
    pub white_player_id: String,
    pub black_player_id: String,
    pub created_at: u64,
    pub finished_at: Option<u64>,
}

impl Game {
    /// A matched game that has not been started yet.
    pub fn pending(id: impl Into<String>, white: impl Into<String>, black: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board_state: STARTING_FEN.to_string(),
            moves: Vec::new(),
            is_started: false,
            is_finished: false,
            result: None,
            reason: String::new(),
            closing: None,
            white_player_id: white.into(),
            black_player_id: black.into(),
            created_at: crate::persistence::now_timestamp(),
            finished_at: None,
        }
    }

    /// Finished, or finalization has begun.
    pub fn has_ended(&self) -> bool {
        self.is_finished || self.closing.is_some()
    }

    pub fn in_play(&self) -> bool {
        self.is_started && !self.has_ended()
    }

    /// The side `user_id` plays, or `None` for observers.
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.white_player_id == user_id {
            Some(Side::White)
        } else if self.black_player_id == user_id {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn player_id(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_player_id,
            Side::Black => &self.black_player_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub rating: f64,
    pub k_factor: KFactor,
    pub games_played: u32,
    pub cur_game_id: Option<String>,
    /// Address of the user's live channel, if any.
    pub sid: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            login: login.into(),
            rating: DEFAULT_RATING,
            k_factor: KFactor::default(),
            games_played: 0,
            cur_game_id: None,
            sid: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_k_factor(mut self, k_factor: KFactor) -> Self {
        self.k_factor = k_factor;
        self
    }
}
