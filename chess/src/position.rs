//! Move validation over serialized positions.
//!
//! Every entry point takes a FEN string and never mutates caller state. A
//! corrupt position is a [`FenError`]; an illegal move is an ordinary
//! [`MoveVerdict::Illegal`] value.

use cozy_chess::{Board, Move, Piece, Square};

use crate::fen::{format_fen_with_clock, halfmove_clock, parse_fen, FenError};
use crate::san::{parse_san, SanError};
use crate::types::{Outcome, Side, Terminal, TerminalReason};
use crate::uci::{looks_like_uci, parse_uci};

/// Halfmoves without a capture or pawn move after which the game is drawn
/// without either player claiming it.
const SEVENTY_FIVE_MOVE_HALFMOVES: u16 = 150;

/// Position reached by a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub board_state: String,
    /// Side to move in the new position.
    pub turn: Side,
    pub terminal: Option<Terminal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveVerdict {
    Legal(AppliedMove),
    Illegal(SanError),
}

/// Get all legal moves for the position
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

/// Resolve SAN or, failing that shape, UCI notation to a legal move.
pub fn parse_move(board: &Board, notation: &str) -> Result<Move, SanError> {
    let trimmed = notation.trim();
    if looks_like_uci(trimmed) {
        if let Ok(mv) = parse_uci(board, trimmed) {
            return Ok(mv);
        }
    }
    parse_san(board, trimmed)
}

/// Apply `notation` to `board_state`.
pub fn apply_move(board_state: &str, notation: &str) -> Result<MoveVerdict, FenError> {
    let mut board = parse_fen(board_state)?;
    let clock = halfmove_clock(board_state)?;

    let mv = match parse_move(&board, notation) {
        Ok(mv) => mv,
        Err(e) => return Ok(MoveVerdict::Illegal(e)),
    };
    let resets_clock = board.piece_on(mv.from) == Some(Piece::Pawn)
        || board.color_on(mv.to) == Some(!board.side_to_move());
    if board.try_play(mv).is_err() {
        return Ok(MoveVerdict::Illegal(SanError::NoLegalMove(
            notation.to_string(),
        )));
    }

    let clock = if resets_clock { 0 } else { clock.saturating_add(1) };
    Ok(MoveVerdict::Legal(AppliedMove {
        board_state: format_fen_with_clock(&board, clock),
        turn: board.side_to_move().into(),
        terminal: terminal_of(&board, clock),
    }))
}

/// Whose move it is in `board_state`.
pub fn turn_owner(board_state: &str) -> Result<Side, FenError> {
    Ok(parse_fen(board_state)?.side_to_move().into())
}

/// `None` while the game continues.
pub fn terminal_result(board_state: &str) -> Result<Option<Terminal>, FenError> {
    let board = parse_fen(board_state)?;
    Ok(terminal_of(&board, halfmove_clock(board_state)?))
}

fn terminal_of(board: &Board, halfmove_clock: u16) -> Option<Terminal> {
    if legal_moves(board).is_empty() {
        return Some(if board.checkers().is_empty() {
            Terminal {
                outcome: Outcome::Draw,
                reason: TerminalReason::Stalemate,
            }
        } else {
            let mover: Side = board.side_to_move().into();
            Terminal {
                outcome: Outcome::win_for(mover.opponent()),
                reason: TerminalReason::Checkmate,
            }
        });
    }

    if is_insufficient_material(board) {
        return Some(Terminal {
            outcome: Outcome::Draw,
            reason: TerminalReason::InsufficientMaterial,
        });
    }

    if halfmove_clock >= SEVENTY_FIVE_MOVE_HALFMOVES {
        return Some(Terminal {
            outcome: Outcome::Draw,
            reason: TerminalReason::SeventyFiveMoveRule,
        });
    }

    None
}

/// Neither side can possibly deliver mate: bare kings, a single minor piece,
/// or only bishops that all stand on one square colour.
fn is_insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }

    let knights = board.pieces(Piece::Knight);
    let bishops = board.pieces(Piece::Bishop);
    if knights.len() + bishops.len() <= 1 {
        return true;
    }
    if !knights.is_empty() {
        return false;
    }

    let light = bishops.into_iter().filter(|sq| is_light_square(*sq)).count();
    light == 0 || light == bishops.len() as usize
}

fn is_light_square(sq: Square) -> bool {
    (sq.file() as usize + sq.rank() as usize) % 2 == 1
}
