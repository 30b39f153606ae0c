use cozy_chess::{Board, File, Move, Piece, Rank};

use crate::converters::{file_from_char, parse_square, rank_from_char};
use crate::position::legal_moves;
use crate::types::PieceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CastleSide {
    King,
    Queen,
}

/// Parse Standard Algebraic Notation (SAN) into a legal move for `board`.
///
/// Check, mate and annotation suffixes (`+`, `#`, `!`, `?`) are ignored.
/// Castling accepts both `O-O` and `0-0` spellings.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let trimmed = san
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if trimmed.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    match trimmed {
        "O-O" | "0-0" => return find_castle(board, CastleSide::King, san),
        "O-O-O" | "0-0-0" => return find_castle(board, CastleSide::Queen, san),
        _ => {}
    }

    let (body, promotion) = split_promotion(trimmed, san)?;

    let (piece, rest) = match body.chars().next() {
        Some(c) if c.is_ascii_uppercase() => {
            let kind = PieceKind::from_char(c)
                .filter(|&k| k != PieceKind::Pawn)
                .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
            (Piece::from(kind), &body[1..])
        }
        _ => (Piece::Pawn, body),
    };

    let rest: String = rest.chars().filter(|&c| c != 'x' && c != '-').collect();
    if rest.len() < 2 || !rest.is_ascii() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let (hint, target) = rest.split_at(rest.len() - 2);
    let to = parse_square(target).ok_or_else(|| SanError::InvalidSquare(target.to_string()))?;
    let (from_file, from_rank) = parse_disambiguation(hint)?;

    if promotion.is_some() && piece != Piece::Pawn {
        return Err(SanError::InvalidPromotion(san.to_string()));
    }

    let candidates: Vec<Move> = legal_moves(board)
        .into_iter()
        .filter(|mv| {
            board.piece_on(mv.from) == Some(piece)
                && mv.to == to
                && mv.promotion == promotion
                && from_file.map_or(true, |f| mv.from.file() == f)
                && from_rank.map_or(true, |r| mv.from.rank() == r)
        })
        .collect();

    match candidates.as_slice() {
        [] => Err(SanError::NoLegalMove(san.to_string())),
        [mv] => Ok(*mv),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

/// Split `e8=Q` / `e8Q` into the move body and the promotion piece.
fn split_promotion<'a>(trimmed: &'a str, san: &str) -> Result<(&'a str, Option<Piece>), SanError> {
    if let Some((body, promo)) = trimmed.split_once('=') {
        let mut promo_chars = promo.chars();
        let piece = match (promo_chars.next(), promo_chars.next()) {
            (Some(c), None) => promotion_piece(c),
            _ => None,
        };
        return piece
            .map(|p| (body, Some(p)))
            .ok_or_else(|| SanError::InvalidPromotion(san.to_string()));
    }

    match trimmed.chars().last() {
        Some(c) if c.is_ascii_uppercase() && trimmed.len() > 2 => {
            let piece =
                promotion_piece(c).ok_or_else(|| SanError::InvalidPromotion(san.to_string()))?;
            Ok((&trimmed[..trimmed.len() - 1], Some(piece)))
        }
        _ => Ok((trimmed, None)),
    }
}

fn promotion_piece(c: char) -> Option<Piece> {
    match c {
        'Q' => Some(Piece::Queen),
        'R' => Some(Piece::Rook),
        'B' => Some(Piece::Bishop),
        'N' => Some(Piece::Knight),
        _ => None,
    }
}

fn parse_disambiguation(hint: &str) -> Result<(Option<File>, Option<Rank>), SanError> {
    let mut file = None;
    let mut rank = None;
    for c in hint.chars() {
        if c.is_ascii_digit() {
            if rank.is_some() {
                return Err(SanError::InvalidFormat(hint.to_string()));
            }
            rank = Some(rank_from_char(c).ok_or(SanError::InvalidRank(c))?);
        } else {
            if file.is_some() || rank.is_some() {
                return Err(SanError::InvalidFormat(hint.to_string()));
            }
            file = Some(file_from_char(c).ok_or(SanError::InvalidFile(c))?);
        }
    }
    Ok((file, rank))
}

/// cozy-chess encodes castling as the king capturing its own rook.
fn find_castle(board: &Board, side: CastleSide, san: &str) -> Result<Move, SanError> {
    let us = board.side_to_move();
    legal_moves(board)
        .into_iter()
        .find(|mv| {
            board.piece_on(mv.from) == Some(Piece::King)
                && board.color_on(mv.to) == Some(us)
                && board.piece_on(mv.to) == Some(Piece::Rook)
                && match side {
                    CastleSide::King => mv.to.file() > mv.from.file(),
                    CastleSide::Queen => mv.to.file() < mv.from.file(),
                }
        })
        .ok_or_else(|| SanError::NoLegalMove(san.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid file: {0}")]
    InvalidFile(char),
    #[error("Invalid rank: {0}")]
    InvalidRank(char),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
