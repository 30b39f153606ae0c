//! UCI (Universal Chess Interface) coordinate notation

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::parse_square;
use crate::position::legal_moves;
use crate::san::SanError;

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The converted move is returned only if it is among `legal_moves`.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let target_square = match (mv.from.rank(), mv.to.file()) {
            (Rank::First, File::G) => Square::new(File::H, Rank::First),
            (Rank::First, File::C) => Square::new(File::A, Rank::First),
            (Rank::Eighth, File::G) => Square::new(File::H, Rank::Eighth),
            (Rank::Eighth, File::C) => Square::new(File::A, Rank::Eighth),
            _ => return mv,
        };

        let converted = Move {
            from: mv.from,
            to: target_square,
            promotion: None,
        };

        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// Whether `s` has the shape of a coordinate move (`e2e4`, `e7e8q`).
pub fn looks_like_uci(s: &str) -> bool {
    let bytes = s.as_bytes();
    let squares_ok = bytes.len() >= 4
        && matches!(bytes[0], b'a'..=b'h')
        && matches!(bytes[1], b'1'..=b'8')
        && matches!(bytes[2], b'a'..=b'h')
        && matches!(bytes[3], b'1'..=b'8');
    match bytes.len() {
        4 => squares_ok,
        5 => squares_ok && matches!(bytes[4], b'q' | b'r' | b'b' | b'n'),
        _ => false,
    }
}

/// Parse a coordinate move and check it against the legal moves of `board`.
pub fn parse_uci(board: &Board, uci: &str) -> Result<Move, SanError> {
    let text = uci.trim();
    if !looks_like_uci(text) {
        return Err(SanError::InvalidFormat(uci.to_string()));
    }

    let from = parse_square(&text[0..2]).ok_or_else(|| SanError::InvalidSquare(text[0..2].to_string()))?;
    let to = parse_square(&text[2..4]).ok_or_else(|| SanError::InvalidSquare(text[2..4].to_string()))?;
    let promotion = match text.as_bytes().get(4) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return Err(SanError::InvalidPromotion(uci.to_string())),
    };

    let legal = legal_moves(board);
    let mv = convert_uci_castling_to_cozy(Move { from, to, promotion }, &legal);
    if legal.contains(&mv) {
        Ok(mv)
    } else {
        Err(SanError::NoLegalMove(uci.to_string()))
    }
}
