//! Character-level conversions between notation and cozy-chess coordinates.

use cozy_chess::{File, Rank, Square};

pub fn file_from_char(c: char) -> Option<File> {
    match c {
        'a'..='h' => File::try_index((c as u8 - b'a') as usize),
        _ => None,
    }
}

pub fn rank_from_char(c: char) -> Option<Rank> {
    match c {
        '1'..='8' => Rank::try_index((c as u8 - b'1') as usize),
        _ => None,
    }
}

/// Parse a two-character square such as `e4`.
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = file_from_char(chars.next()?)?;
    let rank = rank_from_char(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some(Square::new(file, rank))
}
