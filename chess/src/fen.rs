use cozy_chess::Board;

/// The standard initial position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Highest halfmove clock the board type accepts. Longer quiet stretches are
/// tracked in the FEN text itself.
const BOARD_CLOCK_LIMIT: u16 = 100;

fn fields(fen: &str) -> Result<Vec<&str>, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() != 6 {
        return Err(FenError::InvalidFormat);
    }
    Ok(parts)
}

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let capped = BOARD_CLOCK_LIMIT.to_string();
    let mut parts = fields(fen)?;
    let clock = parse_clock(parts[4])?;
    if clock > BOARD_CLOCK_LIMIT {
        parts[4] = &capped;
    }
    parts
        .join(" ")
        .parse()
        .map_err(|_| FenError::InvalidBoardLayout)
}

/// Halfmoves since the last capture or pawn move, as written in the FEN.
pub fn halfmove_clock(fen: &str) -> Result<u16, FenError> {
    parse_clock(fields(fen)?[4])
}

fn parse_clock(field: &str) -> Result<u16, FenError> {
    field.parse().map_err(|_| FenError::InvalidFormat)
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// Format a Board with an explicit halfmove clock, which may exceed what the
/// board itself can hold.
pub fn format_fen_with_clock(board: &Board, halfmove_clock: u16) -> String {
    let fen = format_fen(board);
    let clock = halfmove_clock.to_string();
    let mut parts: Vec<&str> = fen.split(' ').collect();
    if let Some(field) = parts.get_mut(4) {
        *field = &clock;
    }
    parts.join(" ")
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout")]
    InvalidBoardLayout,
}
