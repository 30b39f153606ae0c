pub mod converters;
pub mod fen;
pub mod position;
pub mod san;
pub mod types;
pub mod uci;

pub use fen::{format_fen, halfmove_clock, parse_fen, FenError, STARTING_FEN};
pub use position::{
    apply_move, legal_moves, parse_move, terminal_result, turn_owner, AppliedMove, MoveVerdict,
};
pub use san::{parse_san, SanError};
pub use types::{Outcome, PieceKind, Side, Terminal, TerminalReason};
pub use uci::{convert_uci_castling_to_cozy, parse_uci};
