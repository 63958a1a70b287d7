//! Core Jarltafl rules engine.
//! Shared by the room server and clients so both sides compute identical
//! transitions.

pub mod board;
pub mod error;
pub mod executor;
pub mod legality;
pub mod movegen;
pub mod rules;
pub mod session;
pub mod state;
pub mod win;
pub mod wire;

pub use board::{
    coord_to_notation, notation_to_coord, Board, Coord, Piece, PieceId, PieceIdGen, PieceKind,
    PlacedPiece, Player,
};
pub use error::EngineError;
pub use executor::CapturedPiles;
pub use legality::legal_moves_on;
pub use movegen::{is_square_attacked, raw_moves, Move, MoveKind};
pub use rules::{Portals, Ruleset, Thrones, VariantName};
pub use session::{Outcome, Selection, Session};
pub use state::{
    all_legal_moves, apply_action, apply_move, begin_reinforcement, cancel_reinforcement,
    forfeit, legal_moves, place_reinforcement, resolve_promotion, Action, Awaiting, GamePhase,
    GameState, PlayerNames,
};
pub use win::{evaluate_win, WinReason};
pub use wire::{deserialize_state, serialize_state, SerializedBoardEntry, SerializedState};
