use thiserror::Error;

use crate::board::PieceId;

/// Every engine failure is recoverable: the input state is left untouched and
/// the caller only has to surface the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid coordinate token: {0}")]
    InvalidCoord(String),
    #[error("out of bounds coordinate: {0}")]
    OutOfBounds(String),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    #[error("game already finished")]
    Finished,
    #[error("no piece at origin")]
    NoPiece,
    #[error("not this piece's turn")]
    WrongTurn,
    #[error("illegal move target")]
    IllegalMove,
    #[error("a promotion or reinforcement decision is pending")]
    DecisionPending,
    #[error("no promotion decision is pending")]
    NoPendingPromotion,
    #[error("no reinforcement placement is pending")]
    NoPendingReinforcement,
    #[error("reinforcements are not enabled in this ruleset")]
    ReinforcementDisabled,
    #[error("piece {0} is not in the current player's captured pile")]
    NotInPile(PieceId),
    #[error("square is occupied")]
    SquareOccupied,
}
