use serde::{Deserialize, Serialize};

use crate::board::{Board, PieceKind, PlacedPiece, Player};
use crate::rules::Ruleset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// The mover's Jarl stands on its goal throne.
    Throne,
    /// The opponent's Jarl is gone.
    Decapitation,
    /// The opponent left the game.
    Forfeit,
}

/// Decide whether `mover` has just won. `last` is the piece that moved or was
/// placed this turn. Pure, so calling it twice gives the same answer.
pub fn evaluate_win(
    board: &Board,
    rules: &Ruleset,
    mover: Player,
    last: Option<PlacedPiece>,
) -> Option<WinReason> {
    if let Some(last) = last {
        if last.piece.kind == PieceKind::Jarl
            && last.piece.owner == mover
            && last.at == rules.goal_throne(mover)
        {
            return Some(WinReason::Throne);
        }
    }
    if board.find_kind(mover.opponent(), PieceKind::Jarl).is_none() {
        return Some(WinReason::Decapitation);
    }
    None
}
