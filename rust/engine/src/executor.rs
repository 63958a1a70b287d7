//! Applies moves, promotions and reinforcement placements to a board.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Coord, Piece, PieceId, PieceKind, PlacedPiece, Player};
use crate::error::EngineError;
use crate::movegen::Move;
use crate::rules::Ruleset;

/// Pieces each side has lost. A captured piece is filed under its own owner
/// and only that owner may bring it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPiles {
    pub north: Vec<Piece>,
    pub south: Vec<Piece>,
}

impl CapturedPiles {
    pub fn pile(&self, owner: Player) -> &[Piece] {
        match owner {
            Player::North => &self.north,
            Player::South => &self.south,
        }
    }

    fn pile_mut(&mut self, owner: Player) -> &mut Vec<Piece> {
        match owner {
            Player::North => &mut self.north,
            Player::South => &mut self.south,
        }
    }

    pub fn file(&mut self, piece: Piece) {
        self.pile_mut(piece.owner).push(piece);
    }

    pub fn find(&self, owner: Player, id: PieceId) -> Option<Piece> {
        self.pile(owner).iter().copied().find(|p| p.id == id)
    }

    /// Remove `id` from `owner`'s pile only.
    pub fn take(&mut self, owner: Player, id: PieceId) -> Option<Piece> {
        let pile = self.pile_mut(owner);
        let idx = pile.iter().position(|p| p.id == id)?;
        Some(pile.remove(idx))
    }
}

/// Result of executing one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub board: Board,
    pub moved: PlacedPiece,
    pub captured: Option<Piece>,
    /// A Raven landed in the opponent's promotion zone; the mover still owes
    /// a promote-or-decline decision before the turn ends.
    pub promotion_pending: bool,
}

/// Move the piece on `mv.from` to `mv.to`. The move is expected to come from
/// the generator; a friendly destination is refused rather than overwritten.
pub fn execute_move(board: &Board, rules: &Ruleset, mv: Move) -> Result<Execution, EngineError> {
    let piece = board.get(mv.from).ok_or(EngineError::NoPiece)?;
    if board.get(mv.to).is_some_and(|p| p.owner == piece.owner) || !board.in_bounds(mv.to) {
        return Err(EngineError::IllegalMove);
    }
    let mut next = board.clone();
    next.take(mv.from);
    // Jumps leave the hopped piece alone; teleports and normal moves capture
    // whatever enemy stands on the destination.
    let captured = next.place(mv.to, piece)?;
    let promotion_pending = rules.promotion
        && piece.kind == PieceKind::Raven
        && rules.in_promotion_zone(piece.owner, mv.to);
    Ok(Execution {
        board: next,
        moved: PlacedPiece { piece, at: mv.to },
        captured,
        promotion_pending,
    })
}

/// Turn the Raven on `at` into a Rook Raven.
pub fn promote(board: &Board, at: Coord) -> Result<(Board, PlacedPiece), EngineError> {
    let mut piece = board.get(at).ok_or(EngineError::NoPiece)?;
    piece.kind = PieceKind::RookRaven;
    let mut next = board.clone();
    next.place(at, piece)?;
    Ok((next, PlacedPiece { piece, at }))
}

/// Drop `piece` back onto an empty square under its original owner.
pub fn place_piece(board: &Board, piece: Piece, at: Coord) -> Result<Board, EngineError> {
    if !board.in_bounds(at) {
        return Err(EngineError::OutOfBounds(board.notation(at)));
    }
    if board.get(at).is_some() {
        return Err(EngineError::SquareOccupied);
    }
    let mut next = board.clone();
    next.place(at, piece)?;
    Ok(next)
}
