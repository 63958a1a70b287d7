//! Pseudo-legal move generation and the attack oracle built on top of it.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Coord, PieceKind, Player};
use crate::rules::Portals;

pub const ORTHOGONAL: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
pub const DIAGONAL: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
pub const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveKind {
    Normal,
    /// Diagonal hop over an occupied neighbour. The hopped piece stays.
    Jump { over: Coord },
    /// Portal to portal.
    Teleport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
    pub kind: MoveKind,
}

impl Move {
    pub fn normal(from: Coord, to: Coord) -> Self {
        Self {
            from,
            to,
            kind: MoveKind::Normal,
        }
    }
}

/// Destination check shared by every piece: on the board and not held by a
/// friend.
fn open_for(board: &Board, owner: Player, to: Coord) -> bool {
    board.in_bounds(to) && board.get(to).map_or(true, |p| p.owner != owner)
}

fn steps(board: &Board, from: Coord, owner: Player, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, dc) in dirs {
        if let Some(to) = from.offset(dr, dc) {
            if open_for(board, owner, to) {
                out.push(Move::normal(from, to));
            }
        }
    }
}

fn slides(board: &Board, from: Coord, owner: Player, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, dc) in dirs {
        let mut cursor = from;
        while let Some(to) = cursor.offset(dr, dc).filter(|c| board.in_bounds(*c)) {
            match board.get(to) {
                None => out.push(Move::normal(from, to)),
                Some(occupant) => {
                    if occupant.owner != owner {
                        out.push(Move::normal(from, to));
                    }
                    break;
                }
            }
            cursor = to;
        }
    }
}

fn jumps(board: &Board, from: Coord, out: &mut Vec<Move>) {
    for &(dr, dc) in &DIAGONAL {
        let (Some(over), Some(to)) = (from.offset(dr, dc), from.offset(dr * 2, dc * 2)) else {
            continue;
        };
        if board.get(over).is_some() && board.is_empty(to) {
            out.push(Move {
                from,
                to,
                kind: MoveKind::Jump { over },
            });
        }
    }
}

/// Every move the piece on `from` could make, ignoring whose turn it is and
/// ignoring Jarl safety. Empty when `from` holds no piece.
pub fn raw_moves(board: &Board, from: Coord, portals: Option<&Portals>) -> Vec<Move> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    let owner = piece.owner;
    let mut moves = Vec::new();
    match piece.kind {
        PieceKind::Jarl => steps(board, from, owner, &ALL_DIRECTIONS, &mut moves),
        PieceKind::Hirdman => steps(board, from, owner, &ORTHOGONAL, &mut moves),
        PieceKind::Raven => {
            slides(board, from, owner, &DIAGONAL, &mut moves);
            jumps(board, from, &mut moves);
        }
        PieceKind::RookRaven => slides(board, from, owner, &ORTHOGONAL, &mut moves),
    }
    if let Some(to) = portals.and_then(|p| p.partner(from)) {
        if open_for(board, owner, to) {
            moves.push(Move {
                from,
                to,
                kind: MoveKind::Teleport,
            });
        }
    }
    moves
}

/// True when any of `attacker`'s pieces has a raw move landing on `target`.
/// Works on raw moves only, so it never recurses into the legality filter.
pub fn is_square_attacked(
    board: &Board,
    target: Coord,
    attacker: Player,
    portals: Option<&Portals>,
) -> bool {
    board
        .pieces()
        .filter(|p| p.piece.owner == attacker)
        .any(|p| {
            raw_moves(board, p.at, portals)
                .iter()
                .any(|mv| mv.to == target)
        })
}
