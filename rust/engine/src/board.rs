//! Board model: coordinates, pieces and the square grid.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

pub const FILES: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Zero-based `(row, col)`; row 0 is North's back rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Step by a signed offset, `None` when the result would be negative.
    /// Upper bounds are the board's business.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Coord> {
        let row = self.row as i16 + dr as i16;
        let col = self.col as i16 + dc as i16;
        if row < 0 || col < 0 || row > u8::MAX as i16 || col > u8::MAX as i16 {
            return None;
        }
        Some(Coord::new(row as u8, col as u8))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    North,
    South,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::North => Player::South,
            Player::South => Player::North,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::North => f.write_str("North"),
            Player::South => f.write_str("South"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Jarl,
    Hirdman,
    Raven,
    RookRaven,
}

impl PieceKind {
    pub fn symbol(self) -> char {
        match self {
            PieceKind::Jarl => 'ᛟ',
            PieceKind::Hirdman => 'ᚼ',
            PieceKind::Raven => 'ᛉ',
            PieceKind::RookRaven => 'ᚢ',
        }
    }
}

/// Identity of a piece for the whole game, including while it sits in a
/// captured pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(pub u32);

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Mints piece ids for one game. Each board construction owns its own
/// generator, so two games never share id space.
#[derive(Debug, Default)]
pub struct PieceIdGen {
    next: u32,
}

impl PieceIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self) -> PieceId {
        let id = PieceId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub owner: Player,
    pub kind: PieceKind,
}

/// A piece together with the square it currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedPiece {
    pub piece: Piece,
    pub at: Coord,
}

/// Rectangular grid of squares, each holding at most one piece. A piece's
/// position is the index of the cell that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: u8,
    cols: u8,
    squares: Vec<Option<Piece>>,
}

impl Board {
    pub fn empty(rows: u8, cols: u8) -> Self {
        Self {
            rows,
            cols,
            squares: vec![None; rows as usize * cols as usize],
        }
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn in_bounds(&self, at: Coord) -> bool {
        at.row < self.rows && at.col < self.cols
    }

    fn index(&self, at: Coord) -> Option<usize> {
        self.in_bounds(at)
            .then(|| at.row as usize * self.cols as usize + at.col as usize)
    }

    pub fn get(&self, at: Coord) -> Option<Piece> {
        self.index(at)
            .and_then(|i| self.squares.get(i).copied().flatten())
    }

    pub fn is_empty(&self, at: Coord) -> bool {
        self.in_bounds(at) && self.get(at).is_none()
    }

    /// Put `piece` on `at`, returning whatever was there.
    pub fn place(&mut self, at: Coord, piece: Piece) -> Result<Option<Piece>, EngineError> {
        let square = self
            .index(at)
            .and_then(|i| self.squares.get_mut(i))
            .ok_or_else(|| EngineError::OutOfBounds(format!("{at:?}")))?;
        Ok(square.replace(piece))
    }

    pub fn take(&mut self, at: Coord) -> Option<Piece> {
        let i = self.index(at)?;
        self.squares.get_mut(i)?.take()
    }

    pub fn pieces(&self) -> impl Iterator<Item = PlacedPiece> + '_ {
        let cols = self.cols as usize;
        self.squares.iter().enumerate().filter_map(move |(i, sq)| {
            sq.map(|piece| PlacedPiece {
                piece,
                at: Coord::new((i / cols) as u8, (i % cols) as u8),
            })
        })
    }

    pub fn find(&self, id: PieceId) -> Option<PlacedPiece> {
        self.pieces().find(|p| p.piece.id == id)
    }

    pub fn find_kind(&self, owner: Player, kind: PieceKind) -> Option<Coord> {
        self.pieces()
            .find(|p| p.piece.owner == owner && p.piece.kind == kind)
            .map(|p| p.at)
    }

    pub fn empty_squares(&self) -> impl Iterator<Item = Coord> + '_ {
        let cols = self.cols as usize;
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, sq)| sq.is_none())
            .map(move |(i, _)| Coord::new((i / cols) as u8, (i % cols) as u8))
    }

    /// Column letter and `rows - row` rank, so row 0 shows as the highest rank.
    pub fn notation(&self, at: Coord) -> String {
        coord_to_notation(at, self.rows)
    }
}

pub fn coord_to_notation(at: Coord, rows: u8) -> String {
    let file = FILES.chars().nth(at.col as usize).unwrap_or('?');
    format!("{file}{}", rows as i32 - at.row as i32)
}

pub fn notation_to_coord(token: &str, rows: u8, cols: u8) -> Result<Coord, EngineError> {
    let mut chars = token.trim().chars();
    let file_char = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| EngineError::InvalidCoord(token.to_string()))?;
    let col = FILES
        .chars()
        .position(|c| c == file_char)
        .ok_or_else(|| EngineError::InvalidCoord(token.to_string()))?;
    let rank: i32 = chars
        .as_str()
        .parse()
        .map_err(|_| EngineError::InvalidCoord(token.to_string()))?;
    let row = rows as i32 - rank;
    if row < 0 || row >= rows as i32 || col >= cols as usize {
        return Err(EngineError::OutOfBounds(token.to_string()));
    }
    Ok(Coord::new(row as u8, col as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(id: u32, owner: Player, kind: PieceKind) -> Piece {
        Piece { id: PieceId(id), owner, kind }
    }

    #[test]
    fn notation_counts_rank_from_the_bottom() {
        assert_eq!(coord_to_notation(Coord::new(0, 0), 9), "A9");
        assert_eq!(coord_to_notation(Coord::new(8, 3), 9), "D1");
        assert_eq!(coord_to_notation(Coord::new(4, 2), 9), "C5");
        assert_eq!(notation_to_coord("d1", 9, 7).unwrap(), Coord::new(8, 3));
        assert_eq!(notation_to_coord("G9", 9, 7).unwrap(), Coord::new(0, 6));
    }

    #[test]
    fn notation_rejects_off_board_tokens() {
        assert!(matches!(notation_to_coord("H1", 9, 7), Err(EngineError::OutOfBounds(_))));
        assert!(matches!(notation_to_coord("A10", 9, 7), Err(EngineError::OutOfBounds(_))));
        assert!(matches!(notation_to_coord("A0", 9, 7), Err(EngineError::OutOfBounds(_))));
        assert!(matches!(notation_to_coord("", 9, 7), Err(EngineError::InvalidCoord(_))));
        assert!(matches!(notation_to_coord("3A", 9, 7), Err(EngineError::InvalidCoord(_))));
    }

    #[test]
    fn place_take_and_find() {
        let mut board = Board::empty(9, 7);
        let jarl = piece(0, Player::South, PieceKind::Jarl);
        assert_eq!(board.place(Coord::new(8, 3), jarl).unwrap(), None);
        assert_eq!(board.get(Coord::new(8, 3)), Some(jarl));
        assert_eq!(board.find(PieceId(0)).map(|p| p.at), Some(Coord::new(8, 3)));
        assert_eq!(board.find_kind(Player::South, PieceKind::Jarl), Some(Coord::new(8, 3)));
        assert_eq!(board.find_kind(Player::North, PieceKind::Jarl), None);
        assert_eq!(board.take(Coord::new(8, 3)), Some(jarl));
        assert!(board.is_empty(Coord::new(8, 3)));
        assert_eq!(board.empty_squares().count(), 63);
    }

    #[test]
    fn out_of_bounds_is_never_occupied_or_empty() {
        let mut board = Board::empty(9, 5);
        assert_eq!(board.get(Coord::new(9, 0)), None);
        assert!(!board.is_empty(Coord::new(0, 5)));
        assert!(board
            .place(Coord::new(0, 5), piece(1, Player::North, PieceKind::Raven))
            .is_err());
    }

    #[test]
    fn id_generators_are_independent() {
        let mut a = PieceIdGen::new();
        let mut b = PieceIdGen::new();
        assert_eq!(a.mint(), PieceId(0));
        assert_eq!(a.mint(), PieceId(1));
        assert_eq!(b.mint(), PieceId(0));
        assert_eq!(PieceId(7).to_string(), "p7");
    }
}
