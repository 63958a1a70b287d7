//! Rule-set configuration. Every variant runs through the same engine; what
//! differs is the data in [`Ruleset`].

use serde::{Deserialize, Serialize};

use crate::board::{Board, Coord, Piece, PieceIdGen, PieceKind, Player};
use crate::error::EngineError;

/// Where a Jarl has to go to win by reaching the throne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Thrones {
    /// One square shared by both sides.
    Central(Coord),
    /// One throne per side; a Jarl aims for the opponent's.
    PerPlayer { north: Coord, south: Coord },
}

impl Thrones {
    pub fn goal_for(&self, player: Player) -> Coord {
        match *self {
            Thrones::Central(c) => c,
            Thrones::PerPlayer { north, south } => match player {
                Player::North => south,
                Player::South => north,
            },
        }
    }

    pub fn contains(&self, at: Coord) -> bool {
        match *self {
            Thrones::Central(c) => c == at,
            Thrones::PerPlayer { north, south } => north == at || south == at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portals {
    pub a: Coord,
    pub b: Coord,
}

impl Portals {
    /// The paired square when `at` is one of the portals.
    pub fn partner(&self, at: Coord) -> Option<Coord> {
        if at == self.a {
            Some(self.b)
        } else if at == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Which lineage a ruleset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantName {
    SevenColumn,
    FiveColumn,
    Portal,
}

impl std::str::FromStr for VariantName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seven_column" | "7" => Ok(VariantName::SevenColumn),
            "five_column" | "5" => Ok(VariantName::FiveColumn),
            "portal" => Ok(VariantName::Portal),
            other => Err(EngineError::InvalidLayout(format!("unknown ruleset {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub owner: Player,
    pub kind: PieceKind,
    pub at: Coord,
}

const fn entry(owner: Player, kind: PieceKind, row: u8, col: u8) -> LayoutEntry {
    LayoutEntry {
        owner,
        kind,
        at: Coord::new(row, col),
    }
}

use PieceKind::{Hirdman, Jarl, Raven, RookRaven};
use Player::{North, South};

pub const SEVEN_COLUMN_LAYOUT: [LayoutEntry; 20] = [
    entry(North, Jarl, 0, 3),
    entry(North, Raven, 0, 0),
    entry(North, Raven, 0, 1),
    entry(North, Raven, 0, 5),
    entry(North, Raven, 0, 6),
    entry(North, Hirdman, 1, 1),
    entry(North, Hirdman, 1, 2),
    entry(North, Hirdman, 1, 3),
    entry(North, Hirdman, 1, 4),
    entry(North, Hirdman, 1, 5),
    entry(South, Jarl, 8, 3),
    entry(South, Raven, 8, 0),
    entry(South, Raven, 8, 1),
    entry(South, Raven, 8, 5),
    entry(South, Raven, 8, 6),
    entry(South, Hirdman, 7, 1),
    entry(South, Hirdman, 7, 2),
    entry(South, Hirdman, 7, 3),
    entry(South, Hirdman, 7, 4),
    entry(South, Hirdman, 7, 5),
];

pub const FIVE_COLUMN_LAYOUT: [LayoutEntry; 16] = [
    entry(North, Jarl, 0, 2),
    entry(North, Hirdman, 1, 1),
    entry(North, Hirdman, 1, 2),
    entry(North, Hirdman, 1, 3),
    entry(North, Raven, 0, 4),
    entry(North, Raven, 1, 0),
    entry(North, RookRaven, 0, 0),
    entry(North, RookRaven, 1, 4),
    entry(South, Jarl, 8, 2),
    entry(South, Hirdman, 7, 1),
    entry(South, Hirdman, 7, 2),
    entry(South, Hirdman, 7, 3),
    entry(South, Raven, 8, 0),
    entry(South, Raven, 7, 4),
    entry(South, RookRaven, 8, 4),
    entry(South, RookRaven, 7, 0),
];

pub const PORTAL_LAYOUT: [LayoutEntry; 14] = [
    entry(North, Jarl, 0, 3),
    entry(North, Raven, 0, 1),
    entry(North, Raven, 0, 5),
    entry(North, Hirdman, 1, 2),
    entry(North, Hirdman, 1, 3),
    entry(North, Hirdman, 1, 4),
    entry(North, Hirdman, 0, 2),
    entry(South, Jarl, 6, 3),
    entry(South, Raven, 6, 1),
    entry(South, Raven, 6, 5),
    entry(South, Hirdman, 5, 2),
    entry(South, Hirdman, 5, 3),
    entry(South, Hirdman, 5, 4),
    entry(South, Hirdman, 6, 4),
];

/// Complete variant configuration: geometry, goal squares, the safety rule
/// and the special moves that are switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    pub name: VariantName,
    pub rows: u8,
    pub cols: u8,
    pub thrones: Thrones,
    /// A Jarl may only step onto its goal throne when no enemy attacks it.
    pub secure_throne: bool,
    pub portals: Option<Portals>,
    pub promotion: bool,
    pub reinforcement: bool,
    pub first_player: Player,
    pub layout: Vec<LayoutEntry>,
}

impl Ruleset {
    pub fn seven_column(secure_throne: bool) -> Self {
        Self {
            name: VariantName::SevenColumn,
            rows: 9,
            cols: 7,
            thrones: Thrones::Central(Coord::new(4, 3)),
            secure_throne,
            portals: None,
            promotion: true,
            reinforcement: true,
            first_player: South,
            layout: SEVEN_COLUMN_LAYOUT.to_vec(),
        }
    }

    pub fn five_column(secure_throne: bool) -> Self {
        Self {
            name: VariantName::FiveColumn,
            rows: 9,
            cols: 5,
            thrones: Thrones::Central(Coord::new(4, 2)),
            secure_throne,
            portals: None,
            promotion: true,
            reinforcement: true,
            first_player: South,
            layout: FIVE_COLUMN_LAYOUT.to_vec(),
        }
    }

    pub fn portal(secure_throne: bool) -> Self {
        Self {
            name: VariantName::Portal,
            rows: 7,
            cols: 7,
            thrones: Thrones::PerPlayer {
                north: Coord::new(0, 3),
                south: Coord::new(6, 3),
            },
            secure_throne,
            portals: Some(Portals {
                a: Coord::new(3, 0),
                b: Coord::new(3, 6),
            }),
            promotion: false,
            reinforcement: false,
            first_player: South,
            layout: PORTAL_LAYOUT.to_vec(),
        }
    }

    pub fn preset(name: VariantName, secure_throne: bool) -> Self {
        match name {
            VariantName::SevenColumn => Self::seven_column(secure_throne),
            VariantName::FiveColumn => Self::five_column(secure_throne),
            VariantName::Portal => Self::portal(secure_throne),
        }
    }

    pub fn goal_throne(&self, player: Player) -> Coord {
        self.thrones.goal_for(player)
    }

    /// The two ranks nearest `player`'s opponent, where a Raven may promote.
    pub fn in_promotion_zone(&self, player: Player, at: Coord) -> bool {
        match player {
            Player::South => at.row <= 1,
            Player::North => at.row + 2 >= self.rows,
        }
    }

    /// Lay out the starting position. Ids are minted from a generator scoped
    /// to this call.
    pub fn initial_board(&self) -> Result<Board, EngineError> {
        let mut board = Board::empty(self.rows, self.cols);
        let mut ids = PieceIdGen::new();
        for e in &self.layout {
            let piece = Piece {
                id: ids.mint(),
                owner: e.owner,
                kind: e.kind,
            };
            let previous = board
                .place(e.at, piece)
                .map_err(|_| EngineError::InvalidLayout(format!("{:?} is off the board", e.at)))?;
            if previous.is_some() {
                return Err(EngineError::InvalidLayout(format!(
                    "{:?} is listed twice",
                    e.at
                )));
            }
        }
        Ok(board)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::seven_column(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_lay_out_a_jarl_per_side() {
        for name in [VariantName::SevenColumn, VariantName::FiveColumn, VariantName::Portal] {
            let rules = Ruleset::preset(name, true);
            let board = rules.initial_board().unwrap();
            assert_eq!(board.pieces().count(), rules.layout.len());
            assert!(board.find_kind(North, Jarl).is_some());
            assert!(board.find_kind(South, Jarl).is_some());
            let north = board.pieces().filter(|p| p.piece.owner == North).count();
            assert_eq!(north * 2, rules.layout.len());
        }
    }

    #[test]
    fn piece_ids_are_unique_and_sequential() {
        let board = Ruleset::seven_column(false).initial_board().unwrap();
        let mut ids: Vec<u32> = board.pieces().map(|p| p.piece.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn bad_layouts_are_rejected() {
        let mut rules = Ruleset::five_column(false);
        rules.layout.push(entry(North, Hirdman, 0, 9));
        assert!(matches!(rules.initial_board(), Err(EngineError::InvalidLayout(_))));

        let mut rules = Ruleset::five_column(false);
        rules.layout.push(entry(South, Hirdman, 0, 2));
        assert!(matches!(rules.initial_board(), Err(EngineError::InvalidLayout(_))));
    }

    #[test]
    fn promotion_zone_is_the_opponents_two_back_ranks() {
        let rules = Ruleset::seven_column(false);
        assert!(rules.in_promotion_zone(South, Coord::new(0, 2)));
        assert!(rules.in_promotion_zone(South, Coord::new(1, 2)));
        assert!(!rules.in_promotion_zone(South, Coord::new(2, 2)));
        assert!(!rules.in_promotion_zone(South, Coord::new(8, 2)));
        assert!(rules.in_promotion_zone(North, Coord::new(7, 0)));
        assert!(rules.in_promotion_zone(North, Coord::new(8, 0)));
        assert!(!rules.in_promotion_zone(North, Coord::new(6, 0)));
    }

    #[test]
    fn per_player_thrones_point_at_the_opponent() {
        let rules = Ruleset::portal(false);
        assert_eq!(rules.goal_throne(North), Coord::new(6, 3));
        assert_eq!(rules.goal_throne(South), Coord::new(0, 3));
        let central = Ruleset::seven_column(false);
        assert_eq!(central.goal_throne(North), central.goal_throne(South));
    }

    #[test]
    fn variant_names_parse() {
        assert_eq!("portal".parse::<VariantName>().unwrap(), VariantName::Portal);
        assert_eq!("Seven_Column".parse::<VariantName>().unwrap(), VariantName::SevenColumn);
        assert!("chess".parse::<VariantName>().is_err());
    }
}
