//! Game state and the turn state machine.
//!
//! Every operation takes the current [`GameState`] by reference and either
//! returns the next state or an [`EngineError`]; the input is never modified,
//! so a failed call is a no-op for the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::{Board, Coord, Piece, PieceId, PlacedPiece, Player};
use crate::error::EngineError;
use crate::executor::{execute_move, place_piece, promote, CapturedPiles};
use crate::legality::legal_moves_on;
use crate::movegen::Move;
use crate::rules::{Ruleset, Thrones};
use crate::win::{evaluate_win, WinReason};

/// The one extra decision a player may owe before their turn ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Awaiting {
    Move,
    Promotion { piece: PieceId, at: Coord },
    Reinforcement { piece: Piece },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GamePhase {
    Playing { awaiting: Awaiting },
    GameOver { winner: Player, reason: WinReason },
}

/// Anything a player can do to the state. Also the history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move { mv: Move },
    Promotion { promote: bool },
    SelectReinforcement { piece: PieceId },
    CancelReinforcement,
    PlaceReinforcement { at: Coord },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerNames {
    pub north: Option<String>,
    pub south: Option<String>,
}

impl PlayerNames {
    pub fn name(&self, player: Player) -> String {
        let name = match player {
            Player::North => self.north.as_deref(),
            Player::South => self.south.as_deref(),
        };
        name.map(str::to_string).unwrap_or_else(|| player.to_string())
    }

    /// `"{name} ({player})"`, the form every status message uses.
    pub fn display(&self, player: Player) -> String {
        format!("{} ({player})", self.name(player))
    }

    pub fn set(&mut self, player: Player, name: impl Into<String>) {
        let slot = match player {
            Player::North => &mut self.north,
            Player::South => &mut self.south,
        };
        *slot = Some(name.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub rules: Ruleset,
    pub board: Board,
    pub current_player: Player,
    pub turn_number: u32,
    pub phase: GamePhase,
    pub captured: CapturedPiles,
    pub names: PlayerNames,
    pub message: String,
    pub history: Vec<Action>,
    /// Bumped on every committed transition; replication uses it to refuse
    /// stale writes.
    pub sequence: u64,
}

impl GameState {
    pub fn new(rules: Ruleset) -> Result<Self, EngineError> {
        Self::with_names(rules, PlayerNames::default())
    }

    pub fn with_names(rules: Ruleset, names: PlayerNames) -> Result<Self, EngineError> {
        let board = rules.initial_board()?;
        let current_player = rules.first_player;
        let mut state = Self {
            rules,
            board,
            current_player,
            turn_number: 1,
            phase: GamePhase::Playing {
                awaiting: Awaiting::Move,
            },
            captured: CapturedPiles::default(),
            names,
            message: String::new(),
            history: Vec::new(),
            sequence: 0,
        };
        state.message = state.turn_prompt();
        Ok(state)
    }

    pub fn active(&self) -> bool {
        matches!(self.phase, GamePhase::Playing { .. })
    }

    pub fn awaiting(&self) -> Option<Awaiting> {
        match self.phase {
            GamePhase::Playing { awaiting } => Some(awaiting),
            GamePhase::GameOver { .. } => None,
        }
    }

    pub fn winner(&self) -> Option<Player> {
        match self.phase {
            GamePhase::GameOver { winner, .. } => Some(winner),
            GamePhase::Playing { .. } => None,
        }
    }

    pub fn turn_prompt(&self) -> String {
        format!(
            "Turn {}: {}'s move. Select a piece.",
            self.turn_number,
            self.names.display(self.current_player)
        )
    }

    fn check_awaiting(&self) -> Result<Awaiting, EngineError> {
        self.awaiting().ok_or(EngineError::Finished)
    }

    /// Copy of `self` for the next committed transition.
    fn successor(&self, action: Action) -> GameState {
        let mut next = self.clone();
        next.history.push(action);
        next.sequence += 1;
        next
    }

    /// Run the win check for the current player and either finish the game
    /// or hand the turn over.
    fn end_turn(&mut self, last: Option<PlacedPiece>) {
        let mover = self.current_player;
        if let Some(reason) = evaluate_win(&self.board, &self.rules, mover, last) {
            self.finish(mover, reason);
            return;
        }
        if mover != self.rules.first_player {
            self.turn_number += 1;
        }
        self.current_player = mover.opponent();
        self.phase = GamePhase::Playing {
            awaiting: Awaiting::Move,
        };
        self.message = self.turn_prompt();
    }

    fn finish(&mut self, winner: Player, reason: WinReason) {
        let who = self.names.display(winner);
        self.message = match reason {
            WinReason::Throne => match self.rules.thrones {
                Thrones::Central(_) => format!("{who} wins by reaching the Throne!"),
                Thrones::PerPlayer { .. } => {
                    format!("{who} wins by reaching the opponent's Throne!")
                }
            },
            WinReason::Decapitation => format!("{who} wins by Decapitation!"),
            WinReason::Forfeit => format!("{who} wins! Opponent left the game."),
        };
        self.phase = GamePhase::GameOver { winner, reason };
        debug!(winner = %winner, ?reason, turn = self.turn_number, "game over");
    }
}

/// Legal moves for the piece on `at`. Empty unless it is that piece's
/// owner's turn and no decision is pending.
pub fn legal_moves(state: &GameState, at: Coord) -> Vec<Move> {
    if state.awaiting() != Some(Awaiting::Move) {
        return Vec::new();
    }
    match state.board.get(at) {
        Some(piece) if piece.owner == state.current_player => {
            legal_moves_on(&state.board, &state.rules, at)
        }
        _ => Vec::new(),
    }
}

/// Every legal move available to the player to move.
pub fn all_legal_moves(state: &GameState) -> Vec<Move> {
    state
        .board
        .pieces()
        .filter(|p| p.piece.owner == state.current_player)
        .flat_map(|p| legal_moves(state, p.at))
        .collect()
}

pub fn apply_move(state: &GameState, mv: Move) -> Result<GameState, EngineError> {
    if state.check_awaiting()? != Awaiting::Move {
        return Err(EngineError::DecisionPending);
    }
    let piece = state.board.get(mv.from).ok_or(EngineError::NoPiece)?;
    if piece.owner != state.current_player {
        return Err(EngineError::WrongTurn);
    }
    if !legal_moves_on(&state.board, &state.rules, mv.from).contains(&mv) {
        return Err(EngineError::IllegalMove);
    }
    let exec = execute_move(&state.board, &state.rules, mv)?;

    let mut next = state.successor(Action::Move { mv });
    next.board = exec.board;
    if let Some(captured) = exec.captured {
        debug!(captured = %captured.id, by = %piece.owner, "piece captured");
        if next.rules.reinforcement {
            next.captured.file(captured);
        }
    }
    debug!(player = %piece.owner, from = ?mv.from, to = ?mv.to, kind = ?mv.kind, "move applied");

    if exec.promotion_pending {
        next.phase = GamePhase::Playing {
            awaiting: Awaiting::Promotion {
                piece: piece.id,
                at: mv.to,
            },
        };
        next.message = format!(
            "{}: promote {} at ({})?",
            next.names.display(piece.owner),
            piece.kind.symbol(),
            next.board.notation(mv.to)
        );
        return Ok(next);
    }
    next.end_turn(Some(exec.moved));
    Ok(next)
}

pub fn resolve_promotion(state: &GameState, accept: bool) -> Result<GameState, EngineError> {
    let Awaiting::Promotion { piece, at } = state.check_awaiting()? else {
        return Err(EngineError::NoPendingPromotion);
    };
    let mut next = state.successor(Action::Promotion { promote: accept });
    let last = if accept {
        let (board, placed) = promote(&state.board, at)?;
        next.board = board;
        debug!(piece = %piece, at = ?at, "raven promoted");
        placed
    } else {
        let placed = state.board.find(piece).ok_or(EngineError::NoPiece)?;
        debug!(piece = %piece, at = ?at, "promotion declined");
        placed
    };
    next.end_turn(Some(last));
    Ok(next)
}

pub fn begin_reinforcement(state: &GameState, id: PieceId) -> Result<GameState, EngineError> {
    match state.check_awaiting()? {
        Awaiting::Move | Awaiting::Reinforcement { .. } => {}
        Awaiting::Promotion { .. } => return Err(EngineError::DecisionPending),
    }
    if !state.rules.reinforcement {
        return Err(EngineError::ReinforcementDisabled);
    }
    let player = state.current_player;
    let piece = state
        .captured
        .find(player, id)
        .ok_or(EngineError::NotInPile(id))?;
    let mut next = state.successor(Action::SelectReinforcement { piece: id });
    next.phase = GamePhase::Playing {
        awaiting: Awaiting::Reinforcement { piece },
    };
    next.message = format!(
        "{}: place {} on an empty square.",
        next.names.display(player),
        piece.kind.symbol()
    );
    Ok(next)
}

pub fn cancel_reinforcement(state: &GameState) -> Result<GameState, EngineError> {
    let Awaiting::Reinforcement { .. } = state.check_awaiting()? else {
        return Err(EngineError::NoPendingReinforcement);
    };
    let mut next = state.successor(Action::CancelReinforcement);
    next.phase = GamePhase::Playing {
        awaiting: Awaiting::Move,
    };
    next.message = next.turn_prompt();
    Ok(next)
}

pub fn place_reinforcement(state: &GameState, at: Coord) -> Result<GameState, EngineError> {
    let Awaiting::Reinforcement { piece } = state.check_awaiting()? else {
        return Err(EngineError::NoPendingReinforcement);
    };
    let board = place_piece(&state.board, piece, at)?;
    let mut next = state.successor(Action::PlaceReinforcement { at });
    next.captured
        .take(piece.owner, piece.id)
        .ok_or(EngineError::NotInPile(piece.id))?;
    next.board = board;
    debug!(piece = %piece.id, owner = %piece.owner, at = ?at, "reinforcement placed");
    next.end_turn(Some(PlacedPiece { piece, at }));
    Ok(next)
}

/// The opponent of `winner` left; `winner` takes the game.
pub fn forfeit(state: &GameState, winner: Player) -> Result<GameState, EngineError> {
    state.check_awaiting()?;
    let mut next = state.clone();
    next.sequence += 1;
    next.finish(winner, WinReason::Forfeit);
    Ok(next)
}

pub fn apply_action(state: &GameState, action: Action) -> Result<GameState, EngineError> {
    match action {
        Action::Move { mv } => apply_move(state, mv),
        Action::Promotion { promote } => resolve_promotion(state, promote),
        Action::SelectReinforcement { piece } => begin_reinforcement(state, piece),
        Action::CancelReinforcement => cancel_reinforcement(state),
        Action::PlaceReinforcement { at } => place_reinforcement(state, at),
    }
}
