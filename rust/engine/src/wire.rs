//! Notation-keyed snapshot of a [`GameState`], the form replicated between
//! clients.

use serde::{Deserialize, Serialize};

use crate::board::{notation_to_coord, Board, Piece, Player};
use crate::error::EngineError;
use crate::executor::CapturedPiles;
use crate::rules::Ruleset;
use crate::state::{Action, GamePhase, GameState, PlayerNames};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBoardEntry {
    pub coord: String,
    pub piece: Piece,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedState {
    pub rules: Ruleset,
    pub turn: Player,
    pub turn_number: u32,
    pub phase: GamePhase,
    pub captured: CapturedPiles,
    pub names: PlayerNames,
    pub message: String,
    pub history: Vec<Action>,
    pub sequence: u64,
    pub board: Vec<SerializedBoardEntry>,
}

pub fn serialize_state(state: &GameState) -> SerializedState {
    // `pieces()` walks rows top to bottom, so entries come out in a stable order.
    let board = state
        .board
        .pieces()
        .map(|p| SerializedBoardEntry {
            coord: state.board.notation(p.at),
            piece: p.piece,
        })
        .collect();
    SerializedState {
        rules: state.rules.clone(),
        turn: state.current_player,
        turn_number: state.turn_number,
        phase: state.phase,
        captured: state.captured.clone(),
        names: state.names.clone(),
        message: state.message.clone(),
        history: state.history.clone(),
        sequence: state.sequence,
        board,
    }
}

pub fn deserialize_state(payload: &SerializedState) -> Result<GameState, EngineError> {
    let rules = payload.rules.clone();
    let mut board = Board::empty(rules.rows, rules.cols);
    for entry in &payload.board {
        let at = notation_to_coord(&entry.coord, rules.rows, rules.cols)?;
        if board.place(at, entry.piece)?.is_some() {
            return Err(EngineError::InvalidLayout(format!(
                "{} is listed twice",
                entry.coord
            )));
        }
    }
    Ok(GameState {
        rules,
        board,
        current_player: payload.turn,
        turn_number: payload.turn_number,
        phase: payload.phase,
        captured: payload.captured.clone(),
        names: payload.names.clone(),
        message: payload.message.clone(),
        history: payload.history.clone(),
        sequence: payload.sequence,
    })
}
