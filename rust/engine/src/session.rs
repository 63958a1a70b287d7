//! Client-side controller that turns square clicks into engine calls.
//!
//! A session owns the local copy of the game, the ephemeral selection
//! (selected square plus its candidate moves) and an advisory line for the
//! player. With a local role set, the session refuses to act out of turn and
//! treats every computed state as a proposal until the replication layer
//! hands it back through [`Session::apply_remote`].

use tracing::{debug, warn};

use crate::board::{Coord, PieceId, Player};
use crate::error::EngineError;
use crate::movegen::Move;
use crate::state::{self, Awaiting, GameState};

pub const INVALID_MOVE: &str = "Invalid move. Click piece or valid target.";
pub const SYNC_FAILED: &str = "Failed to sync move. Please check connection.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub at: Coord,
    pub moves: Vec<Move>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to persist; at most the selection or advisory changed.
    Noop,
    /// A transition the caller has to persist. Local sessions have already
    /// adopted it.
    Commit(GameState),
}

#[derive(Debug, Clone)]
pub struct Session {
    state: GameState,
    role: Option<Player>,
    selection: Option<Selection>,
    advisory: Option<String>,
    in_flight: Option<GameState>,
    /// Square to select once an in-flight cancel is confirmed.
    reselect: Option<Coord>,
}

impl Session {
    /// Hot-seat play: both sides act through this session.
    pub fn local(state: GameState) -> Self {
        Self {
            state,
            role: None,
            selection: None,
            advisory: None,
            in_flight: None,
            reselect: None,
        }
    }

    /// Networked play as `role`.
    pub fn networked(state: GameState, role: Player) -> Self {
        Self {
            role: Some(role),
            ..Self::local(state)
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn role(&self) -> Option<Player> {
        self.role
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// Line to show the player: the advisory if there is one, else the
    /// state's own status message.
    pub fn message(&self) -> &str {
        self.advisory.as_deref().unwrap_or(&self.state.message)
    }

    /// A proposal sent for persistence and not yet confirmed.
    pub fn in_flight(&self) -> Option<&GameState> {
        self.in_flight.as_ref()
    }

    fn advise(&mut self, text: impl Into<String>) -> Outcome {
        self.advisory = Some(text.into());
        Outcome::Noop
    }

    /// Turn-ownership and sync gate shared by every input.
    fn gate(&mut self) -> Option<Outcome> {
        if !self.state.active() {
            return Some(Outcome::Noop);
        }
        if let Some(role) = self.role {
            if role != self.state.current_player {
                let who = self.state.names.display(self.state.current_player);
                return Some(self.advise(format!("Waiting for {who} to move.")));
            }
        }
        if self.in_flight.is_some() {
            return Some(self.advise("Waiting for the last move to sync."));
        }
        None
    }

    fn commit(&mut self, result: Result<GameState, EngineError>) -> Outcome {
        match result {
            Ok(next) => {
                self.selection = None;
                self.advisory = None;
                if self.role.is_some() {
                    self.in_flight = Some(next.clone());
                } else {
                    self.state = next.clone();
                }
                Outcome::Commit(next)
            }
            Err(err) => self.advise(err.to_string()),
        }
    }

    fn select(&mut self, at: Coord) -> Outcome {
        let Some(piece) = self.state.board.get(at) else {
            return self.advise(INVALID_MOVE);
        };
        let moves = state::legal_moves(&self.state, at);
        let square = self.state.board.notation(at);
        let symbol = piece.kind.symbol();
        if moves.is_empty() {
            self.selection = None;
            return self.advise(format!("Selected {symbol} at ({square}). No valid moves."));
        }
        self.selection = Some(Selection { at, moves });
        self.advise(format!("Selected {symbol} at ({square}). Choose move."))
    }

    fn owns(&self, at: Coord) -> bool {
        self.state
            .board
            .get(at)
            .is_some_and(|p| p.owner == self.state.current_player)
    }

    pub fn click(&mut self, at: Coord) -> Outcome {
        if let Some(out) = self.gate() {
            return out;
        }
        match self.state.awaiting() {
            Some(Awaiting::Promotion { .. }) => self.advise("Choose whether to promote first."),
            Some(Awaiting::Reinforcement { .. }) => {
                if self.state.board.is_empty(at) {
                    let result = state::place_reinforcement(&self.state, at);
                    return self.commit(result);
                }
                if self.owns(at) {
                    // Picking a piece on the board drops the reinforcement.
                    let result = state::cancel_reinforcement(&self.state);
                    let out = self.commit(result);
                    if let Outcome::Commit(_) = out {
                        if self.role.is_none() {
                            self.select(at);
                        } else {
                            self.reselect = Some(at);
                        }
                    }
                    return out;
                }
                self.advise("Square is occupied. Choose an empty square for the reinforcement.")
            }
            Some(Awaiting::Move) => {
                let chosen = self
                    .selection
                    .as_ref()
                    .and_then(|sel| sel.moves.iter().copied().find(|m| m.to == at));
                if let Some(mv) = chosen {
                    let result = state::apply_move(&self.state, mv);
                    return self.commit(result);
                }
                if self.owns(at) {
                    return self.select(at);
                }
                self.selection = None;
                self.advise(INVALID_MOVE)
            }
            None => Outcome::Noop,
        }
    }

    pub fn choose_promotion(&mut self, promote: bool) -> Outcome {
        if let Some(out) = self.gate() {
            return out;
        }
        let result = state::resolve_promotion(&self.state, promote);
        self.commit(result)
    }

    pub fn select_reinforcement(&mut self, piece: PieceId) -> Outcome {
        if let Some(out) = self.gate() {
            return out;
        }
        self.selection = None;
        let result = state::begin_reinforcement(&self.state, piece);
        self.commit(result)
    }

    /// Drop the selection, and a pending reinforcement if there is one.
    pub fn cancel(&mut self) -> Outcome {
        self.selection = None;
        self.advisory = None;
        if matches!(self.state.awaiting(), Some(Awaiting::Reinforcement { .. })) {
            if let Some(out) = self.gate() {
                return out;
            }
            let result = state::cancel_reinforcement(&self.state);
            return self.commit(result);
        }
        Outcome::Noop
    }

    /// Adopt a snapshot from the replication layer. Snapshots older than the
    /// local copy are ignored; returns whether the snapshot was taken.
    pub fn apply_remote(&mut self, remote: GameState) -> bool {
        if remote.sequence < self.state.sequence {
            warn!(
                remote = remote.sequence,
                local = self.state.sequence,
                "ignoring stale snapshot"
            );
            return false;
        }
        let confirmed = self
            .in_flight
            .as_ref()
            .is_some_and(|pending| remote.sequence >= pending.sequence);
        if confirmed {
            self.in_flight = None;
        }
        let keep_selection = self.selection.as_ref().is_some_and(|sel| {
            remote.current_player == self.state.current_player
                && remote.board == self.state.board
                && remote.board.get(sel.at).is_some()
        });
        if !keep_selection {
            self.selection = None;
        }
        debug!(sequence = remote.sequence, "snapshot adopted");
        self.state = remote;
        self.advisory = None;
        if confirmed {
            if let Some(at) = self.reselect.take() {
                if self.state.awaiting() == Some(Awaiting::Move) && self.owns(at) {
                    self.select(at);
                }
            }
        }
        true
    }

    /// The proposal could not be persisted. The committed state stays as it
    /// was and the player may retry.
    pub fn sync_failed(&mut self) {
        self.in_flight = None;
        self.reselect = None;
        self.advisory = Some(SYNC_FAILED.to_string());
    }
}
