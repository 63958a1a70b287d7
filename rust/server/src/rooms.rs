//! In-memory room documents: one replicated game per room, plus the seats
//! and lifecycle status around it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use engine::{
    all_legal_moves, apply_action, coord_to_notation, deserialize_state, forfeit, legal_moves,
    notation_to_coord, serialize_state, Action, EngineError, GameState, Move, Player, PlayerNames, Ruleset,
    SerializedState,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
    Aborted,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
    #[error("room name must not be empty")]
    InvalidName,
    #[error("room {0} already exists")]
    NameTaken(String),
    #[error("room is not open for joining")]
    NotJoinable,
    #[error("room is not active")]
    NotActive,
    #[error("unknown session")]
    UnknownSession,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("stale write: expected sequence {expected}, got {got}")]
    StaleWrite { expected: u64, got: u64 },
    #[error("snapshot does not follow from the stored game: {0}")]
    InvalidSnapshot(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone)]
struct Seat {
    session: String,
    name: String,
    left: bool,
}

#[derive(Debug)]
struct RoomDoc {
    state: GameState,
    host: Seat,
    guest: Option<Seat>,
    status: RoomStatus,
    created_at: u64,
    updated_at: u64,
}

impl RoomDoc {
    /// Host plays South, guest plays North.
    fn seat_mut(&mut self, role: Player) -> Option<&mut Seat> {
        match role {
            Player::South => Some(&mut self.host),
            Player::North => self.guest.as_mut(),
        }
    }

    fn deserted(&self) -> bool {
        self.host.left && self.guest.as_ref().map_or(true, |g| g.left)
    }

    fn role_of(&self, session: &str) -> Option<Player> {
        if self.host.session == session {
            return Some(Player::South);
        }
        self.guest
            .as_ref()
            .filter(|g| g.session == session)
            .map(|_| Player::North)
    }
}

#[derive(Debug)]
struct Room {
    doc: Mutex<RoomDoc>,
    hub: broadcast::Sender<RoomView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub id: String,
    pub status: RoomStatus,
    pub host_name: String,
    pub guest_name: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    pub state: SerializedState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalMove {
    pub origin: String,
    pub target: String,
    /// Ready to send back as a move action.
    #[serde(rename = "move")]
    pub mv: Move,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seated {
    pub session: String,
    pub role: Player,
    pub room: RoomView,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn normalize_room_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim().to_uppercase();
    if name.is_empty() {
        return Err(RoomError::InvalidName);
    }
    Ok(name)
}

fn view(id: &str, doc: &RoomDoc) -> RoomView {
    RoomView {
        id: id.to_string(),
        status: doc.status,
        host_name: doc.host.name.clone(),
        guest_name: doc.guest.as_ref().map(|g| g.name.clone()),
        created_at: doc.created_at,
        updated_at: doc.updated_at,
        state: serialize_state(&doc.state),
    }
}

pub struct RoomStore {
    rooms: DashMap<String, Arc<Room>>,
    capacity: usize,
}

impl RoomStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    fn room(&self, id: &str) -> Result<Arc<Room>, RoomError> {
        let id = normalize_room_name(id)?;
        self.rooms
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(RoomError::NotFound)
    }

    fn publish(room: &Room, id: &str, doc: &mut RoomDoc) -> RoomView {
        doc.updated_at = now_millis();
        let payload = view(id, doc);
        // No subscribers is fine.
        let _ = room.hub.send(payload.clone());
        payload
    }

    pub fn create(
        &self,
        raw_name: &str,
        player_name: &str,
        rules: Ruleset,
    ) -> Result<Seated, RoomError> {
        let id = normalize_room_name(raw_name)?;
        let names = PlayerNames {
            south: Some(player_name.to_string()),
            north: None,
        };
        let mut state = GameState::with_names(rules, names)?;
        state.message = format!(
            "Turn 1: {}'s move. Waiting for opponent...",
            state.names.display(Player::South)
        );
        let session = Uuid::new_v4().to_string();
        let now = now_millis();
        let doc = RoomDoc {
            state,
            host: Seat {
                session: session.clone(),
                name: player_name.to_string(),
                left: false,
            },
            guest: None,
            status: RoomStatus::Waiting,
            created_at: now,
            updated_at: now,
        };
        let payload = view(&id, &doc);
        match self.rooms.entry(id.clone()) {
            Entry::Occupied(_) => return Err(RoomError::NameTaken(id)),
            Entry::Vacant(slot) => {
                let (hub, _rx) = broadcast::channel(self.capacity);
                slot.insert(Arc::new(Room {
                    doc: Mutex::new(doc),
                    hub,
                }));
            }
        }
        info!(room = %id, host = %player_name, "room created");
        Ok(Seated {
            session,
            role: Player::South,
            room: payload,
        })
    }

    pub fn join(&self, id: &str, player_name: &str) -> Result<Seated, RoomError> {
        let room = self.room(id)?;
        let id = normalize_room_name(id)?;
        let mut doc = room.doc.lock();
        if doc.status != RoomStatus::Waiting || doc.guest.is_some() {
            return Err(RoomError::NotJoinable);
        }
        let session = Uuid::new_v4().to_string();
        doc.guest = Some(Seat {
            session: session.clone(),
            name: player_name.to_string(),
            left: false,
        });
        doc.status = RoomStatus::Active;
        doc.state.names.set(Player::North, player_name);
        doc.state.message = doc.state.turn_prompt();
        doc.state.sequence += 1;
        info!(room = %id, guest = %player_name, "room joined");
        let payload = Self::publish(&room, &id, &mut doc);
        Ok(Seated {
            session,
            role: Player::North,
            room: payload,
        })
    }

    pub fn get(&self, id: &str) -> Result<RoomView, RoomError> {
        let room = self.room(id)?;
        let doc = room.doc.lock();
        Ok(view(&normalize_room_name(id)?, &doc))
    }

    pub fn subscribe(&self, id: &str) -> Result<(RoomView, broadcast::Receiver<RoomView>), RoomError> {
        let room = self.room(id)?;
        // Subscribe under the lock so no update slips between snapshot and receiver.
        let doc = room.doc.lock();
        let rx = room.hub.subscribe();
        Ok((view(&normalize_room_name(id)?, &doc), rx))
    }

    /// Legal moves in the current state, for one origin square or for every
    /// piece of the side to move.
    pub fn legal(&self, id: &str, origin: Option<&str>) -> Result<(Player, Vec<LegalMove>), RoomError> {
        let room = self.room(id)?;
        let doc = room.doc.lock();
        let state = &doc.state;
        let moves = match origin {
            Some(token) => {
                let at = notation_to_coord(token, state.rules.rows, state.rules.cols)?;
                legal_moves(state, at)
            }
            None => all_legal_moves(state),
        };
        let rows = state.rules.rows;
        let moves = moves
            .into_iter()
            .map(|mv| LegalMove {
                origin: coord_to_notation(mv.from, rows),
                target: coord_to_notation(mv.to, rows),
                mv,
            })
            .collect();
        Ok((state.current_player, moves))
    }

    fn writable(doc: &RoomDoc, session: &str) -> Result<Player, RoomError> {
        if doc.status != RoomStatus::Active {
            return Err(RoomError::NotActive);
        }
        let role = doc.role_of(session).ok_or(RoomError::UnknownSession)?;
        if role != doc.state.current_player {
            return Err(RoomError::NotYourTurn);
        }
        Ok(role)
    }

    fn commit(room: &Room, id: &str, doc: &mut RoomDoc, next: GameState) -> RoomView {
        doc.state = next;
        if !doc.state.active() {
            doc.status = RoomStatus::Finished;
            info!(room = %id, winner = ?doc.state.winner(), "game finished");
        }
        Self::publish(room, id, doc)
    }

    /// Run `action` through the engine on the stored state.
    pub fn apply(&self, id: &str, session: &str, action: Action) -> Result<RoomView, RoomError> {
        let room = self.room(id)?;
        let id = normalize_room_name(id)?;
        let mut doc = room.doc.lock();
        let role = Self::writable(&doc, session)?;
        let next = apply_action(&doc.state, action)?;
        info!(room = %id, player = %role, sequence = next.sequence, "action applied");
        Ok(Self::commit(&room, &id, &mut doc, next))
    }

    /// Store a snapshot computed by a client. It must build on exactly the
    /// stored state: its sequence is the stored one plus one and its history
    /// adds one action, which the engine replays to the same state.
    pub fn store(
        &self,
        id: &str,
        session: &str,
        payload: &SerializedState,
    ) -> Result<RoomView, RoomError> {
        let room = self.room(id)?;
        let id = normalize_room_name(id)?;
        let mut doc = room.doc.lock();
        let role = Self::writable(&doc, session)?;
        let expected = doc.state.sequence + 1;
        if payload.sequence != expected {
            warn!(room = %id, player = %role, expected, got = payload.sequence, "stale snapshot refused");
            return Err(RoomError::StaleWrite {
                expected,
                got: payload.sequence,
            });
        }
        let claimed = deserialize_state(payload)?;
        let next = Self::replay(&doc.state, &claimed).map_err(|reason| {
            warn!(room = %id, player = %role, %reason, "forged snapshot refused");
            RoomError::InvalidSnapshot(reason)
        })?;
        info!(room = %id, player = %role, sequence = next.sequence, "snapshot stored");
        Ok(Self::commit(&room, &id, &mut doc, next))
    }

    fn replay(stored: &GameState, claimed: &GameState) -> Result<GameState, String> {
        let extends = claimed.history.len() == stored.history.len() + 1
            && claimed.history.starts_with(&stored.history);
        let action = match claimed.history.last() {
            Some(action) if extends => *action,
            _ => return Err("history must extend the stored one by exactly one action".into()),
        };
        let next = apply_action(stored, action).map_err(|e| e.to_string())?;
        if &next != claimed {
            return Err(format!("{action:?} does not produce the submitted state"));
        }
        Ok(next)
    }

    /// A player leaves. An open room is aborted; a running game is won by
    /// whoever stays.
    pub fn leave(&self, id: &str, session: &str) -> Result<RoomView, RoomError> {
        let room = self.room(id)?;
        let id = normalize_room_name(id)?;
        let mut doc = room.doc.lock();
        let role = doc.role_of(session).ok_or(RoomError::UnknownSession)?;
        let payload = match doc.status {
            RoomStatus::Waiting => {
                doc.status = RoomStatus::Aborted;
                info!(room = %id, "room aborted before start");
                Self::publish(&room, &id, &mut doc)
            }
            RoomStatus::Active => {
                let next = forfeit(&doc.state, role.opponent())?;
                info!(room = %id, leaver = %role, "player left mid-game");
                Self::commit(&room, &id, &mut doc, next)
            }
            RoomStatus::Finished | RoomStatus::Aborted => view(&id, &doc),
        };
        if let Some(seat) = doc.seat_mut(role) {
            seat.left = true;
        }
        // Closed rooms go once nobody is seated.
        if doc.deserted() {
            self.rooms.remove_if(&id, |_, r| Arc::ptr_eq(r, &room));
            info!(room = %id, "room removed");
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{Coord, GamePhase, WinReason};

    fn opened() -> (RoomStore, Seated, Seated) {
        let store = RoomStore::new(8);
        let host = store.create("  fjord ", "Astrid", Ruleset::seven_column(true)).unwrap();
        let guest = store.join("FJORD", "Bjorn").unwrap();
        (store, host, guest)
    }

    fn hirdman_step(store: &RoomStore, from: &str, to: Coord) -> Move {
        let (_, moves) = store.legal("fjord", Some(from)).unwrap();
        moves.into_iter().map(|m| m.mv).find(|m| m.to == to).unwrap()
    }

    #[test]
    fn create_normalizes_and_rejects_duplicates() {
        let store = RoomStore::new(8);
        let host = store.create(" fjord", "Astrid", Ruleset::default()).unwrap();
        assert_eq!(host.room.id, "FJORD");
        assert_eq!(host.role, Player::South);
        assert_eq!(host.room.status, RoomStatus::Waiting);
        assert_eq!(
            host.room.state.message,
            "Turn 1: Astrid (South)'s move. Waiting for opponent..."
        );
        assert!(matches!(
            store.create("FJORD", "Other", Ruleset::default()),
            Err(RoomError::NameTaken(_))
        ));
        assert!(matches!(store.create("   ", "x", Ruleset::default()), Err(RoomError::InvalidName)));
    }

    #[test]
    fn join_activates_and_only_once() {
        let (store, _host, guest) = opened();
        assert_eq!(guest.role, Player::North);
        assert_eq!(guest.room.status, RoomStatus::Active);
        assert_eq!(guest.room.guest_name.as_deref(), Some("Bjorn"));
        assert_eq!(guest.room.state.message, "Turn 1: Astrid (South)'s move. Select a piece.");
        assert!(matches!(store.join("fjord", "Third"), Err(RoomError::NotJoinable)));
        assert!(matches!(store.join("nowhere", "x"), Err(RoomError::NotFound)));
    }

    #[test]
    fn actions_check_turn_ownership() {
        let (store, host, guest) = opened();
        let mv = hirdman_step(&store, "B2", Coord::new(6, 1));
        assert!(matches!(
            store.apply("fjord", &guest.session, Action::Move { mv }),
            Err(RoomError::NotYourTurn)
        ));
        assert!(matches!(
            store.apply("fjord", "intruder", Action::Move { mv }),
            Err(RoomError::UnknownSession)
        ));
        let view = store.apply("fjord", &host.session, Action::Move { mv }).unwrap();
        assert_eq!(view.state.turn, Player::North);
        assert_eq!(view.state.message, "Turn 1: Bjorn (North)'s move. Select a piece.");
    }

    #[test]
    fn legal_moves_are_listed_in_notation() {
        let (store, _host, _guest) = opened();
        let (turn, moves) = store.legal("fjord", Some("b2")).unwrap();
        assert_eq!(turn, Player::South);
        assert!(moves.iter().all(|m| m.origin == "B2"));
        assert!(moves.iter().any(|m| m.target == "B3"));
        let (_, everything) = store.legal("fjord", None).unwrap();
        assert!(everything.len() > moves.len());
        assert!(matches!(store.legal("fjord", Some("Z9")), Err(RoomError::Engine(_))));
    }

    #[test]
    fn engine_errors_pass_through() {
        let (store, host, _guest) = opened();
        let err = store
            .apply("fjord", &host.session, Action::Promotion { promote: true })
            .unwrap_err();
        assert!(matches!(err, RoomError::Engine(EngineError::NoPendingPromotion)));
    }

    #[test]
    fn stored_snapshots_must_extend_the_current_sequence() {
        let (store, host, guest) = opened();
        let base = deserialize_state(&store.get("fjord").unwrap().state).unwrap();
        let mv = hirdman_step(&store, "C2", Coord::new(6, 2));
        let next = engine::apply_move(&base, mv).unwrap();
        let view = store.store("fjord", &host.session, &serialize_state(&next)).unwrap();
        assert_eq!(view.state.sequence, base.sequence + 1);

        // A second snapshot built on the same base no longer extends the store.
        let racing = engine::apply_move(&base, hirdman_step_on(&base, Coord::new(7, 3), Coord::new(6, 3))).unwrap();
        let err = store.store("fjord", &host.session, &serialize_state(&racing)).unwrap_err();
        assert!(matches!(err, RoomError::NotYourTurn));
        let err = store.store("fjord", &guest.session, &serialize_state(&racing)).unwrap_err();
        assert!(matches!(err, RoomError::StaleWrite { expected, got } if expected == got + 1));
    }

    fn hirdman_step_on(state: &GameState, from: Coord, to: Coord) -> Move {
        legal_moves(state, from).into_iter().find(|m| m.to == to).unwrap()
    }

    #[test]
    fn leaving_mid_game_forfeits_and_finishes() {
        let (store, host, _guest) = opened();
        let view = store.leave("fjord", &host.session).unwrap();
        assert_eq!(view.status, RoomStatus::Finished);
        assert_eq!(
            view.state.phase,
            GamePhase::GameOver { winner: Player::North, reason: WinReason::Forfeit }
        );
        assert_eq!(view.state.message, "Bjorn (North) wins! Opponent left the game.");
        let mv = Move::normal(Coord::new(1, 1), Coord::new(2, 1));
        assert!(matches!(
            store.apply("fjord", &host.session, Action::Move { mv }),
            Err(RoomError::NotActive)
        ));
    }

    #[test]
    fn leaving_an_open_room_aborts_and_frees_it() {
        let store = RoomStore::new(8);
        let host = store.create("keep", "Astrid", Ruleset::five_column(false)).unwrap();
        let view = store.leave("keep", &host.session).unwrap();
        assert_eq!(view.status, RoomStatus::Aborted);
        assert!(matches!(store.get("keep"), Err(RoomError::NotFound)));
        assert!(matches!(store.join("keep", "late"), Err(RoomError::NotFound)));
        assert!(store.create("keep", "Astrid", Ruleset::default()).is_ok());
    }

    #[test]
    fn finished_room_is_removed_once_both_players_leave() {
        let (store, host, guest) = opened();
        store.leave("fjord", &host.session).unwrap();
        assert_eq!(store.get("fjord").unwrap().status, RoomStatus::Finished);
        let last = store.leave("fjord", &guest.session).unwrap();
        assert_eq!(last.status, RoomStatus::Finished);
        assert!(matches!(store.get("fjord"), Err(RoomError::NotFound)));
    }

    #[test]
    fn doctored_snapshots_are_refused() {
        let (store, host, _guest) = opened();
        let base = deserialize_state(&store.get("fjord").unwrap().state).unwrap();

        // North's Jarl gone, throne guard off, South declared the winner.
        let mut forged = base.clone();
        forged.board.take(Coord::new(0, 3));
        forged.board.take(Coord::new(7, 1));
        forged.rules.secure_throne = false;
        forged.phase = GamePhase::GameOver { winner: Player::South, reason: WinReason::Decapitation };
        forged.sequence += 1;
        let err = store.store("fjord", &host.session, &serialize_state(&forged)).unwrap_err();
        assert!(matches!(err, RoomError::InvalidSnapshot(_)));

        // A genuine move with the board edited afterwards.
        let mv = hirdman_step(&store, "B2", Coord::new(6, 1));
        let mut tampered = engine::apply_move(&base, mv).unwrap();
        tampered.board.take(Coord::new(0, 3));
        let err = store.store("fjord", &host.session, &serialize_state(&tampered)).unwrap_err();
        assert!(matches!(err, RoomError::InvalidSnapshot(_)));

        let stored = store.get("fjord").unwrap();
        assert_eq!(stored.status, RoomStatus::Active);
        assert_eq!(stored.state.sequence, base.sequence);
        assert!(stored.state.rules.secure_throne);
    }

    #[tokio::test]
    async fn subscribers_see_each_commit() {
        let (store, host, _guest) = opened();
        let (initial, mut rx) = store.subscribe("fjord").unwrap();
        assert_eq!(initial.status, RoomStatus::Active);
        let mv = hirdman_step(&store, "B2", Coord::new(6, 1));
        store.apply("fjord", &host.session, Action::Move { mv }).unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.state.sequence, initial.state.sequence + 1);
        assert_eq!(update.state.turn, Player::North);
    }
}
