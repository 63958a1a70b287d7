use crate::board::{Board, Coord, PieceKind};
use crate::movegen::{is_square_attacked, raw_moves, Move};
use crate::rules::Ruleset;

/// Legal moves for the piece on `from`.
///
/// Only the Jarl is filtered, and only on its goal throne: with
/// `secure_throne` on, the throne must not be attacked by the opponent on the
/// board as it stands before the move. Every other Jarl destination is legal
/// even when attacked.
pub fn legal_moves_on(board: &Board, rules: &Ruleset, from: Coord) -> Vec<Move> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    let moves = raw_moves(board, from, rules.portals.as_ref());
    if piece.kind != PieceKind::Jarl || !rules.secure_throne {
        return moves;
    }
    let throne = rules.goal_throne(piece.owner);
    let enemy = piece.owner.opponent();
    let mut throne_attacked = None;
    moves
        .into_iter()
        .filter(|mv| {
            mv.to != throne
                || !*throne_attacked.get_or_insert_with(|| {
                    is_square_attacked(board, throne, enemy, rules.portals.as_ref())
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Piece, PieceId, Player};
    use crate::movegen::MoveKind;

    fn put(board: &mut Board, id: u32, owner: Player, kind: PieceKind, at: Coord) {
        board.place(at, Piece { id: PieceId(id), owner, kind }).unwrap();
    }

    const THRONE: Coord = Coord::new(4, 3);

    /// South Jarl one step below the throne, a North Hirdman one step beside it.
    fn guarded_throne() -> Board {
        let mut board = Board::empty(9, 7);
        put(&mut board, 0, Player::South, PieceKind::Jarl, Coord::new(5, 3));
        put(&mut board, 1, Player::North, PieceKind::Hirdman, Coord::new(4, 4));
        put(&mut board, 2, Player::North, PieceKind::Jarl, Coord::new(0, 0));
        board
    }

    #[test]
    fn secure_throne_removes_attacked_throne_step() {
        let board = guarded_throne();
        let moves = legal_moves_on(&board, &Ruleset::seven_column(true), Coord::new(5, 3));
        assert!(!moves.iter().any(|m| m.to == THRONE));
        assert_eq!(moves.len(), 7);
    }

    #[test]
    fn insecure_throne_keeps_attacked_throne_step() {
        let board = guarded_throne();
        let moves = legal_moves_on(&board, &Ruleset::seven_column(false), Coord::new(5, 3));
        assert!(moves.contains(&Move::normal(Coord::new(5, 3), THRONE)));
        assert_eq!(moves.len(), 8);
    }

    #[test]
    fn unattacked_throne_is_legal_with_safety_on() {
        let mut board = guarded_throne();
        board.take(Coord::new(4, 4));
        let moves = legal_moves_on(&board, &Ruleset::seven_column(true), Coord::new(5, 3));
        assert!(moves.iter().any(|m| m.to == THRONE));
    }

    #[test]
    fn jarl_may_step_into_attacked_field_squares() {
        let board = guarded_throne();
        let rules = Ruleset::seven_column(true);
        // (5,4) is attacked by the hirdman on (4,4) but is not the throne.
        assert!(is_square_attacked(&board, Coord::new(5, 4), Player::North, None));
        let moves = legal_moves_on(&board, &rules, Coord::new(5, 3));
        assert!(moves.iter().any(|m| m.to == Coord::new(5, 4)));
    }

    #[test]
    fn other_pieces_are_never_filtered() {
        let mut board = guarded_throne();
        put(&mut board, 3, Player::South, PieceKind::Hirdman, Coord::new(4, 2));
        let rules = Ruleset::seven_column(true);
        let moves = legal_moves_on(&board, &rules, Coord::new(4, 2));
        assert_eq!(moves, raw_moves(&board, Coord::new(4, 2), None));
        assert!(moves.iter().any(|m| m.to == THRONE));
    }

    #[test]
    fn per_player_filter_guards_the_opponents_throne_only() {
        let rules = Ruleset::portal(true);
        let mut board = Board::empty(7, 7);
        // South aims for North's throne at (0,3).
        put(&mut board, 0, Player::South, PieceKind::Jarl, Coord::new(1, 3));
        put(&mut board, 1, Player::North, PieceKind::Hirdman, Coord::new(0, 4));
        put(&mut board, 2, Player::North, PieceKind::Jarl, Coord::new(6, 6));
        let moves = legal_moves_on(&board, &rules, Coord::new(1, 3));
        assert!(!moves.iter().any(|m| m.to == Coord::new(0, 3)));
        assert!(moves.iter().all(|m| m.kind == MoveKind::Normal));
    }
}
