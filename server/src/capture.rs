//! Timed flag capture
//!
//! Clients measure how long the capture key was held and report it. A hold
//! inside the acceptance window takes the flag; anything else, or a flag that
//! is already gone, sends the player back to a spawn slot.

use crate::errors::GameError;
use crate::game::GameState;
use shared::{Position, Team, MAX_CAPTURE_SECS, MIN_CAPTURE_SECS};

pub fn within_window(seconds: f64) -> bool {
    (MIN_CAPTURE_SECS..=MAX_CAPTURE_SECS).contains(&seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    OutsideWindow,
    AlreadyCaptured,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured {
        team: Team,
        /// Other players who were standing on the flag, with their new spawns
        displaced: Vec<(String, Position)>,
    },
    Rejected {
        reason: RejectReason,
        respawn: Position,
    },
}

/// Applies a capture attempt to the world.
///
/// Errors (unknown player or flag, finished game) leave the world untouched.
pub fn resolve(
    game: &mut GameState,
    player: &str,
    flag: &str,
    seconds: f64,
) -> Result<CaptureOutcome, GameError> {
    if game.is_over() {
        return Err(GameError::GameFinished);
    }
    let team = game
        .player(player)
        .map(|p| p.team)
        .ok_or_else(|| GameError::UnknownPlayer(player.to_string()))?;
    let (flag_position, already_captured) = game
        .flag(flag)
        .map(|f| (f.position, f.captured))
        .ok_or_else(|| GameError::UnknownFlag(flag.to_string()))?;

    let reason = if already_captured {
        Some(RejectReason::AlreadyCaptured)
    } else if !within_window(seconds) {
        Some(RejectReason::OutsideWindow)
    } else {
        None
    };

    if let Some(reason) = reason {
        let respawn = game.respawn(player)?;
        return Ok(CaptureOutcome::Rejected { reason, respawn });
    }

    game.capture_flag(flag, team)?;

    let mut displaced = Vec::new();
    for other in game.players_at(flag_position) {
        if other == player {
            continue;
        }
        let position = game.respawn(&other)?;
        displaced.push((other, position));
    }

    Ok(CaptureOutcome::Captured { team, displaced })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with_flag_at(position: Position) -> GameState {
        let mut game = GameState::new();
        let mut flags = vec![position];
        flags.extend((1..7).map(|i| Position::new(i, 10)));
        game.set_flags(&flags, 7).unwrap();
        game
    }

    #[test]
    fn test_window_is_inclusive() {
        assert!(within_window(3.0));
        assert!(within_window(3.5));
        assert!(within_window(4.0));
        assert!(!within_window(2.99));
        assert!(!within_window(4.01));
        assert!(!within_window(f64::NAN));
        assert!(!within_window(-3.5));
    }

    #[test]
    fn test_successful_capture() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "ABC").unwrap();
        game.move_player("ABC", Position::new(5, 5)).unwrap();

        let outcome = resolve(&mut game, "ABC", "flag1", 3.5).unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Captured {
                team: Team::Red,
                displaced: vec![]
            }
        );
        assert_eq!(game.flag_counts(), (1, 0));
        assert!(game.flag("flag1").unwrap().captured);
        assert_eq!(game.player("ABC").unwrap().position, Position::new(5, 5));
    }

    #[test]
    fn test_boundaries_succeed() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Blue, "B").unwrap();

        assert!(matches!(
            resolve(&mut game, "B", "flag1", 3.0),
            Ok(CaptureOutcome::Captured { .. })
        ));
        assert!(matches!(
            resolve(&mut game, "B", "flag2", 4.0),
            Ok(CaptureOutcome::Captured { .. })
        ));
        assert_eq!(game.flag_counts(), (0, 2));
    }

    #[test]
    fn test_short_hold_respawns_player() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();
        game.move_player("A", Position::new(5, 5)).unwrap();

        let outcome = resolve(&mut game, "A", "flag1", 2.99).unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Rejected {
                reason: RejectReason::OutsideWindow,
                respawn: Position::new(2, 0)
            }
        );
        assert_eq!(game.player("A").unwrap().position, Position::new(2, 0));
        assert!(!game.flag("flag1").unwrap().captured);
        assert_eq!(game.flag_counts(), (0, 0));
    }

    #[test]
    fn test_long_hold_respawns_player() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();
        let outcome = resolve(&mut game, "A", "flag1", 4.01).unwrap();
        assert!(matches!(
            outcome,
            CaptureOutcome::Rejected {
                reason: RejectReason::OutsideWindow,
                ..
            }
        ));
    }

    #[test]
    fn test_already_captured_flag_respawns_attempter() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();
        game.add_player(Team::Blue, "B").unwrap();
        resolve(&mut game, "A", "flag1", 3.5).unwrap();

        game.move_player("B", Position::new(5, 5)).unwrap();
        let outcome = resolve(&mut game, "B", "flag1", 3.5).unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Rejected {
                reason: RejectReason::AlreadyCaptured,
                respawn: Position::new(2, 19)
            }
        );
        assert_eq!(game.flag_counts(), (1, 0));
    }

    #[test]
    fn test_capture_displaces_other_occupants() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();
        game.add_player(Team::Blue, "B").unwrap();
        game.move_player("A", Position::new(5, 5)).unwrap();
        game.move_player("B", Position::new(5, 5)).unwrap();

        let outcome = resolve(&mut game, "A", "flag1", 3.2).unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Captured {
                team: Team::Red,
                displaced: vec![("B".to_string(), Position::new(2, 19))]
            }
        );
        assert_eq!(game.player("A").unwrap().position, Position::new(5, 5));
        assert_eq!(game.player("B").unwrap().position, Position::new(2, 19));
    }

    #[test]
    fn test_unknown_flag_and_player_are_errors() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();

        assert_eq!(
            resolve(&mut game, "A", "flag42", 3.5),
            Err(GameError::UnknownFlag("flag42".to_string()))
        );
        assert_eq!(
            resolve(&mut game, "ghost", "flag1", 3.5),
            Err(GameError::UnknownPlayer("ghost".to_string()))
        );
        assert_eq!(game.flag_counts(), (0, 0));
    }

    #[test]
    fn test_no_capture_after_game_over() {
        let mut game = game_with_flag_at(Position::new(5, 5));
        game.add_player(Team::Red, "A").unwrap();
        game.mark_over();

        assert_eq!(
            resolve(&mut game, "A", "flag1", 3.5),
            Err(GameError::GameFinished)
        );
        assert!(!game.flag("flag1").unwrap().captured);
    }
}
