//! Authoritative world state: roster, flags and team counters
//!
//! `GameState` is plain data with no locking of its own. The server keeps it
//! behind a single mutex, so every method here runs as one atomic step with
//! respect to other sessions.

use crate::errors::GameError;
use crate::spawn;
use log::{error, info};
use shared::{Position, Team};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub team: Team,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub position: Position,
    pub captured: bool,
}

/// Point-in-time copy of the world, used for resync replies and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Sorted by name
    pub players: Vec<Player>,
    pub flags: Vec<Flag>,
    pub red_flags: u32,
    pub blue_flags: u32,
    pub live_count: usize,
    pub started: bool,
    pub over: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GameState {
    players: HashMap<String, Player>,
    flags: Vec<Flag>,
    red_flags: u32,
    blue_flags: u32,
    live_count: usize,
    started: bool,
    over: bool,
}

impl GameState {
    /// Creates an empty world: no players, no flags, game not started
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a player on the first free spawn slot of its team.
    ///
    /// Names are unique across both teams; a clash leaves the roster as it
    /// was and returns `DuplicatePlayer`.
    pub fn add_player(&mut self, team: Team, name: &str) -> Result<Player, GameError> {
        if self.players.contains_key(name) {
            return Err(GameError::DuplicatePlayer(name.to_string()));
        }

        let occupied = self.players.values().map(|p| p.position);
        let position = spawn::initial_spawn(team, occupied);

        let player = Player {
            name: name.to_string(),
            team,
            position,
        };

        info!(
            "Added player {} to {} at ({}, {})",
            name, team, position.x, position.y
        );
        self.players.insert(name.to_string(), player.clone());
        Ok(player)
    }

    /// Updates a player's position
    ///
    /// Off-grid coordinates are rejected before the roster is consulted, and
    /// a rejected move leaves the old position untouched.
    pub fn move_player(&mut self, name: &str, position: Position) -> Result<(), GameError> {
        if !position.in_bounds() {
            return Err(GameError::OutOfBounds(position));
        }
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
        player.position = position;
        Ok(())
    }

    /// Removes a player from the roster, freeing their spawn slot.
    ///
    /// The live count is left to the caller so that a refused decrement can
    /// be logged where the departure is handled.
    pub fn remove_player(&mut self, name: &str) -> Option<Player> {
        let player = self.players.remove(name)?;
        info!("Removed player {}", name);
        Some(player)
    }

    /// Creates the flag roster, named `flag1`..`flagN` in the given order
    pub fn set_flags(&mut self, positions: &[Position], expected: usize) -> Result<(), GameError> {
        if !self.flags.is_empty() {
            return Err(GameError::FlagsAlreadySet);
        }
        if positions.len() != expected {
            return Err(GameError::FlagCountMismatch {
                expected,
                found: positions.len(),
            });
        }
        if let Some(bad) = positions.iter().find(|p| !p.in_bounds()) {
            return Err(GameError::OutOfBounds(*bad));
        }

        self.flags = positions
            .iter()
            .enumerate()
            .map(|(i, position)| Flag {
                name: format!("flag{}", i + 1),
                position: *position,
                captured: false,
            })
            .collect();
        info!("Placed {} flags", self.flags.len());
        Ok(())
    }

    /// Moves a player to the first free slot of its team
    pub fn respawn(&mut self, name: &str) -> Result<Position, GameError> {
        let team = self
            .players
            .get(name)
            .map(|p| p.team)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

        let occupied = self
            .players
            .values()
            .filter(|p| p.name != name)
            .map(|p| p.position);
        let position = spawn::respawn_position(team, occupied);

        if let Some(player) = self.players.get_mut(name) {
            player.position = position;
        }
        Ok(position)
    }

    /// Looks up a player by name
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    /// Looks up a flag by its `flagN` name
    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Names of players standing on `position`, sorted
    pub fn players_at(&self, position: Position) -> Vec<String> {
        let mut names: Vec<String> = self
            .players
            .values()
            .filter(|p| p.position == position)
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Marks a flag captured and credits `team`. Returns false if the flag
    /// was already taken.
    pub fn capture_flag(&mut self, flag: &str, team: Team) -> Result<bool, GameError> {
        let flag = self
            .flags
            .iter_mut()
            .find(|f| f.name == flag)
            .ok_or_else(|| GameError::UnknownFlag(flag.to_string()))?;
        if flag.captured {
            return Ok(false);
        }
        flag.captured = true;
        match team {
            Team::Red => self.red_flags += 1,
            Team::Blue => self.blue_flags += 1,
        }
        Ok(true)
    }

    /// Captured flags per team as (red, blue)
    ///
    /// These counters only ever grow; the win check runs against them after
    /// every successful capture.
    pub fn flag_counts(&self) -> (u32, u32) {
        (self.red_flags, self.blue_flags)
    }

    /// Counts one more live player and returns the new total
    ///
    /// Tracked separately from the roster because it is what `updateCount`
    /// reports and what decides whether the server may exit when empty.
    pub fn join_live(&mut self) -> usize {
        self.live_count += 1;
        self.live_count
    }

    /// Counts one live player fewer and returns the new total
    ///
    /// Refuses to go below zero: the count is left as it is and
    /// `LiveCountUnderflow` is returned, so a cleanup that runs twice cannot
    /// corrupt it.
    pub fn leave_live(&mut self) -> Result<usize, GameError> {
        if self.live_count == 0 {
            error!("Refusing to decrement live player count below zero");
            return Err(GameError::LiveCountUnderflow);
        }
        self.live_count -= 1;
        Ok(self.live_count)
    }

    /// Current live player count
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of players in the roster
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Latches the started flag. Returns true only on the first call.
    pub fn mark_started(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    /// Whether `startGame` has been broadcast
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Latches the game-over flag. Returns true only on the first call.
    pub fn mark_over(&mut self) -> bool {
        !std::mem::replace(&mut self.over, true)
    }

    /// Whether `gameOver` has been broadcast
    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Consistent copy of the whole world
    ///
    /// Players are sorted by name so that replies built from it, such as
    /// `resendPlayers`, come out in a stable order.
    pub fn snapshot(&self) -> Snapshot {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        Snapshot {
            players,
            flags: self.flags.clone(),
            red_flags: self.red_flags,
            blue_flags: self.blue_flags,
            live_count: self.live_count,
            started: self.started,
            over: self.over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven_flags() -> Vec<Position> {
        (0..7).map(|i| Position::new(5 + i, 5)).collect()
    }

    #[test]
    fn test_add_player_assigns_team_slots() {
        let mut game = GameState::new();
        let a = game.add_player(Team::Red, "A").unwrap();
        let b = game.add_player(Team::Red, "B").unwrap();
        let c = game.add_player(Team::Blue, "C").unwrap();

        assert_eq!(a.position, Position::new(2, 0));
        assert_eq!(b.position, Position::new(17, 0));
        assert_eq!(c.position, Position::new(2, 19));
        assert_eq!(game.player_count(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut game = GameState::new();
        game.add_player(Team::Red, "A").unwrap();
        let err = game.add_player(Team::Blue, "A").unwrap_err();

        assert_eq!(err, GameError::DuplicatePlayer("A".to_string()));
        assert_eq!(game.player_count(), 1);
        assert_eq!(game.player("A").unwrap().team, Team::Red);
    }

    #[test]
    fn test_move_player() {
        let mut game = GameState::new();
        game.add_player(Team::Red, "A").unwrap();

        game.move_player("A", Position::new(5, 6)).unwrap();
        assert_eq!(game.player("A").unwrap().position, Position::new(5, 6));

        assert_eq!(
            game.move_player("A", Position::new(20, 6)),
            Err(GameError::OutOfBounds(Position::new(20, 6)))
        );
        assert_eq!(game.player("A").unwrap().position, Position::new(5, 6));

        assert_eq!(
            game.move_player("nobody", Position::new(1, 1)),
            Err(GameError::UnknownPlayer("nobody".to_string()))
        );
    }

    #[test]
    fn test_remove_player_frees_slot() {
        let mut game = GameState::new();
        game.add_player(Team::Blue, "A").unwrap();
        assert!(game.remove_player("A").is_some());
        assert!(game.remove_player("A").is_none());

        let b = game.add_player(Team::Blue, "B").unwrap();
        assert_eq!(b.position, Position::new(2, 19));
    }

    #[test]
    fn test_join_after_first_slot_leaves_takes_first_slot() {
        let mut game = GameState::new();
        game.add_player(Team::Red, "A").unwrap();
        let b = game.add_player(Team::Red, "B").unwrap();
        game.remove_player("A").unwrap();

        let c = game.add_player(Team::Red, "C").unwrap();
        assert_eq!(c.position, Position::new(2, 0));
        assert_eq!(game.player("B").unwrap().position, b.position);
        assert_ne!(c.position, b.position);
    }

    #[test]
    fn test_third_same_team_player_shares_last_slot() {
        let mut game = GameState::new();
        game.add_player(Team::Blue, "A").unwrap();
        game.add_player(Team::Blue, "B").unwrap();
        let c = game.add_player(Team::Blue, "C").unwrap();
        assert_eq!(c.position, Position::new(17, 19));
    }

    #[test]
    fn test_set_flags_once() {
        let mut game = GameState::new();
        game.set_flags(&seven_flags(), 7).unwrap();

        let snapshot = game.snapshot();
        assert_eq!(snapshot.flags.len(), 7);
        assert_eq!(snapshot.flags[0].name, "flag1");
        assert_eq!(snapshot.flags[6].name, "flag7");
        assert!(snapshot.flags.iter().all(|f| !f.captured));

        assert_eq!(
            game.set_flags(&seven_flags(), 7),
            Err(GameError::FlagsAlreadySet)
        );
        assert_eq!(game.snapshot().flags.len(), 7);
    }

    #[test]
    fn test_set_flags_validates_input() {
        let mut game = GameState::new();
        assert_eq!(
            game.set_flags(&seven_flags()[..3], 7),
            Err(GameError::FlagCountMismatch {
                expected: 7,
                found: 3
            })
        );

        let mut positions = seven_flags();
        positions[2] = Position::new(-1, 3);
        assert_eq!(
            game.set_flags(&positions, 7),
            Err(GameError::OutOfBounds(Position::new(-1, 3)))
        );
        assert!(game.snapshot().flags.is_empty());
    }

    #[test]
    fn test_capture_flag_is_monotonic() {
        let mut game = GameState::new();
        game.set_flags(&seven_flags(), 7).unwrap();

        assert_eq!(game.capture_flag("flag1", Team::Red), Ok(true));
        assert_eq!(game.capture_flag("flag1", Team::Blue), Ok(false));
        assert_eq!(game.flag_counts(), (1, 0));
        assert!(game.flag("flag1").unwrap().captured);
        assert_eq!(
            game.capture_flag("flag99", Team::Red),
            Err(GameError::UnknownFlag("flag99".to_string()))
        );
    }

    #[test]
    fn test_respawn_skips_occupied_slot() {
        let mut game = GameState::new();
        game.add_player(Team::Red, "A").unwrap();
        game.add_player(Team::Red, "B").unwrap();
        game.move_player("B", Position::new(5, 5)).unwrap();

        // A still stands on slot 1
        assert_eq!(game.respawn("B"), Ok(Position::new(17, 0)));
        assert_eq!(game.player("B").unwrap().position, Position::new(17, 0));
    }

    #[test]
    fn test_respawn_ignores_own_position() {
        let mut game = GameState::new();
        game.add_player(Team::Blue, "A").unwrap();
        assert_eq!(game.respawn("A"), Ok(Position::new(2, 19)));
    }

    #[test]
    fn test_live_count_never_negative() {
        let mut game = GameState::new();
        assert_eq!(game.leave_live(), Err(GameError::LiveCountUnderflow));
        assert_eq!(game.join_live(), 1);
        assert_eq!(game.leave_live(), Ok(0));
        assert_eq!(game.live_count(), 0);
    }

    #[test]
    fn test_latches_fire_once() {
        let mut game = GameState::new();
        assert!(game.mark_started());
        assert!(!game.mark_started());
        assert!(game.is_started());

        assert!(game.mark_over());
        assert!(!game.mark_over());
        assert!(game.is_over());
    }

    #[test]
    fn test_snapshot_sorted_by_name() {
        let mut game = GameState::new();
        game.add_player(Team::Red, "zed").unwrap();
        game.add_player(Team::Blue, "amy").unwrap();
        game.join_live();
        game.join_live();

        let snapshot = game.snapshot();
        let names: Vec<&str> = snapshot.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(snapshot.live_count, 2);
        assert!(!snapshot.started);
    }
}
