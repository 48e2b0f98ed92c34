use shared::Position;
use std::fmt;

/// Reasons a command was refused by the world state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// A player with this name is already on the roster.
    DuplicatePlayer(String),
    UnknownPlayer(String),
    UnknownFlag(String),
    /// Coordinates fall outside the grid.
    OutOfBounds(Position),
    /// The flag roster for this game has already been created.
    FlagsAlreadySet,
    FlagCountMismatch { expected: usize, found: usize },
    /// Refused decrement of the live-player count below zero.
    LiveCountUnderflow,
    /// The game has already been decided.
    GameFinished,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::DuplicatePlayer(name) => write!(f, "player '{}' already exists", name),
            GameError::UnknownPlayer(name) => write!(f, "no player named '{}'", name),
            GameError::UnknownFlag(name) => write!(f, "no flag named '{}'", name),
            GameError::OutOfBounds(p) => write!(f, "position ({}, {}) is off the grid", p.x, p.y),
            GameError::FlagsAlreadySet => write!(f, "flags have already been placed"),
            GameError::FlagCountMismatch { expected, found } => {
                write!(f, "expected {} flags, got {}", expected, found)
            }
            GameError::LiveCountUnderflow => write!(f, "live player count is already zero"),
            GameError::GameFinished => write!(f, "game is over"),
        }
    }
}

impl std::error::Error for GameError {}

/// Invalid startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroMinPlayers,
    ZeroFlags,
    ZeroMaxClients,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMinPlayers => write!(f, "minimum players must be at least 1"),
            ConfigError::ZeroFlags => write!(f, "flag count must be at least 1"),
            ConfigError::ZeroMaxClients => write!(f, "max clients must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
