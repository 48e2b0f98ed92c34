//! Line-oriented text protocol shared by the capture-the-flag server and its clients.
//!
//! Every message is a single UTF-8 line of space-separated tokens. The first
//! token names the message; the rest are its arguments. Encoding is the
//! `Display` impl of [`Command`] and [`Event`] (no trailing newline, the
//! transport appends `\n`), decoding is [`Command::parse`] / [`Event::parse`].
//!
//! The codec only checks shape: token counts, numbers and enum names. Whether a
//! player exists, a coordinate is on the grid or a command is allowed in the
//! current session state is for the server to decide.

use std::fmt;
use std::str::FromStr;

pub const GRID_SIZE: i32 = 20;
pub const MIN_CAPTURE_SECS: f64 = 3.0;
pub const MAX_CAPTURE_SECS: f64 = 4.0;
pub const WIN_THRESHOLD: u32 = 4;
pub const DEFAULT_FLAG_COUNT: usize = 7;
pub const DEFAULT_MIN_PLAYERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Team::Red),
            "blue" => Ok(Team::Blue),
            other => Err(ParseError::InvalidTeam(other.to_string())),
        }
    }
}

/// Result of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Team(Team),
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Team(team) => write!(f, "{}", team),
            Winner::Tie => f.write_str("tie"),
        }
    }
}

impl FromStr for Winner {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tie" => Ok(Winner::Tie),
            other => other
                .parse::<Team>()
                .map(Winner::Team)
                .map_err(|_| ParseError::InvalidWinner(other.to_string())),
        }
    }
}

/// Grid cell as it appears on the wire: `x` is the row, `y` the column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument {
        command: &'static str,
        expected: usize,
        found: usize,
    },
    InvalidNumber {
        field: &'static str,
        value: String,
    },
    InvalidTeam(String),
    InvalidWinner(String),
    OddCoordinateCount(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty line"),
            ParseError::UnknownCommand(name) => write!(f, "unknown message '{}'", name),
            ParseError::MissingArgument {
                command,
                expected,
                found,
            } => write!(
                f,
                "{} expects {} arguments, got {}",
                command, expected, found
            ),
            ParseError::InvalidNumber { field, value } => {
                write!(f, "field '{}' is not a number: '{}'", field, value)
            }
            ParseError::InvalidTeam(team) => write!(f, "unknown team '{}'", team),
            ParseError::InvalidWinner(winner) => write!(f, "unknown winner '{}'", winner),
            ParseError::OddCoordinateCount(n) => {
                write!(f, "flag coordinates must come in pairs, got {} values", n)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A line split into its message name and raw arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

impl<'a> RawLine<'a> {
    fn require(&self, command: &'static str, expected: usize) -> Result<(), ParseError> {
        if self.args.len() < expected {
            return Err(ParseError::MissingArgument {
                command,
                expected,
                found: self.args.len(),
            });
        }
        Ok(())
    }
}

/// Splits a line on whitespace. Blank lines yield `None`.
pub fn tokenize(line: &str) -> Option<RawLine<'_>> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    Some(RawLine {
        name,
        args: tokens.collect(),
    })
}

fn parse_int(field: &'static str, value: &str) -> Result<i32, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_count(field: &'static str, value: &str) -> Result<usize, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_position(x: &str, y: &str) -> Result<Position, ParseError> {
    Ok(Position::new(parse_int("x", x)?, parse_int("y", y)?))
}

/// Messages sent by clients to the server
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TeamSelection { team: Team, name: String },
    MovePlayer { name: String, position: Position },
    FlagCoordinates(Vec<Position>),
    CaptureDuration { name: String, flag: String, seconds: f64 },
    TellMeTheCurrentPlayers,
    ResendPlayers,
    ExitGame { name: String },
    GameOver { winner: Option<Winner> },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let raw = tokenize(line).ok_or(ParseError::Empty)?;
        let args = &raw.args;

        match raw.name {
            "teamSelection" => {
                raw.require("teamSelection", 2)?;
                Ok(Command::TeamSelection {
                    team: args[0].parse()?,
                    name: args[1].to_string(),
                })
            }
            "movePlayer" => {
                raw.require("movePlayer", 3)?;
                Ok(Command::MovePlayer {
                    name: args[0].to_string(),
                    position: parse_position(args[1], args[2])?,
                })
            }
            "flagCoordinates" => {
                if args.len() % 2 != 0 {
                    return Err(ParseError::OddCoordinateCount(args.len()));
                }
                let positions = args
                    .chunks(2)
                    .map(|pair| parse_position(pair[0], pair[1]))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Command::FlagCoordinates(positions))
            }
            "captureDuration" => {
                raw.require("captureDuration", 3)?;
                let seconds = args[2].parse().map_err(|_| ParseError::InvalidNumber {
                    field: "seconds",
                    value: args[2].to_string(),
                })?;
                Ok(Command::CaptureDuration {
                    name: args[0].to_string(),
                    flag: args[1].to_string(),
                    seconds,
                })
            }
            "tellMeTheCurrentPlayers" => Ok(Command::TellMeTheCurrentPlayers),
            "resendPlayers" => Ok(Command::ResendPlayers),
            "exitGame" => {
                raw.require("exitGame", 1)?;
                Ok(Command::ExitGame {
                    name: args[0].to_string(),
                })
            }
            "gameOver" => {
                let winner = args.first().map(|w| w.parse()).transpose()?;
                Ok(Command::GameOver { winner })
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::TeamSelection { team, name } => write!(f, "teamSelection {} {}", team, name),
            Command::MovePlayer { name, position } => {
                write!(f, "movePlayer {} {} {}", name, position.x, position.y)
            }
            Command::FlagCoordinates(positions) => {
                f.write_str("flagCoordinates")?;
                for p in positions {
                    write!(f, " {} {}", p.x, p.y)?;
                }
                Ok(())
            }
            Command::CaptureDuration {
                name,
                flag,
                seconds,
            } => write!(f, "captureDuration {} {} {}", name, flag, seconds),
            Command::TellMeTheCurrentPlayers => f.write_str("tellMeTheCurrentPlayers"),
            Command::ResendPlayers => f.write_str("resendPlayers"),
            Command::ExitGame { name } => write!(f, "exitGame {}", name),
            Command::GameOver { winner: Some(w) } => write!(f, "gameOver {}", w),
            Command::GameOver { winner: None } => f.write_str("gameOver"),
        }
    }
}

/// Messages sent by the server to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartGame,
    NewPlayer { team: Team, position: Position, name: String },
    UpdateCount(usize),
    SendingPlayer { name: String, team: Team, position: Position },
    ShowPlayerJoined { team: Team, name: String },
    SizeOfPlayersIs(usize),
    MovePlayer { name: String, position: Position },
    FlagCaptured { name: String, flag: String },
    LockFlag(String),
    RespawnPlayer { name: String, position: Position },
    PlayerLeft(String),
    GameOver(Winner),
}

impl Event {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let raw = tokenize(line).ok_or(ParseError::Empty)?;
        let args = &raw.args;

        match raw.name {
            "startGame" => Ok(Event::StartGame),
            "newPlayer" => {
                raw.require("newPlayer", 4)?;
                Ok(Event::NewPlayer {
                    team: args[0].parse()?,
                    position: parse_position(args[1], args[2])?,
                    name: args[3].to_string(),
                })
            }
            "updateCount" => {
                raw.require("updateCount", 1)?;
                Ok(Event::UpdateCount(parse_count("count", args[0])?))
            }
            "sendingPlayer" => {
                raw.require("sendingPlayer", 4)?;
                Ok(Event::SendingPlayer {
                    name: args[0].to_string(),
                    team: args[1].parse()?,
                    position: parse_position(args[2], args[3])?,
                })
            }
            "showPlayerJoined" => {
                raw.require("showPlayerJoined", 2)?;
                Ok(Event::ShowPlayerJoined {
                    team: args[0].parse()?,
                    name: args[1].to_string(),
                })
            }
            "sizeOfPlayersIs" => {
                raw.require("sizeOfPlayersIs", 1)?;
                Ok(Event::SizeOfPlayersIs(parse_count("size", args[0])?))
            }
            "movePlayer" => {
                raw.require("movePlayer", 3)?;
                Ok(Event::MovePlayer {
                    name: args[0].to_string(),
                    position: parse_position(args[1], args[2])?,
                })
            }
            "flagCaptured" => {
                raw.require("flagCaptured", 2)?;
                Ok(Event::FlagCaptured {
                    name: args[0].to_string(),
                    flag: args[1].to_string(),
                })
            }
            "lockFlag" => {
                raw.require("lockFlag", 1)?;
                Ok(Event::LockFlag(args[0].to_string()))
            }
            "respawnPlayer" => {
                raw.require("respawnPlayer", 3)?;
                Ok(Event::RespawnPlayer {
                    name: args[0].to_string(),
                    position: parse_position(args[1], args[2])?,
                })
            }
            "playerLeft" => {
                raw.require("playerLeft", 1)?;
                Ok(Event::PlayerLeft(args[0].to_string()))
            }
            "gameOver" => {
                raw.require("gameOver", 1)?;
                Ok(Event::GameOver(args[0].parse()?))
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StartGame => f.write_str("startGame"),
            Event::NewPlayer {
                team,
                position,
                name,
            } => write!(f, "newPlayer {} {} {} {}", team, position.x, position.y, name),
            Event::UpdateCount(n) => write!(f, "updateCount {}", n),
            Event::SendingPlayer {
                name,
                team,
                position,
            } => write!(
                f,
                "sendingPlayer {} {} {} {}",
                name, team, position.x, position.y
            ),
            Event::ShowPlayerJoined { team, name } => write!(f, "showPlayerJoined {} {}", team, name),
            Event::SizeOfPlayersIs(n) => write!(f, "sizeOfPlayersIs {}", n),
            Event::MovePlayer { name, position } => {
                write!(f, "movePlayer {} {} {}", name, position.x, position.y)
            }
            Event::FlagCaptured { name, flag } => write!(f, "flagCaptured {} {}", name, flag),
            Event::LockFlag(flag) => write!(f, "lockFlag {}", flag),
            Event::RespawnPlayer { name, position } => {
                write!(f, "respawnPlayer {} {} {}", name, position.x, position.y)
            }
            Event::PlayerLeft(name) => write!(f, "playerLeft {}", name),
            Event::GameOver(winner) => write!(f, "gameOver {}", winner),
        }
    }
}
