//! Headless scripted client for exercising a running server by hand.
//!
//! Joins a team, optionally places the default flags, prints every event it
//! receives and, once the game starts, wanders randomly before attempting one
//! capture and leaving.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{Command, Event, Position, Team, GRID_SIZE, MAX_CAPTURE_SECS, MIN_CAPTURE_SECS};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Flag layout of the default 7-flag map
const DEFAULT_FLAGS: [Position; 7] = [
    Position::new(3, 9),
    Position::new(6, 4),
    Position::new(6, 15),
    Position::new(10, 9),
    Position::new(13, 4),
    Position::new(13, 15),
    Position::new(16, 9),
];

#[derive(Parser, Debug)]
#[clap(author, version, about = "Scripted capture-the-flag client")]
struct Args {
    /// Server address to connect to
    #[clap(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name
    #[clap(short, long, default_value = "BOT")]
    name: String,

    /// Team to join (red or blue)
    #[clap(short, long, default_value = "red")]
    team: Team,

    /// Send the default flag coordinates after joining
    #[clap(long)]
    send_flags: bool,

    /// Random steps to take once the game starts
    #[clap(long, default_value = "10")]
    steps: u32,

    /// Delay between steps in milliseconds
    #[clap(long, default_value = "300")]
    step_ms: u64,
}

/// Where the server says `name` now stands, given one event
fn tracked_position(name: &str, current: Position, event: &Event) -> Position {
    match event {
        Event::MovePlayer { name: n, position } | Event::RespawnPlayer { name: n, position }
            if n == name =>
        {
            *position
        }
        _ => current,
    }
}

async fn send(writer: &mut OwnedWriteHalf, command: &Command) -> std::io::Result<()> {
    let line = format!("{}\n", command);
    info!("-> {}", line.trim_end());
    writer.write_all(line.as_bytes()).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (reader, mut writer) = stream.into_split();

    // Forward decoded events so the script can wait on them
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Event::parse(&line) {
                Ok(event) => {
                    info!("<- {}", line);
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Unrecognised line '{}': {}", line, e),
            }
        }
        info!("Server closed the connection");
    });

    send(
        &mut writer,
        &Command::TeamSelection {
            team: args.team,
            name: args.name.clone(),
        },
    )
    .await?;

    let mut position = None;
    while let Some(event) = event_rx.recv().await {
        match event {
            Event::SendingPlayer {
                name, position: p, ..
            } if name == args.name => {
                position = Some(p);
                if args.send_flags {
                    send(&mut writer, &Command::FlagCoordinates(DEFAULT_FLAGS.to_vec())).await?;
                }
            }
            Event::StartGame => break,
            _ => {}
        }
    }

    let Some(mut position) = position else {
        warn!("Never received a spawn position, giving up");
        return Ok(());
    };
    info!("Game started, spawned at ({}, {})", position.x, position.y);

    for _ in 0..args.steps {
        // Respawns and our own echoed moves are the server's word on position
        while let Ok(event) = event_rx.try_recv() {
            if let Event::GameOver(winner) = &event {
                info!("Game over ({}), stopping", winner);
                return Ok(());
            }
            position = tracked_position(&args.name, position, &event);
        }

        let (dx, dy) = {
            let mut rng = rand::thread_rng();
            [(0, 1), (0, -1), (1, 0), (-1, 0)][rng.gen_range(0..4)]
        };
        let next = Position::new(
            (position.x + dx).clamp(0, GRID_SIZE - 1),
            (position.y + dy).clamp(0, GRID_SIZE - 1),
        );
        position = next;
        send(
            &mut writer,
            &Command::MovePlayer {
                name: args.name.clone(),
                position,
            },
        )
        .await?;
        sleep(Duration::from_millis(args.step_ms)).await;
    }

    // Sometimes inside the window, sometimes not
    let held = rand::thread_rng().gen_range(MIN_CAPTURE_SECS - 0.5..=MAX_CAPTURE_SECS + 0.5);
    send(
        &mut writer,
        &Command::CaptureDuration {
            name: args.name.clone(),
            flag: "flag1".to_string(),
            seconds: held,
        },
    )
    .await?;
    sleep(Duration::from_millis(500)).await;

    send(
        &mut writer,
        &Command::ExitGame {
            name: args.name.clone(),
        },
    )
    .await?;

    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(1), event_rx.recv()).await
    {
        if event == Event::PlayerLeft(args.name.clone()) {
            break;
        }
    }

    info!("Test client finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_own_respawn_and_moves() {
        let start = Position::new(3, 3);

        let respawn = Event::RespawnPlayer {
            name: "BOT".to_string(),
            position: Position::new(2, 0),
        };
        assert_eq!(tracked_position("BOT", start, &respawn), Position::new(2, 0));

        let moved = Event::MovePlayer {
            name: "BOT".to_string(),
            position: Position::new(4, 3),
        };
        assert_eq!(tracked_position("BOT", start, &moved), Position::new(4, 3));
    }

    #[test]
    fn test_ignores_other_players() {
        let start = Position::new(3, 3);
        let other = Event::RespawnPlayer {
            name: "OTHER".to_string(),
            position: Position::new(17, 19),
        };
        assert_eq!(tracked_position("BOT", start, &other), start);
        assert_eq!(tracked_position("BOT", start, &Event::StartGame), start);
    }
}
