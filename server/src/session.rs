//! Per-connection session and protocol dispatch
//!
//! Each connection runs [`serve`]: a read loop that decodes one command per
//! line and hands it to the [`Hub`], plus a writer task that drains the
//! connection's outbound channel. The command handlers below are plain
//! functions over [`ServerState`]; the hub calls them with its lock held and
//! fans the resulting [`Outbox`] out before releasing it.

use crate::capture::{self, CaptureOutcome};
use crate::client_manager::SessionState;
use crate::config::ServerConfig;
use crate::errors::GameError;
use crate::network::{Hub, ServerState};
use crate::win;
use log::{debug, error, info, warn};
use shared::{Command, Event, Position, Team, Winner};
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;

/// Recipients of an outgoing event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(u32),
    Only(u32),
}

/// Ordered events produced by one command
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(Audience, Event)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&mut self, event: Event) {
        self.messages.push((Audience::All, event));
    }

    pub fn broadcast_except(&mut self, client_id: u32, event: Event) {
        self.messages.push((Audience::AllExcept(client_id), event));
    }

    pub fn send_to(&mut self, client_id: u32, event: Event) {
        self.messages.push((Audience::Only(client_id), event));
    }

    pub fn messages(&self) -> &[(Audience, Event)] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Result of handling one command
#[derive(Debug, Default)]
pub struct Dispatch {
    pub outbox: Outbox,
    /// The session should end after delivery
    pub close: bool,
    /// The last player has left and the server should stop
    pub shutdown: bool,
}

pub fn handle_command(
    state: &mut ServerState,
    config: &ServerConfig,
    client_id: u32,
    command: Command,
) -> Dispatch {
    let mut dispatch = Dispatch::default();

    let session = match state.clients.session_state(client_id) {
        Some(session) => session,
        None => {
            warn!("Command from unregistered client {}", client_id);
            return dispatch;
        }
    };

    match command {
        Command::TeamSelection { team, name } => {
            team_selection(state, config, client_id, &session, team, &name, &mut dispatch.outbox)
        }
        Command::MovePlayer { name, position } => {
            if require_own_player(client_id, &session, &name, "movePlayer") {
                move_player(state, name, position, &mut dispatch.outbox);
            }
        }
        Command::FlagCoordinates(positions) => {
            match state.game.set_flags(&positions, config.flag_count) {
                Ok(()) => {}
                Err(GameError::FlagsAlreadySet) => {
                    debug!("Flags already placed, ignoring coordinates from client {}", client_id)
                }
                Err(e) => warn!("Rejected flagCoordinates from client {}: {}", client_id, e),
            }
        }
        Command::CaptureDuration {
            name,
            flag,
            seconds,
        } => {
            if require_own_player(client_id, &session, &name, "captureDuration") {
                capture_duration(state, &name, &flag, seconds, &mut dispatch.outbox);
            }
        }
        Command::TellMeTheCurrentPlayers => {
            let size = state.game.player_count();
            dispatch.outbox.send_to(client_id, Event::SizeOfPlayersIs(size));
        }
        Command::ResendPlayers => resend_players(state, client_id, &mut dispatch.outbox),
        Command::ExitGame { name } => {
            if require_joined(client_id, &session, "exitGame") {
                exit_game(state, config, &session, &name, &mut dispatch);
            }
        }
        Command::GameOver { winner } => game_over(state, winner, &mut dispatch.outbox),
    }

    dispatch
}

/// Cleans up after a connection that went away
pub fn handle_disconnect(state: &mut ServerState, client_id: u32) -> Outbox {
    let mut outbox = Outbox::new();

    let Some(client) = state.clients.remove_client(&client_id) else {
        return outbox;
    };
    let Some(name) = client.player else {
        return outbox;
    };

    if state.game.remove_player(&name).is_some() {
        let remaining = leave_live(state);
        outbox.broadcast(Event::PlayerLeft(name));
        outbox.broadcast(Event::UpdateCount(remaining));
    }
    outbox
}

fn require_joined(client_id: u32, session: &SessionState, command: &str) -> bool {
    if let SessionState::Joined(_) = session {
        return true;
    }
    warn!(
        "Client {} sent {} before selecting a team, ignoring",
        client_id, command
    );
    false
}

/// Moves and captures may only be reported for the session's own player
fn require_own_player(
    client_id: u32,
    session: &SessionState,
    name: &str,
    command: &str,
) -> bool {
    match session {
        SessionState::Joined(own) if own == name => true,
        SessionState::Joined(own) => {
            warn!(
                "Client {} joined as {} sent {} for {}, ignoring",
                client_id, own, command, name
            );
            false
        }
        SessionState::Connected => require_joined(client_id, session, command),
    }
}

fn leave_live(state: &mut ServerState) -> usize {
    match state.game.leave_live() {
        Ok(remaining) => remaining,
        Err(e) => {
            error!("Live count out of sync with roster: {}", e);
            state.game.live_count()
        }
    }
}

fn team_selection(
    state: &mut ServerState,
    config: &ServerConfig,
    client_id: u32,
    session: &SessionState,
    team: Team,
    name: &str,
    outbox: &mut Outbox,
) {
    if let SessionState::Joined(current) = session {
        warn!(
            "Client {} already joined as {}, ignoring teamSelection",
            client_id, current
        );
        return;
    }

    let player = match state.game.add_player(team, name) {
        Ok(player) => player,
        Err(e) => {
            warn!("Rejected teamSelection from client {}: {}", client_id, e);
            return;
        }
    };
    state.clients.bind_player(client_id, &player.name);
    let live = state.game.join_live();

    outbox.send_to(
        client_id,
        Event::SendingPlayer {
            name: player.name.clone(),
            team,
            position: player.position,
        },
    );
    outbox.broadcast(Event::UpdateCount(live));
    outbox.broadcast_except(
        client_id,
        Event::ShowPlayerJoined {
            team,
            name: player.name.clone(),
        },
    );

    if state.game.is_started() {
        info!("{} joined a game already in progress", player.name);
        outbox.send_to(client_id, Event::StartGame);
        for other in state.game.snapshot().players {
            if other.name != player.name {
                outbox.send_to(client_id, new_player(other.team, other.position, other.name));
            }
        }
        outbox.broadcast(new_player(team, player.position, player.name));
        return;
    }

    let joined = state.game.player_count();
    if joined >= config.min_players && state.game.mark_started() {
        info!("Starting game with {} players", joined);
        outbox.broadcast(Event::StartGame);
        for p in state.game.snapshot().players {
            outbox.broadcast(new_player(p.team, p.position, p.name));
        }
    }
}

fn new_player(team: Team, position: Position, name: String) -> Event {
    Event::NewPlayer {
        team,
        position,
        name,
    }
}

fn move_player(state: &mut ServerState, name: String, position: Position, outbox: &mut Outbox) {
    match state.game.move_player(&name, position) {
        Ok(()) => outbox.broadcast(Event::MovePlayer { name, position }),
        Err(e) => warn!("Dropping movePlayer: {}", e),
    }
}

fn respawn_events(outbox: &mut Outbox, name: String, position: Position) {
    outbox.broadcast(Event::RespawnPlayer {
        name: name.clone(),
        position,
    });
    // Older clients only reposition on movePlayer
    outbox.broadcast(Event::MovePlayer { name, position });
}

fn capture_duration(
    state: &mut ServerState,
    name: &str,
    flag: &str,
    seconds: f64,
    outbox: &mut Outbox,
) {
    match capture::resolve(&mut state.game, name, flag, seconds) {
        Ok(CaptureOutcome::Captured { team, displaced }) => {
            let (red, blue) = state.game.flag_counts();
            info!(
                "{} captured {} for {} (red {} - blue {})",
                name, flag, team, red, blue
            );
            outbox.broadcast(Event::FlagCaptured {
                name: name.to_string(),
                flag: flag.to_string(),
            });
            outbox.broadcast(Event::LockFlag(flag.to_string()));
            for (other, position) in displaced {
                respawn_events(outbox, other, position);
            }

            if let Some(winner) = win::check_winner(red, blue) {
                if state.game.mark_over() {
                    info!("Team {} wins", winner);
                    outbox.broadcast(Event::GameOver(Winner::Team(winner)));
                }
            }
        }
        Ok(CaptureOutcome::Rejected { reason, respawn }) => {
            info!(
                "{} failed to capture {} ({:?}, held {:.2}s)",
                name, flag, reason, seconds
            );
            respawn_events(outbox, name.to_string(), respawn);
        }
        Err(e) => warn!("Dropping captureDuration: {}", e),
    }
}

fn resend_players(state: &ServerState, client_id: u32, outbox: &mut Outbox) {
    let snapshot = state.game.snapshot();
    for p in snapshot.players {
        outbox.send_to(
            client_id,
            Event::SendingPlayer {
                name: p.name,
                team: p.team,
                position: p.position,
            },
        );
    }
    for f in snapshot.flags.into_iter().filter(|f| f.captured) {
        outbox.send_to(client_id, Event::LockFlag(f.name));
    }
}

fn exit_game(
    state: &mut ServerState,
    config: &ServerConfig,
    session: &SessionState,
    name: &str,
    dispatch: &mut Dispatch,
) {
    if state.game.remove_player(name).is_none() {
        warn!("exitGame for unknown player {}", name);
        return;
    }
    state.clients.unbind_player(name);
    let remaining = leave_live(state);

    dispatch.outbox.broadcast(Event::PlayerLeft(name.to_string()));
    dispatch
        .outbox
        .broadcast(Event::SizeOfPlayersIs(state.game.player_count()));

    dispatch.close = matches!(session, SessionState::Joined(own) if own == name);
    dispatch.shutdown = remaining == 0 && config.exit_when_empty;
}

fn game_over(state: &mut ServerState, winner: Option<Winner>, outbox: &mut Outbox) {
    if state.game.is_over() {
        debug!("Game already decided, ignoring gameOver");
        return;
    }
    let winner = winner.unwrap_or_else(|| {
        let (red, blue) = state.game.flag_counts();
        win::decide_by_count(red, blue)
    });
    state.game.mark_over();
    info!("Game over, winner: {}", winner);
    outbox.broadcast(Event::GameOver(winner));
}

/// Longest accepted inbound line, newline excluded
pub const MAX_LINE_LEN: usize = 1024;

/// Outcome of reading one line from a client
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Line(String),
    /// Not valid UTF-8
    Garbled,
    /// Over [`MAX_LINE_LEN`]; everything up to the next newline was skipped
    TooLong,
    Closed,
}

/// Reads the next line without ever buffering more than [`MAX_LINE_LEN`] + 1
/// bytes of it. A final line without a newline is still returned.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LEN as u64 + 1;

    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Inbound::Closed);
    }

    if buf.last() != Some(&b'\n') && n > MAX_LINE_LEN {
        loop {
            buf.clear();
            let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            if n == 0 || buf.last() == Some(&b'\n') {
                break;
            }
        }
        buf.clear();
        return Ok(Inbound::TooLong);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    match std::str::from_utf8(buf) {
        Ok(line) => Ok(Inbound::Line(line.to_string())),
        Err(_) => Ok(Inbound::Garbled),
    }
}

/// Drives one connection until it closes, then runs disconnect cleanup
pub async fn serve<R, W>(
    hub: Arc<Hub>,
    client_id: u32,
    reader: R,
    writer: W,
    outgoing: mpsc::UnboundedReceiver<String>,
) where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer_task = tokio::spawn(write_lines(client_id, writer, outgoing));
    let mut writer_done = false;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(128);

    loop {
        tokio::select! {
            inbound = read_line(&mut reader, &mut buf) => match inbound {
                Ok(Inbound::Line(line)) => {
                    debug!("Client {} sent: {}", client_id, line);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Command::parse(&line) {
                        Ok(command) => {
                            if !hub.dispatch(client_id, command).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping '{}' from client {}: {}", line, client_id, e),
                    }
                }
                Ok(Inbound::Garbled) => {
                    warn!("Dropping non-UTF-8 line from client {}", client_id);
                }
                Ok(Inbound::TooLong) => {
                    warn!(
                        "Dropping line over {} bytes from client {}",
                        MAX_LINE_LEN, client_id
                    );
                }
                Ok(Inbound::Closed) => {
                    info!("Client {} closed the connection", client_id);
                    break;
                }
                Err(e) => {
                    warn!("Read error on client {}: {}", client_id, e);
                    break;
                }
            },
            _ = &mut writer_task, if !writer_done => {
                writer_done = true;
                warn!("Client {} stopped accepting writes", client_id);
                break;
            }
        }
    }

    hub.disconnect(client_id).await;

    // Unregistering dropped the sender; let the writer flush what is queued
    if !writer_done {
        if let Err(e) = writer_task.await {
            error!("Writer task for client {} panicked: {}", client_id, e);
        }
    }
}

async fn write_lines<W>(client_id: u32, mut writer: W, mut outgoing: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outgoing.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        if let Err(e) = writer.write_all(&bytes).await {
            warn!("Write error on client {}: {}", client_id, e);
            return;
        }
        if let Err(e) = writer.flush().await {
            warn!("Flush error on client {}: {}", client_id, e);
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown error on client {}: {}", client_id, e);
    }
}
