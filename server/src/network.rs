//! Server network layer: connection acceptor and broadcast dispatch

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::{GameState, Snapshot};
use crate::session::{self, Audience, Outbox};
use log::{debug, error, info, warn};
use shared::Command;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};

/// Everything shared between sessions. Only ever touched through [`Hub`].
pub struct ServerState {
    pub game: GameState,
    pub clients: ClientManager,
}

/// Owner of the shared state and the single lock around it.
///
/// Every command is applied and its events fanned out while the lock is
/// held, so no session ever sees a broadcast that disagrees with the world
/// or two broadcasts in a different order than they were applied.
pub struct Hub {
    state: Mutex<ServerState>,
    config: ServerConfig,
    shutdown: Notify,
}

impl Hub {
    /// Creates a hub with an empty world and no connections
    pub fn new(config: ServerConfig) -> Self {
        let clients = ClientManager::new(config.max_clients);
        Self {
            state: Mutex::new(ServerState {
                game: GameState::new(),
                clients,
            }),
            config,
            shutdown: Notify::new(),
        }
    }

    /// Settings the server was started with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registers a connection and returns its id and outbound line queue.
    /// None when the server is at capacity.
    pub async fn register(
        &self,
        addr: SocketAddr,
    ) -> Option<(u32, mpsc::UnboundedReceiver<String>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        let client_id = state.clients.add_client(addr, tx)?;
        Some((client_id, rx))
    }

    /// Applies a command and delivers its events. Returns false when the
    /// session should close.
    pub async fn dispatch(&self, client_id: u32, command: Command) -> bool {
        let mut state = self.state.lock().await;
        let dispatch = session::handle_command(&mut state, &self.config, client_id, command);
        deliver(&state.clients, &dispatch.outbox);
        drop(state);

        if dispatch.shutdown {
            info!("Last player left, requesting shutdown");
            self.shutdown.notify_one();
        }
        !dispatch.close
    }

    /// Unregisters a connection and tells everyone its player left
    ///
    /// Runs exactly once per connection, after its read loop ends. A
    /// connection whose player already exited only gets unregistered.
    pub async fn disconnect(&self, client_id: u32) {
        let mut state = self.state.lock().await;
        let outbox = session::handle_disconnect(&mut state, client_id);
        deliver(&state.clients, &outbox);
    }

    /// Copy of the world, taken under the lock
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.game.snapshot()
    }

    /// Number of registered connections
    pub async fn connected_clients(&self) -> usize {
        self.state.lock().await.clients.len()
    }
}

/// Fans an outbox out in order. Called with the lock held.
fn deliver(clients: &ClientManager, outbox: &Outbox) {
    for (audience, event) in outbox.messages() {
        let line = event.to_string();
        debug!("Sending to {:?}: {}", audience, line);
        match audience {
            Audience::All => clients.broadcast(&line, None),
            Audience::AllExcept(id) => clients.broadcast(&line, Some(*id)),
            Audience::Only(id) => clients.send_to(*id, &line),
        }
    }
}

/// TCP acceptor spawning one session task per connection
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
}

impl Server {
    /// Validates the configuration and binds the listener
    ///
    /// Binding happens here rather than in `run` so that callers, tests in
    /// particular, can read the bound port before accepting starts.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            hub: Arc::new(Hub::new(config)),
        })
    }

    /// Address actually bound, useful when the configured port was 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the hub, for inspecting state while the server runs
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Accepts connections until a shutdown is requested
    ///
    /// Accept errors are logged and retried after a short pause; they never
    /// stop the server. Only the exit-when-empty shutdown ends the loop.
    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!(
            "Server started, waiting for {} players",
            self.hub.config().min_players
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr).await,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = self.hub.shutdown.notified() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let Some((client_id, outgoing)) = self.hub.register(addr).await else {
            warn!("Server full, dropping connection from {}", addr);
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();
        let hub = Arc::clone(&self.hub);
        tokio::spawn(session::serve(hub, client_id, reader, writer, outgoing));
    }
}
