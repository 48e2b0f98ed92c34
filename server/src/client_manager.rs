//! Registry of live connections
//!
//! This module tracks every connected session:
//! - Connection id assignment and capacity enforcement
//! - The player name a session has joined as, if any
//! - The outbound line channel feeding the session's writer task
//!
//! Sending never blocks: each connection's writer task drains an unbounded
//! channel, so fan-out can happen while the world lock is held.

use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Where a session is in its lifecycle. A closed session is simply absent
/// from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Joined(String),
}

/// A connected client and its outbound channel
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: u32,
    /// Peer address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Player this connection joined as
    pub player: Option<String>,
    sender: mpsc::UnboundedSender<String>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            player: None,
            sender,
        }
    }

    /// Queues a line for this client
    ///
    /// Never blocks. Returns false if the writer task has already exited,
    /// which happens between a write failure and disconnect cleanup.
    pub fn send(&self, line: &str) -> bool {
        self.sender.send(line.to_string()).is_ok()
    }

    /// Lifecycle state derived from the bound player name
    pub fn state(&self) -> SessionState {
        match &self.player {
            Some(name) => SessionState::Joined(name.clone()),
            None => SessionState::Connected,
        }
    }
}

/// Manages all connected clients
///
/// Owned by the hub and only touched with its lock held, so registration,
/// player binding and fan-out never race with each other.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given capacity
    ///
    /// Client IDs start from 1 and are never reused for the lifetime of the
    /// server.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns Some(client_id) on success, None when the server is at
    /// capacity. The sender is the only way events reach the connection.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));
        Some(client_id)
    }

    /// Drops a connection
    ///
    /// Returns the removed client so the caller can clean up the player it
    /// was bound to. Dropping the client drops its sender, which lets the
    /// writer task flush what is queued and then close the socket.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!(
            "Client {} ({}) disconnected after {:.1?}",
            client.id,
            client.addr,
            client.connected_at.elapsed()
        );
        Some(client)
    }

    /// Session state of a connection, or None if it is not registered
    pub fn session_state(&self, client_id: u32) -> Option<SessionState> {
        self.clients.get(&client_id).map(Client::state)
    }

    /// Records that a connection has joined as `name`
    ///
    /// Returns false if the connection is unknown.
    pub fn bind_player(&mut self, client_id: u32, name: &str) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.player = Some(name.to_string());
                true
            }
            None => false,
        }
    }

    /// Detaches `name` from whichever connection joined as it
    ///
    /// Used when a player exits while the connection stays registered, so a
    /// later disconnect does not remove the player a second time.
    pub fn unbind_player(&mut self, name: &str) -> Option<u32> {
        let client = self
            .clients
            .values_mut()
            .find(|c| c.player.as_deref() == Some(name))?;
        client.player = None;
        Some(client.id)
    }

    /// Queues a line for one connection
    ///
    /// Unknown ids and closed writers are skipped; the disconnect path
    /// cleans those up.
    pub fn send_to(&self, client_id: u32, line: &str) {
        if let Some(client) = self.clients.get(&client_id) {
            if !client.send(line) {
                debug!("Client {} writer closed, dropping '{}'", client_id, line);
            }
        }
    }

    /// Sends a line to every client except `exclude`
    ///
    /// Iteration order across clients is unspecified, but each client
    /// receives lines in the order they were queued.
    pub fn broadcast(&self, line: &str, exclude: Option<u32>) {
        for (client_id, client) in &self.clients {
            if Some(*client_id) == exclude {
                continue;
            }
            if !client.send(line) {
                debug!("Client {} writer closed, dropping '{}'", client_id, line);
            }
        }
    }

    /// Number of registered connections, joined or not
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = Client::new(1, test_addr(), tx);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert!(client.connected_at <= Instant::now());
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert_eq!(manager.add_client(test_addr(), tx1), Some(1));
        assert_eq!(manager.add_client(test_addr2(), tx2), Some(2));
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr2(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        manager.bind_player(id, "ABC");

        let removed = manager.remove_client(&id).unwrap();
        assert_eq!(removed.player.as_deref(), Some("ABC"));
        assert!(manager.remove_client(&id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_bind_and_unbind_player() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.bind_player(id, "ABC"));
        assert_eq!(
            manager.session_state(id),
            Some(SessionState::Joined("ABC".to_string()))
        );

        assert_eq!(manager.unbind_player("ABC"), Some(id));
        assert_eq!(manager.session_state(id), Some(SessionState::Connected));
        assert_eq!(manager.unbind_player("ABC"), None);
        assert!(!manager.bind_player(99, "XYZ"));
        assert_eq!(manager.session_state(99), None);
    }

    #[test]
    fn test_broadcast_with_exclusion() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let id1 = manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        manager.broadcast("startGame", None);
        manager.broadcast("showPlayerJoined red ABC", Some(id1));
        manager.send_to(id1, "sizeOfPlayersIs 1");

        assert_eq!(rx1.try_recv().unwrap(), "startGame");
        assert_eq!(rx1.try_recv().unwrap(), "sizeOfPlayersIs 1");
        assert!(rx1.try_recv().is_err());

        assert_eq!(rx2.try_recv().unwrap(), "startGame");
        assert_eq!(rx2.try_recv().unwrap(), "showPlayerJoined red ABC");
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_send_to_closed_writer_is_harmless() {
        let mut manager = ClientManager::new(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        manager.send_to(id, "startGame");
        manager.broadcast("startGame", None);
        assert_eq!(manager.len(), 1);
    }
}
