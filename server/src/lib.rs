//! # Capture-the-Flag Session Server
//!
//! This library provides the authoritative server for a small team-based
//! capture-the-flag game played on a 20x20 grid. It owns the only copy of the
//! world that matters, turns client commands into state changes, and relays
//! the resulting events to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative World
//! The server decides who is on which team, where everybody spawns, which
//! flags have been taken and who won. Clients report movement and how long
//! they held the capture key; the server validates and applies those reports.
//!
//! ### Connection Lifecycle
//! Handles every connection from accept to close:
//! - Registration and capacity enforcement
//! - Team selection and spawn slot assignment
//! - Explicit exits and dropped connections, both of which remove the player
//!
//! ### Event Relay
//! Every accepted command produces zero or more events. They are delivered to
//! one client, all clients, or all but one, in the order they were produced.
//!
//! ## Architecture Design
//!
//! ### One Task Per Connection
//! Each TCP connection gets a reader task parked on the next line and a writer
//! task draining an unbounded channel. Sessions run in parallel on the tokio
//! runtime.
//!
//! ### Single Lock
//! All shared state (the world and the connection registry) lives behind one
//! mutex in the [`network::Hub`]. A command is applied and its events are
//! queued to every recipient before the lock is released, so the order of
//! broadcasts always matches the order of state changes.
//!
//! ### Text Protocol
//! Messages are newline-terminated lines of space-separated tokens, encoded
//! and decoded by the `shared` crate. Malformed or unknown lines are logged
//! and dropped; they never close a connection.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The world state: roster, flags, team counters and the started/over latches.
//!
//! ### Rules (`spawn`, `capture`, `win`)
//! Spawn slot policy, the timed capture check and the win condition.
//!
//! ### Client Manager Module (`client_manager`)
//! Registry of live connections and their outbound channels.
//!
//! ### Session Module (`session`)
//! Command handlers and the per-connection read/write loops.
//!
//! ### Network Module (`network`)
//! The [`network::Hub`] holding the lock and the TCP acceptor.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         min_players: 4,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod client_manager;
pub mod config;
pub mod errors;
pub mod game;
pub mod network;
pub mod session;
pub mod spawn;
pub mod win;
