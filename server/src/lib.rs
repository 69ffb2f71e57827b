//! # Robots Arena Server Library
//!
//! Authoritative server for a turn-based bomb arena. It owns the canonical game
//! state, admits players over TCP, advances the simulation on a fixed turn
//! clock and streams every turn's events to all connected peers.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every game rule is evaluated here: bomb countdowns, explosions, movement,
//! block placement, scoring and respawns. Clients never simulate on their
//! own; they replay the event lists the server produces, in order.
//!
//! ### Session Management
//! The server alternates between a lobby, where connections may join as
//! players, and a game, during which joins are ignored and newcomers become
//! spectators that first receive a replay of every turn so far.
//!
//! ## Architecture Design
//!
//! ### Single Session Loop
//! One loop owns all mutable state. Per-connection tasks only move bytes:
//! a reader decodes client messages and forwards them over a channel, a writer
//! drains a queue of pre-encoded messages into the socket. The loop always
//! handles a due turn boundary before anything else so that message arrival
//! can never delay a turn.
//!
//! ### Deterministic Randomness
//! Spawn points and initial blocks come from a seeded linear-congruential
//! generator, so a seed fully determines a game given the same inputs.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection slots, player/spectator roles and message fan-out.
//!
//! ### Config Module (`config`)
//! Command-line arguments and their validation.
//!
//! ### Game Module (`game`)
//! The per-turn state transition and the events describing it.
//!
//! ### Network Module (`network`)
//! Listener, connection tasks, the lobby/game state machine and the turn clock.
//!
//! ### Random Module (`random`)
//! The seeded generator consumed by the game module.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         server_name: "arena".to_string(),
//!         players_count: 2,
//!         size_x: 10,
//!         size_y: 10,
//!         game_length: 100,
//!         explosion_radius: 3,
//!         bomb_timer: 4,
//!         turn_duration: Duration::from_millis(500),
//!         initial_blocks: 12,
//!         port: 2022,
//!         seed: 42,
//!     };
//!     config.validate()?;
//!
//!     let mut server = Server::new("127.0.0.1:2022", config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod random;
