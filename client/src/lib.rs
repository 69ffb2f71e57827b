//! # Robots Relay Client Library
//!
//! The client sits between a robots server and an external display program.
//! It holds no authority over the game: it forwards display commands to the
//! server and turns the server's event stream into full-state snapshots the
//! display can draw directly.
//!
//! ## Architecture Overview
//!
//! ### Event Replay
//! The server sends, per turn, the ordered list of everything that changed.
//! Applying those events in order reproduces the server's board, bombs,
//! positions and scores exactly, without any randomness on this side.
//!
//! ### Snapshot Output
//! After every turn the client sends the display a complete picture of the
//! game, including the tiles that exploded during that turn. While in the
//! lobby it sends the server settings and the players that have joined.
//!
//! ### Input Forwarding
//! Display commands arrive as small datagrams. In the lobby any valid command
//! joins the game under the configured name; during a game it is forwarded as
//! the matching action. Malformed datagrams are dropped.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Command-line arguments and address resolution.
//!
//! ### Display Module (`display`)
//! Encoding and decoding of the display datagram protocol.
//!
//! ### Mirror Module (`mirror`)
//! The event-driven replica of the game state.
//!
//! ### Network Module (`network`)
//! The relay state machine and the socket loop driving it.

pub mod config;
pub mod display;
pub mod mirror;
pub mod network;
