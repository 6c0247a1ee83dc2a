//! # Chess Coordinator Server Library
//!
//! This library provides the authoritative server for two-player online chess.
//! It pairs searching players into games, validates every move against the
//! rules of chess, and broadcasts the resulting positions to both players.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Connections asking for a game wait in a FIFO queue. As soon as two are
//! waiting they are paired into a new session and told their colors.
//!
//! ### Authoritative Board
//! Each session owns its board. Clients only propose moves; the server decides
//! whether a move is legal, whose turn it is, and when the game is over.
//! Requests that fail validation are dropped without a reply.
//!
//! ### Client Lifecycle
//! A connection that closes or goes silent is removed from the queue, and if
//! it was playing, its opponent is told and the session is discarded.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! Per-connection tasks only decode frames and forward them as events. One
//! loop owns the [`registry::SessionRegistry`] and handles events one at a
//! time, so two messages can never race on the same session.
//!
//! ### Outbox Dispatch
//! Handlers never write to sockets. They record what must be sent in an
//! [`outbox::Outbox`], which the loop hands to the writer tasks afterwards.
//! This keeps the handlers synchronous and directly testable.
//!
//! ## Module Organization
//!
//! - `rules`: board state, move validation, SAN/FEN, terminal detection
//! - `registry`: waiting queue and live sessions
//! - `matchmaker`: `findMatch` and `cancelSearch`
//! - `moves`: `makeMove`
//! - `lifecycle`: disconnect cleanup
//! - `outbox`: queued outbound messages
//! - `client_manager`: connection table, encodings, liveness
//! - `network`: WebSocket transport and the event loop
//! - `config`: command-line configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod matchmaker;
pub mod moves;
pub mod network;
pub mod outbox;
pub mod registry;
pub mod rules;
