//! # Arena Server Library
//!
//! Authoritative host for a four-seat bomb arena match. The server owns the
//! canonical board, applies player actions, resolves bombs and streams the
//! resulting state to every client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! All game rules run here. Clients never mutate the board themselves; they
//! send actions and render whatever state the server publishes.
//!
//! ### Session Coordination
//! Each seat goes through a fixed handshake over its control stream:
//! - Initial connection naming the game mode
//! - Join barrier until all four seats are connected
//! - Seat assignment with the action port and state group
//! - Ready message once the client listens for state
//! - Ready barrier, after which the simulation starts
//!
//! ### State Streaming
//! The board is published as datagrams: a full snapshot when the game
//! starts and periodically afterwards, and tile diffs for every tick that
//! changes something in between.
//!
//! ## Transports
//!
//! | Channel | Socket | Carries |
//! |---|---|---|
//! | Control | TCP | handshake, chat, game end |
//! | Actions | UDP unicast | 4-byte player actions |
//! | State | UDP multicast | snapshots and diffs |
//!
//! Action and state datagrams may be lost; the periodic snapshot repairs any
//! client board that missed a diff.
//!
//! ## Module Organization
//!
//! - `config`: server settings and their defaults
//! - `game`: board generation and the simulation rules
//! - `registry`: games hosted by the process, keyed by id
//! - `barrier`: the counted rendezvous used for every phase barrier
//! - `network`: socket setup and port selection
//! - `session`: seat workers, action ingress and the simulation loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::session::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default())?;
//!     println!("Listening on {}", server.control_addr()?);
//!
//!     // Runs until all four seats have closed their sessions
//!     let outcome = server.run().await?;
//!     println!("Match finished: {:?}", outcome);
//!
//!     Ok(())
//! }
//! ```

pub mod barrier;
pub mod config;
pub mod game;
pub mod network;
pub mod registry;
pub mod session;
