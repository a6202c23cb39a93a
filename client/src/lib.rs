//! # Arena Client Library
//!
//! Client-side implementation for the bomb arena. It joins a match over the
//! control stream, sends player actions as datagrams and keeps a local copy
//! of the board from the server's state stream.
//!
//! ## Architecture Overview
//!
//! The client holds no game rules. Every action is sent to the server and
//! the board only changes when the server says so, which keeps every seat
//! looking at the same arena.
//!
//! ### Joining
//! The handshake mirrors the server's barriers: send the initial connection,
//! wait for the seat assignment (it arrives once all four seats joined),
//! subscribe to the state stream, then send ready.
//!
//! ### Board Cache
//! Snapshots replace the cached board and diffs patch it. Diffs that arrive
//! before the first snapshot have nothing to patch and are dropped; the next
//! periodic snapshot catches the client up.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The shared, mutex-guarded board cache.
//!
//! ### Input Module (`input`)
//! Text command parsing and action sequence numbering.
//!
//! ### Network Module (`network`)
//! - Control stream handshake, chat and game end
//! - Action datagrams to the server
//! - State stream subscription (multicast group or unicast override)
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::BoardCache;
//! use client::network::ClientConnection;
//! use shared::{Action, GameMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = "127.0.0.1:8080".parse()?;
//!     let mut connection = ClientConnection::join(server, GameMode::Solo, None, 0).await?;
//!
//!     let cache = BoardCache::new();
//!     connection.send_action(Action::Right).await?;
//!     if let Some(update) = connection.recv_state().await? {
//!         cache.apply(update);
//!     }
//!     if let Some(board) = cache.render() {
//!         println!("{}", board);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
