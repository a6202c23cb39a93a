//! Types shared by the arena server and its clients: the board model, the
//! chat log, and the binary wire protocol.

pub mod board;
pub mod chat;
pub mod error;
pub mod framing;
pub mod model;
pub mod protocol;

pub use board::{diff, Board, TileDiff};
pub use chat::{Chat, ChatEntry, ChatKind};
pub use error::ProtocolError;
pub use model::{Action, GameMode, Tile};
pub use protocol::{
    BoardSnapshot, BoardUpdate, ChatMessage, ConnectionInfo, GameAction, GameEnd,
    InitialConnection, Message, MessageHeader, ReadyConnection, RequestCode,
};

/// Seats per game.
pub const PLAYER_NUM: usize = 4;
/// Highest tile value allowed in snapshots and diffs.
pub const MAX_WIRE_TILE: u8 = 8;
/// Board dimensions travel as single bytes.
pub const MAX_BOARD_DIM: usize = 255;
pub const MIN_BOARD_WIDTH: usize = 7;
pub const MIN_BOARD_HEIGHT: usize = 7;

/// Team of a seat in team mode: seats 0 and 3 form team 0, seats 1 and 2
/// form team 1.
pub fn team_of(seat: usize) -> u8 {
    match seat {
        0 | 3 => 0,
        _ => 1,
    }
}

/// Seats belonging to `team`.
pub fn team_seats(team: u8) -> [usize; 2] {
    if team == 0 {
        [0, 3]
    } else {
        [1, 2]
    }
}
