//! Protocol error types

use thiserror::Error;

/// Reasons a message cannot be encoded. No bytes are produced on error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("seat id out of range: {0}")]
    InvalidSeat(u8),

    #[error("team bit out of range: {0}")]
    InvalidTeam(u8),

    #[error("sequence number {0} does not fit in 13 bits")]
    SequenceOverflow(u16),

    #[error("tile value {0} cannot be transmitted")]
    InvalidTile(u8),

    #[error("too many tile diffs for one message: {0}")]
    TooManyDiffs(usize),

    #[error("chat message too long: {0} bytes")]
    ChatTooLong(usize),

    #[error("board dimensions {width}x{height} exceed the wire limit")]
    BoardTooLarge { width: usize, height: usize },
}
