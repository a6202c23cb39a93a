//! Bit-exact wire codec for every message exchanged between clients and server.
//!
//! Every message starts with a 16-bit header in network byte order:
//!
//! ```text
//!  15                               3   2   1   0
//! +-----------------------------------+-------+---+
//! |          request code (13)        | id(2) |eq |
//! +-----------------------------------+-------+---+
//! ```
//!
//! Encoders validate every field and return a [`ProtocolError`] instead of a
//! partial buffer. Decoders check the request code, header fields, exact
//! buffer length and payload ranges, and return `None` for anything
//! malformed so callers can drop it silently.

use crate::board::{Board, TileDiff};
use crate::chat::{ChatKind, TEXT_SIZE};
use crate::error::ProtocolError;
use crate::model::{Action, GameMode, Tile};
use crate::{MAX_BOARD_DIM, PLAYER_NUM};
use std::net::Ipv6Addr;

pub const HEADER_SIZE: usize = 2;
/// Exclusive upper bound of action sequence numbers (13 bits).
pub const SEQUENCE_LIMIT: u16 = 1 << 13;
pub const ACTION_MESSAGE_SIZE: usize = 4;
pub const ASSIGNMENT_MESSAGE_SIZE: usize = 22;
pub const SNAPSHOT_PREFIX_SIZE: usize = 6;
pub const DIFF_PREFIX_SIZE: usize = 5;
pub const CHAT_PREFIX_SIZE: usize = 3;
pub const MAX_DIFFS: usize = u8::MAX as usize;

const CODE_SHIFT: u16 = 3;
const CODE_MASK: u16 = 0x1FFF;
const ID_SHIFT: u16 = 1;
const ID_MASK: u16 = 0x3;
const TEAM_MASK: u16 = 0x1;
const ACTION_MASK: u16 = 0x7;

/// Request codes identifying each message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestCode {
    InitialSolo = 1,
    InitialTeam = 2,
    ReadySolo = 3,
    ReadyTeam = 4,
    ActionSolo = 5,
    ActionTeam = 6,
    ClientChatGlobal = 7,
    ClientChatTeam = 8,
    AssignmentSolo = 9,
    AssignmentTeam = 10,
    BoardSnapshot = 11,
    BoardDiff = 12,
    ServerChatGlobal = 13,
    ServerChatTeam = 14,
    GameEndSolo = 15,
    GameEndTeam = 16,
}

impl RequestCode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::InitialSolo),
            2 => Some(Self::InitialTeam),
            3 => Some(Self::ReadySolo),
            4 => Some(Self::ReadyTeam),
            5 => Some(Self::ActionSolo),
            6 => Some(Self::ActionTeam),
            7 => Some(Self::ClientChatGlobal),
            8 => Some(Self::ClientChatTeam),
            9 => Some(Self::AssignmentSolo),
            10 => Some(Self::AssignmentTeam),
            11 => Some(Self::BoardSnapshot),
            12 => Some(Self::BoardDiff),
            13 => Some(Self::ServerChatGlobal),
            14 => Some(Self::ServerChatTeam),
            15 => Some(Self::GameEndSolo),
            16 => Some(Self::GameEndTeam),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Bytes (header included) needed before the full frame length is known.
    pub fn prefix_len(self) -> usize {
        match self {
            Self::InitialSolo
            | Self::InitialTeam
            | Self::ReadySolo
            | Self::ReadyTeam
            | Self::GameEndSolo
            | Self::GameEndTeam => HEADER_SIZE,
            Self::ActionSolo | Self::ActionTeam => ACTION_MESSAGE_SIZE,
            Self::AssignmentSolo | Self::AssignmentTeam => ASSIGNMENT_MESSAGE_SIZE,
            Self::BoardSnapshot => SNAPSHOT_PREFIX_SIZE,
            Self::BoardDiff => DIFF_PREFIX_SIZE,
            Self::ClientChatGlobal
            | Self::ClientChatTeam
            | Self::ServerChatGlobal
            | Self::ServerChatTeam => CHAT_PREFIX_SIZE,
        }
    }

    /// Full frame length, given at least [`prefix_len`](Self::prefix_len) bytes.
    pub fn frame_len(self, prefix: &[u8]) -> Option<usize> {
        if prefix.len() < self.prefix_len() {
            return None;
        }
        let len = match self {
            Self::BoardSnapshot => {
                SNAPSHOT_PREFIX_SIZE + prefix[4] as usize * prefix[5] as usize
            }
            Self::BoardDiff => DIFF_PREFIX_SIZE + 3 * prefix[4] as usize,
            Self::ClientChatGlobal
            | Self::ClientChatTeam
            | Self::ServerChatGlobal
            | Self::ServerChatTeam => CHAT_PREFIX_SIZE + prefix[2] as usize,
            other => other.prefix_len(),
        };
        Some(len)
    }
}

/// Length of the message at the start of `buf`, when enough bytes are present
/// to tell. Datagram receivers compare it against the received size.
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    MessageHeader::from_bytes(buf)?.request_code()?.frame_len(buf)
}

/// The 16-bit envelope shared by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub code: u16,
    pub id: u8,
    pub eq: u8,
}

impl MessageHeader {
    pub fn new(code: RequestCode, id: u8, eq: u8) -> Self {
        Self {
            code: code.to_u16(),
            id,
            eq,
        }
    }

    pub fn pack(&self) -> u16 {
        ((self.code & CODE_MASK) << CODE_SHIFT)
            | ((u16::from(self.id) & ID_MASK) << ID_SHIFT)
            | (u16::from(self.eq) & TEAM_MASK)
    }

    pub fn unpack(raw: u16) -> Self {
        Self {
            code: raw >> CODE_SHIFT,
            id: ((raw >> ID_SHIFT) & ID_MASK) as u8,
            eq: (raw & TEAM_MASK) as u8,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.pack().to_be_bytes()
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        match buf {
            [hi, lo, ..] => Some(Self::unpack(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }

    pub fn request_code(&self) -> Option<RequestCode> {
        RequestCode::from_u16(self.code)
    }
}

fn check_seat(id: u8) -> Result<u8, ProtocolError> {
    if usize::from(id) < PLAYER_NUM {
        Ok(id)
    } else {
        Err(ProtocolError::InvalidSeat(id))
    }
}

/// Validates the team bit when it carries meaning, masks it otherwise.
fn team_bit(required: bool, eq: u8) -> Result<u8, ProtocolError> {
    if required && eq > 1 {
        Err(ProtocolError::InvalidTeam(eq))
    } else {
        Ok(eq & 1)
    }
}

fn check_tile(tile: Tile) -> Result<u8, ProtocolError> {
    if tile.is_transmittable() {
        Ok(tile.to_u8())
    } else {
        Err(ProtocolError::InvalidTile(tile.to_u8()))
    }
}

fn decode_tile(byte: u8) -> Option<Tile> {
    Tile::from_u8(byte).filter(|t| t.is_transmittable())
}

fn by_mode(mode: GameMode, solo: RequestCode, team: RequestCode) -> RequestCode {
    match mode {
        GameMode::Solo => solo,
        GameMode::Team => team,
    }
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

/// First message of the control handshake (client → server).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialConnection {
    pub mode: GameMode,
}

impl InitialConnection {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let code = by_mode(self.mode, RequestCode::InitialSolo, RequestCode::InitialTeam);
        Ok(MessageHeader::new(code, 0, 0).to_bytes().to_vec())
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != HEADER_SIZE {
            return None;
        }
        let mode = match MessageHeader::from_bytes(buf)?.request_code()? {
            RequestCode::InitialSolo => GameMode::Solo,
            RequestCode::InitialTeam => GameMode::Team,
            _ => return None,
        };
        Some(Self { mode })
    }
}

/// Client signals it has subscribed to the state stream and is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyConnection {
    pub mode: GameMode,
    pub id: u8,
    pub eq: u8,
}

impl ReadyConnection {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let id = check_seat(self.id)?;
        let eq = team_bit(self.mode.is_team(), self.eq)?;
        let code = by_mode(self.mode, RequestCode::ReadySolo, RequestCode::ReadyTeam);
        Ok(MessageHeader::new(code, id, eq).to_bytes().to_vec())
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != HEADER_SIZE {
            return None;
        }
        let header = MessageHeader::from_bytes(buf)?;
        let mode = match header.request_code()? {
            RequestCode::ReadySolo => GameMode::Solo,
            RequestCode::ReadyTeam => GameMode::Team,
            _ => return None,
        };
        Some(Self {
            mode,
            id: header.id,
            eq: header.eq,
        })
    }
}

/// Seat assignment and transport coordinates (server → client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub mode: GameMode,
    pub id: u8,
    pub eq: u8,
    pub port_udp: u16,
    pub port_multicast: u16,
    pub multicast_addr: Ipv6Addr,
}

impl ConnectionInfo {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let id = check_seat(self.id)?;
        let eq = team_bit(true, self.eq)?;
        let code = by_mode(
            self.mode,
            RequestCode::AssignmentSolo,
            RequestCode::AssignmentTeam,
        );

        let mut buf = Vec::with_capacity(ASSIGNMENT_MESSAGE_SIZE);
        buf.extend_from_slice(&MessageHeader::new(code, id, eq).to_bytes());
        buf.extend_from_slice(&self.port_udp.to_be_bytes());
        buf.extend_from_slice(&self.port_multicast.to_be_bytes());
        for segment in self.multicast_addr.segments() {
            buf.extend_from_slice(&segment.to_be_bytes());
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != ASSIGNMENT_MESSAGE_SIZE {
            return None;
        }
        let header = MessageHeader::from_bytes(buf)?;
        let mode = match header.request_code()? {
            RequestCode::AssignmentSolo => GameMode::Solo,
            RequestCode::AssignmentTeam => GameMode::Team,
            _ => return None,
        };

        let mut segments = [0u16; 8];
        for (i, segment) in segments.iter_mut().enumerate() {
            *segment = read_u16(buf, 6 + 2 * i);
        }

        Some(Self {
            mode,
            id: header.id,
            eq: header.eq,
            port_udp: read_u16(buf, 2),
            port_multicast: read_u16(buf, 4),
            multicast_addr: Ipv6Addr::from(segments),
        })
    }
}

/// One player input, sent as a 4-byte datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameAction {
    pub mode: GameMode,
    pub id: u8,
    pub eq: u8,
    /// Message sequence number, wrapping at [`SEQUENCE_LIMIT`].
    pub num: u16,
    pub action: Action,
}

impl GameAction {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let id = check_seat(self.id)?;
        let eq = team_bit(self.mode.is_team(), self.eq)?;
        if self.num >= SEQUENCE_LIMIT {
            return Err(ProtocolError::SequenceOverflow(self.num));
        }
        let code = by_mode(self.mode, RequestCode::ActionSolo, RequestCode::ActionTeam);
        let body = (self.num << 3) | u16::from(self.action.to_u8());

        let mut buf = Vec::with_capacity(ACTION_MESSAGE_SIZE);
        buf.extend_from_slice(&MessageHeader::new(code, id, eq).to_bytes());
        buf.extend_from_slice(&body.to_be_bytes());
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != ACTION_MESSAGE_SIZE {
            return None;
        }
        let header = MessageHeader::from_bytes(buf)?;
        let mode = match header.request_code()? {
            RequestCode::ActionSolo => GameMode::Solo,
            RequestCode::ActionTeam => GameMode::Team,
            _ => return None,
        };
        let body = read_u16(buf, 2);
        let action = Action::from_u8((body & ACTION_MASK) as u8)?;

        Some(Self {
            mode,
            id: header.id,
            eq: header.eq,
            num: body >> 3,
            action,
        })
    }
}

/// Full board broadcast on the state stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub num: u16,
    pub board: Board,
}

impl BoardSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let (width, height) = (self.board.width(), self.board.height());
        if width > MAX_BOARD_DIM || height > MAX_BOARD_DIM {
            return Err(ProtocolError::BoardTooLarge { width, height });
        }

        let mut buf = Vec::with_capacity(SNAPSHOT_PREFIX_SIZE + width * height);
        buf.extend_from_slice(&MessageHeader::new(RequestCode::BoardSnapshot, 0, 0).to_bytes());
        buf.extend_from_slice(&self.num.to_be_bytes());
        buf.push(height as u8);
        buf.push(width as u8);
        for tile in self.board.tiles() {
            buf.push(check_tile(*tile)?);
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header = MessageHeader::from_bytes(buf)?;
        if header.request_code()? != RequestCode::BoardSnapshot || header.id != 0 || header.eq != 0
        {
            return None;
        }
        if buf.len() < SNAPSHOT_PREFIX_SIZE {
            return None;
        }
        let height = buf[4] as usize;
        let width = buf[5] as usize;
        if buf.len() != SNAPSHOT_PREFIX_SIZE + width * height {
            return None;
        }

        let tiles = buf[SNAPSHOT_PREFIX_SIZE..]
            .iter()
            .map(|b| decode_tile(*b))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            num: read_u16(buf, 2),
            board: Board::from_tiles(width, height, tiles)?,
        })
    }
}

/// Sparse board update broadcast on the state stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardUpdate {
    pub num: u16,
    pub diffs: Vec<TileDiff>,
}

impl BoardUpdate {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.diffs.len() > MAX_DIFFS {
            return Err(ProtocolError::TooManyDiffs(self.diffs.len()));
        }

        let mut buf = Vec::with_capacity(DIFF_PREFIX_SIZE + 3 * self.diffs.len());
        buf.extend_from_slice(&MessageHeader::new(RequestCode::BoardDiff, 0, 0).to_bytes());
        buf.extend_from_slice(&self.num.to_be_bytes());
        buf.push(self.diffs.len() as u8);
        for diff in &self.diffs {
            buf.extend_from_slice(&[diff.x, diff.y, check_tile(diff.tile)?]);
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header = MessageHeader::from_bytes(buf)?;
        if header.request_code()? != RequestCode::BoardDiff || header.id != 0 || header.eq != 0 {
            return None;
        }
        if buf.len() < DIFF_PREFIX_SIZE {
            return None;
        }
        let count = buf[4] as usize;
        if buf.len() != DIFF_PREFIX_SIZE + 3 * count {
            return None;
        }

        let diffs = buf[DIFF_PREFIX_SIZE..]
            .chunks_exact(3)
            .map(|entry| {
                Some(TileDiff {
                    x: entry[0],
                    y: entry[1],
                    tile: decode_tile(entry[2])?,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            num: read_u16(buf, 2),
            diffs,
        })
    }
}

/// Chat text. The same shape travels client → server and server → client,
/// only the request codes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: ChatKind,
    pub id: u8,
    pub eq: u8,
    pub text: String,
}

impl ChatMessage {
    pub fn encode_client(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_with(RequestCode::ClientChatGlobal, RequestCode::ClientChatTeam)
    }

    pub fn encode_server(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_with(RequestCode::ServerChatGlobal, RequestCode::ServerChatTeam)
    }

    pub fn decode_client(buf: &[u8]) -> Option<Self> {
        Self::decode_with(buf, RequestCode::ClientChatGlobal, RequestCode::ClientChatTeam)
    }

    pub fn decode_server(buf: &[u8]) -> Option<Self> {
        Self::decode_with(buf, RequestCode::ServerChatGlobal, RequestCode::ServerChatTeam)
    }

    fn encode_with(
        &self,
        global: RequestCode,
        team: RequestCode,
    ) -> Result<Vec<u8>, ProtocolError> {
        let id = check_seat(self.id)?;
        let eq = team_bit(self.kind == ChatKind::Team, self.eq)?;
        let text = self.text.as_bytes();
        if text.len() > TEXT_SIZE {
            return Err(ProtocolError::ChatTooLong(text.len()));
        }
        let code = match self.kind {
            ChatKind::Global => global,
            ChatKind::Team => team,
        };

        let mut buf = Vec::with_capacity(CHAT_PREFIX_SIZE + text.len());
        buf.extend_from_slice(&MessageHeader::new(code, id, eq).to_bytes());
        buf.push(text.len() as u8);
        buf.extend_from_slice(text);
        Ok(buf)
    }

    fn decode_with(buf: &[u8], global: RequestCode, team: RequestCode) -> Option<Self> {
        let header = MessageHeader::from_bytes(buf)?;
        let code = header.request_code()?;
        let kind = if code == global {
            ChatKind::Global
        } else if code == team {
            ChatKind::Team
        } else {
            return None;
        };
        if buf.len() < CHAT_PREFIX_SIZE || buf.len() != CHAT_PREFIX_SIZE + buf[2] as usize {
            return None;
        }
        let text = String::from_utf8(buf[CHAT_PREFIX_SIZE..].to_vec()).ok()?;

        Some(Self {
            kind,
            id: header.id,
            eq: header.eq,
            text,
        })
    }
}

/// End of match announcement. Solo carries the winner seat in `id`, Team
/// carries the winning team in `eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEnd {
    pub mode: GameMode,
    pub id: u8,
    pub eq: u8,
}

impl GameEnd {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let (id, eq) = match self.mode {
            GameMode::Solo => (check_seat(self.id)?, self.eq & 1),
            GameMode::Team => (self.id & ID_MASK as u8, team_bit(true, self.eq)?),
        };
        let code = by_mode(self.mode, RequestCode::GameEndSolo, RequestCode::GameEndTeam);
        Ok(MessageHeader::new(code, id, eq).to_bytes().to_vec())
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != HEADER_SIZE {
            return None;
        }
        let header = MessageHeader::from_bytes(buf)?;
        let mode = match header.request_code()? {
            RequestCode::GameEndSolo => GameMode::Solo,
            RequestCode::GameEndTeam => GameMode::Team,
            _ => return None,
        };
        Some(Self {
            mode,
            id: header.id,
            eq: header.eq,
        })
    }
}

/// Any protocol message, dispatched on the request code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Initial(InitialConnection),
    Ready(ReadyConnection),
    Assignment(ConnectionInfo),
    Action(GameAction),
    Snapshot(BoardSnapshot),
    Update(BoardUpdate),
    ClientChat(ChatMessage),
    ServerChat(ChatMessage),
    End(GameEnd),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Message::Initial(m) => m.encode(),
            Message::Ready(m) => m.encode(),
            Message::Assignment(m) => m.encode(),
            Message::Action(m) => m.encode(),
            Message::Snapshot(m) => m.encode(),
            Message::Update(m) => m.encode(),
            Message::ClientChat(m) => m.encode_client(),
            Message::ServerChat(m) => m.encode_server(),
            Message::End(m) => m.encode(),
        }
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let code = MessageHeader::from_bytes(buf)?.request_code()?;
        match code {
            RequestCode::InitialSolo | RequestCode::InitialTeam => {
                InitialConnection::decode(buf).map(Message::Initial)
            }
            RequestCode::ReadySolo | RequestCode::ReadyTeam => {
                ReadyConnection::decode(buf).map(Message::Ready)
            }
            RequestCode::AssignmentSolo | RequestCode::AssignmentTeam => {
                ConnectionInfo::decode(buf).map(Message::Assignment)
            }
            RequestCode::ActionSolo | RequestCode::ActionTeam => {
                GameAction::decode(buf).map(Message::Action)
            }
            RequestCode::BoardSnapshot => BoardSnapshot::decode(buf).map(Message::Snapshot),
            RequestCode::BoardDiff => BoardUpdate::decode(buf).map(Message::Update),
            RequestCode::ClientChatGlobal | RequestCode::ClientChatTeam => {
                ChatMessage::decode_client(buf).map(Message::ClientChat)
            }
            RequestCode::ServerChatGlobal | RequestCode::ServerChatTeam => {
                ChatMessage::decode_server(buf).map(Message::ServerChat)
            }
            RequestCode::GameEndSolo | RequestCode::GameEndTeam => {
                GameEnd::decode(buf).map(Message::End)
            }
        }
    }

    pub fn request_code(&self) -> RequestCode {
        match self {
            Message::Initial(m) => by_mode(m.mode, RequestCode::InitialSolo, RequestCode::InitialTeam),
            Message::Ready(m) => by_mode(m.mode, RequestCode::ReadySolo, RequestCode::ReadyTeam),
            Message::Assignment(m) => by_mode(
                m.mode,
                RequestCode::AssignmentSolo,
                RequestCode::AssignmentTeam,
            ),
            Message::Action(m) => by_mode(m.mode, RequestCode::ActionSolo, RequestCode::ActionTeam),
            Message::Snapshot(_) => RequestCode::BoardSnapshot,
            Message::Update(_) => RequestCode::BoardDiff,
            Message::ClientChat(m) => match m.kind {
                ChatKind::Global => RequestCode::ClientChatGlobal,
                ChatKind::Team => RequestCode::ClientChatTeam,
            },
            Message::ServerChat(m) => match m.kind {
                ChatKind::Global => RequestCode::ServerChatGlobal,
                ChatKind::Team => RequestCode::ServerChatTeam,
            },
            Message::End(m) => by_mode(m.mode, RequestCode::GameEndSolo, RequestCode::GameEndTeam),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_board() -> Board {
        let mut board = Board::new(5, 3);
        board.set(1, 1, Tile::IndestructibleWall);
        board.set(0, 0, Tile::Player1);
        board.set(4, 2, Tile::Player4);
        board.set(2, 0, Tile::DestructibleWall);
        board.set(3, 1, Tile::Bomb);
        board
    }

    #[test]
    fn test_header_bit_layout() {
        let header = MessageHeader::new(RequestCode::ActionSolo, 2, 1);
        // code 5 << 3 | id 2 << 1 | eq 1 = 45
        assert_eq!(header.pack(), 45);
        assert_eq!(header.to_bytes(), [0x00, 0x2D]);
        assert_eq!(MessageHeader::from_bytes(&[0x00, 0x2D]), Some(header));
    }

    #[test]
    fn test_header_round_trips_all_addresses() {
        for code in 1..=16u16 {
            for id in 0..4u8 {
                for eq in 0..2u8 {
                    let header = MessageHeader {
                        code,
                        id,
                        eq,
                    };
                    assert_eq!(MessageHeader::unpack(header.pack()), header);
                }
            }
        }
    }

    #[test]
    fn test_header_needs_two_bytes() {
        assert!(MessageHeader::from_bytes(&[0x08]).is_none());
    }

    #[test]
    fn test_initial_connection_round_trip() {
        for mode in [GameMode::Solo, GameMode::Team] {
            let msg = InitialConnection { mode };
            let bytes = msg.encode().unwrap();
            assert_eq!(bytes.len(), HEADER_SIZE);
            assert_eq!(InitialConnection::decode(&bytes), Some(msg));
        }
        assert_eq!(
            InitialConnection { mode: GameMode::Team }.encode().unwrap(),
            vec![0x00, 0x10]
        );
    }

    #[test]
    fn test_ready_round_trip_at_boundaries() {
        for mode in [GameMode::Solo, GameMode::Team] {
            for id in [0, 3] {
                for eq in [0, 1] {
                    let msg = ReadyConnection { mode, id, eq };
                    let bytes = msg.encode().unwrap();
                    assert_eq!(ReadyConnection::decode(&bytes), Some(msg));
                }
            }
        }
    }

    #[test]
    fn test_ready_rejects_invalid_fields() {
        let bad_seat = ReadyConnection {
            mode: GameMode::Solo,
            id: 4,
            eq: 0,
        };
        assert_eq!(bad_seat.encode(), Err(ProtocolError::InvalidSeat(4)));

        let bad_team = ReadyConnection {
            mode: GameMode::Team,
            id: 1,
            eq: 2,
        };
        assert_eq!(bad_team.encode(), Err(ProtocolError::InvalidTeam(2)));
    }

    #[test]
    fn test_connection_info_round_trip() {
        let msg = ConnectionInfo {
            mode: GameMode::Team,
            id: 3,
            eq: 1,
            port_udp: 4242,
            port_multicast: u16::MAX,
            multicast_addr: "ff12::1:2:3:4:5:6:7".parse().unwrap(),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), ASSIGNMENT_MESSAGE_SIZE);
        assert_eq!(&bytes[2..4], &4242u16.to_be_bytes());
        assert_eq!(&bytes[6..8], &[0xff, 0x12]);
        assert_eq!(ConnectionInfo::decode(&bytes), Some(msg));
    }

    #[test]
    fn test_connection_info_rejects_truncated_buffer() {
        let msg = ConnectionInfo {
            mode: GameMode::Solo,
            id: 0,
            eq: 0,
            port_udp: 1,
            port_multicast: 2,
            multicast_addr: Ipv6Addr::LOCALHOST,
        };
        let bytes = msg.encode().unwrap();
        assert!(ConnectionInfo::decode(&bytes[..21]).is_none());
    }

    #[test]
    fn test_game_action_round_trip_at_boundaries() {
        let actions = [
            Action::Up,
            Action::Right,
            Action::Down,
            Action::Left,
            Action::PlaceBomb,
        ];
        for mode in [GameMode::Solo, GameMode::Team] {
            for id in [0, 3] {
                for eq in [0, 1] {
                    for num in [0, SEQUENCE_LIMIT - 1] {
                        for action in actions {
                            let msg = GameAction {
                                mode,
                                id,
                                eq,
                                num,
                                action,
                            };
                            let bytes = msg.encode().unwrap();
                            assert_eq!(bytes.len(), ACTION_MESSAGE_SIZE);
                            assert_eq!(GameAction::decode(&bytes), Some(msg));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_game_action_body_layout() {
        let msg = GameAction {
            mode: GameMode::Solo,
            id: 0,
            eq: 0,
            num: 3,
            action: Action::Left,
        };
        // 3 << 3 | 3 = 27
        assert_eq!(msg.encode().unwrap(), vec![0x00, 0x28, 0x00, 0x1B]);
    }

    #[test]
    fn test_game_action_rejects_invalid_fields() {
        let base = GameAction {
            mode: GameMode::Team,
            id: 0,
            eq: 0,
            num: 0,
            action: Action::Up,
        };
        assert_eq!(
            GameAction { id: 4, ..base }.encode(),
            Err(ProtocolError::InvalidSeat(4))
        );
        assert_eq!(
            GameAction { eq: 2, ..base }.encode(),
            Err(ProtocolError::InvalidTeam(2))
        );
        assert_eq!(
            GameAction {
                num: SEQUENCE_LIMIT,
                ..base
            }
            .encode(),
            Err(ProtocolError::SequenceOverflow(SEQUENCE_LIMIT))
        );
    }

    #[test]
    fn test_game_action_decode_rejects_unknown_action() {
        let header = MessageHeader::new(RequestCode::ActionSolo, 0, 0).to_bytes();
        let bytes = [header[0], header[1], 0x00, 0x05];
        assert!(GameAction::decode(&bytes).is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let msg = BoardSnapshot {
            num: u16::MAX,
            board: sample_board(),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), SNAPSHOT_PREFIX_SIZE + 15);
        assert_eq!(bytes[4], 3);
        assert_eq!(bytes[5], 5);
        assert_eq!(bytes[6], Tile::Player1.to_u8());
        assert_eq!(BoardSnapshot::decode(&bytes), Some(msg));
    }

    #[test]
    fn test_snapshot_rejects_border_tiles() {
        let mut board = sample_board();
        board.set(0, 2, Tile::VerticalBorder);
        let msg = BoardSnapshot { num: 0, board };
        assert_eq!(msg.encode(), Err(ProtocolError::InvalidTile(9)));
    }

    #[test]
    fn test_snapshot_decode_validates_payload() {
        let mut bytes = BoardSnapshot {
            num: 1,
            board: sample_board(),
        }
        .encode()
        .unwrap();

        assert!(BoardSnapshot::decode(&bytes[..bytes.len() - 1]).is_none());

        let last = bytes.len() - 1;
        bytes[last] = 9;
        assert!(BoardSnapshot::decode(&bytes).is_none());
    }

    #[test]
    fn test_snapshot_decode_rejects_addressed_header() {
        let mut bytes = BoardSnapshot {
            num: 1,
            board: sample_board(),
        }
        .encode()
        .unwrap();
        let header = MessageHeader::new(RequestCode::BoardSnapshot, 1, 0).to_bytes();
        bytes[..2].copy_from_slice(&header);
        assert!(BoardSnapshot::decode(&bytes).is_none());
    }

    #[test]
    fn test_update_round_trip_all_tiles() {
        let diffs = (0..=8u8)
            .map(|v| TileDiff {
                x: v,
                y: 254 - v,
                tile: Tile::from_u8(v).unwrap(),
            })
            .collect();
        let msg = BoardUpdate { num: 0, diffs };
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), DIFF_PREFIX_SIZE + 27);
        assert_eq!(bytes[4], 9);
        assert_eq!(BoardUpdate::decode(&bytes), Some(msg));
    }

    #[test]
    fn test_update_rejects_invalid_content() {
        let too_many = BoardUpdate {
            num: 0,
            diffs: vec![
                TileDiff {
                    x: 0,
                    y: 0,
                    tile: Tile::Empty
                };
                MAX_DIFFS + 1
            ],
        };
        assert_eq!(too_many.encode(), Err(ProtocolError::TooManyDiffs(256)));

        let bad_tile = BoardUpdate {
            num: 0,
            diffs: vec![TileDiff {
                x: 0,
                y: 0,
                tile: Tile::HorizontalBorder,
            }],
        };
        assert_eq!(bad_tile.encode(), Err(ProtocolError::InvalidTile(10)));
    }

    #[test]
    fn test_empty_update_is_header_and_prefix() {
        let bytes = BoardUpdate {
            num: 7,
            diffs: Vec::new(),
        }
        .encode()
        .unwrap();
        assert_eq!(bytes.len(), DIFF_PREFIX_SIZE);
        assert_eq!(BoardUpdate::decode(&bytes).unwrap().diffs, Vec::new());
    }

    #[test]
    fn test_chat_round_trip_both_directions() {
        let msg = ChatMessage {
            kind: ChatKind::Team,
            id: 2,
            eq: 1,
            text: "go left".to_string(),
        };
        let client = msg.encode_client().unwrap();
        let server = msg.encode_server().unwrap();
        assert_eq!(client[2], 7);
        assert_eq!(&client[3..], b"go left");
        assert_eq!(ChatMessage::decode_client(&client), Some(msg.clone()));
        assert_eq!(ChatMessage::decode_server(&server), Some(msg.clone()));
        assert!(ChatMessage::decode_server(&client).is_none());
    }

    #[test]
    fn test_chat_rejects_long_or_invalid_text() {
        let long = ChatMessage {
            kind: ChatKind::Global,
            id: 0,
            eq: 0,
            text: "x".repeat(TEXT_SIZE + 1),
        };
        assert_eq!(long.encode_client(), Err(ProtocolError::ChatTooLong(256)));

        let header = MessageHeader::new(RequestCode::ClientChatGlobal, 0, 0).to_bytes();
        let bytes = [header[0], header[1], 2, 0xff, 0xfe];
        assert!(ChatMessage::decode_client(&bytes).is_none());
    }

    #[test]
    fn test_game_end_round_trip() {
        for id in 0..4 {
            let msg = GameEnd {
                mode: GameMode::Solo,
                id,
                eq: 0,
            };
            assert_eq!(GameEnd::decode(&msg.encode().unwrap()), Some(msg));
        }
        for eq in 0..2 {
            let msg = GameEnd {
                mode: GameMode::Team,
                id: 0,
                eq,
            };
            assert_eq!(GameEnd::decode(&msg.encode().unwrap()), Some(msg));
        }
        let bad = GameEnd {
            mode: GameMode::Solo,
            id: 4,
            eq: 0,
        };
        assert_eq!(bad.encode(), Err(ProtocolError::InvalidSeat(4)));
    }

    #[test]
    fn test_message_dispatch() {
        let messages = vec![
            Message::Initial(InitialConnection {
                mode: GameMode::Solo,
            }),
            Message::Ready(ReadyConnection {
                mode: GameMode::Team,
                id: 1,
                eq: 1,
            }),
            Message::Action(GameAction {
                mode: GameMode::Solo,
                id: 2,
                eq: 0,
                num: 99,
                action: Action::PlaceBomb,
            }),
            Message::Snapshot(BoardSnapshot {
                num: 3,
                board: sample_board(),
            }),
            Message::ClientChat(ChatMessage {
                kind: ChatKind::Global,
                id: 0,
                eq: 0,
                text: "hello".to_string(),
            }),
            Message::End(GameEnd {
                mode: GameMode::Team,
                id: 0,
                eq: 1,
            }),
        ];

        for msg in messages {
            let bytes = msg.encode().unwrap();
            let header = MessageHeader::from_bytes(&bytes).unwrap();
            assert_eq!(header.request_code(), Some(msg.request_code()));
            assert_eq!(frame_len(&bytes), Some(bytes.len()));
            assert_eq!(Message::decode(&bytes), Some(msg));
        }
    }

    #[test]
    fn test_decode_rejects_unknown_code() {
        let header = MessageHeader {
            code: 17,
            id: 0,
            eq: 0,
        };
        assert!(Message::decode(&header.to_bytes()).is_none());
        assert!(frame_len(&header.to_bytes()).is_none());
    }

    #[test]
    fn test_frame_len_needs_prefix() {
        let bytes = BoardUpdate {
            num: 0,
            diffs: vec![TileDiff {
                x: 1,
                y: 1,
                tile: Tile::Bomb,
            }],
        }
        .encode()
        .unwrap();
        assert_eq!(frame_len(&bytes[..4]), None);
        assert_eq!(frame_len(&bytes[..5]), Some(8));
    }
}
