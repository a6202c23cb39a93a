//! Closed enumerations shared by the simulation and the wire codec.

use std::fmt;
use std::str::FromStr;

/// Content of a single board cell.
///
/// Discriminants are the values carried on the wire; only `Empty..=Player4`
/// (0..=8) may appear in snapshots and diffs, the two border tiles exist for
/// renderers framing the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Tile {
    #[default]
    Empty = 0,
    IndestructibleWall = 1,
    DestructibleWall = 2,
    Bomb = 3,
    Explosion = 4,
    Player1 = 5,
    Player2 = 6,
    Player3 = 7,
    Player4 = 8,
    VerticalBorder = 9,
    HorizontalBorder = 10,
}

impl Tile {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::IndestructibleWall),
            2 => Some(Self::DestructibleWall),
            3 => Some(Self::Bomb),
            4 => Some(Self::Explosion),
            5 => Some(Self::Player1),
            6 => Some(Self::Player2),
            7 => Some(Self::Player3),
            8 => Some(Self::Player4),
            9 => Some(Self::VerticalBorder),
            10 => Some(Self::HorizontalBorder),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Player tile owned by `seat`, if the seat exists.
    pub fn player(seat: usize) -> Option<Self> {
        match seat {
            0 => Some(Self::Player1),
            1 => Some(Self::Player2),
            2 => Some(Self::Player3),
            3 => Some(Self::Player4),
            _ => None,
        }
    }

    /// Seat owning this tile, if it is a player tile.
    pub fn seat(self) -> Option<usize> {
        match self {
            Self::Player1 => Some(0),
            Self::Player2 => Some(1),
            Self::Player3 => Some(2),
            Self::Player4 => Some(3),
            _ => None,
        }
    }

    pub fn is_player(self) -> bool {
        self.seat().is_some()
    }

    pub fn is_wall(self) -> bool {
        matches!(self, Self::IndestructibleWall | Self::DestructibleWall)
    }

    /// Whether the tile fits in the 4-bit range allowed on the wire.
    pub fn is_transmittable(self) -> bool {
        self.to_u8() <= crate::MAX_WIRE_TILE
    }

    pub fn to_char(self) -> char {
        match self {
            Self::Empty => ' ',
            Self::IndestructibleWall => '#',
            Self::DestructibleWall => '@',
            Self::Bomb => 'o',
            Self::Explosion => '+',
            Self::Player1 => '1',
            Self::Player2 => '2',
            Self::Player3 => '3',
            Self::Player4 => '4',
            Self::VerticalBorder => '|',
            Self::HorizontalBorder => '-',
        }
    }
}

/// Match mode. Team mode pairs seats {0, 3} against {1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameMode {
    #[default]
    Solo,
    Team,
}

impl GameMode {
    pub fn is_team(self) -> bool {
        self == Self::Team
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solo => write!(f, "solo"),
            Self::Team => write!(f, "team"),
        }
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solo" => Ok(Self::Solo),
            "team" => Ok(Self::Team),
            other => Err(format!("unknown game mode '{other}' (expected solo or team)")),
        }
    }
}

/// Player input carried by a game action message (3 bits on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
    PlaceBomb = 4,
}

impl Action {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Right),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            4 => Some(Self::PlaceBomb),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Single-step offset for movement actions; `None` for bomb placement.
    pub fn delta(self) -> Option<(i32, i32)> {
        match self {
            Self::Up => Some((0, -1)),
            Self::Right => Some((1, 0)),
            Self::Down => Some((0, 1)),
            Self::Left => Some((-1, 0)),
            Self::PlaceBomb => None,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "w" => Ok(Self::Up),
            "right" | "d" => Ok(Self::Right),
            "down" | "s" => Ok(Self::Down),
            "left" | "a" => Ok(Self::Left),
            "bomb" | "b" => Ok(Self::PlaceBomb),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}
