//! Server configuration

use shared::GameMode;
use std::net::{IpAddr, Ipv6Addr};
use std::ops::Range;
use std::time::Duration;

pub const DEFAULT_CONTROL_PORT: u16 = 8080;
pub const DEFAULT_BOMB_LIFETIME: Duration = Duration::from_secs(3);
/// A seeded wall cell is left empty with a 1-in-N chance.
pub const DEFAULT_EMPTY_CELL_ODDS: u32 = 3;
pub const MIN_PORT: u16 = 10_000;
pub const MAX_PORT: u16 = 60_000;

/// Everything needed to host one match.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address for the control listener and the action socket. An IPv6
    /// address gets a dual-stack socket.
    pub bind_addr: IpAddr,
    /// Control TCP port; 0 picks a random free port from `port_range`.
    pub control_port: u16,
    pub mode: GameMode,
    pub width: usize,
    pub height: usize,
    pub tick_interval: Duration,
    pub bomb_lifetime: Duration,
    /// How often a full board snapshot is re-broadcast between diffs.
    pub snapshot_interval: Duration,
    pub empty_cell_odds: u32,
    /// Interface used for outgoing multicast; 0 lets the OS choose.
    pub interface_index: u32,
    /// Send board state here instead of the generated multicast group.
    pub broadcast_addr: Option<IpAddr>,
    pub port_range: Range<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            control_port: DEFAULT_CONTROL_PORT,
            mode: GameMode::Solo,
            width: 21,
            height: 11,
            tick_interval: Duration::from_millis(50),
            bomb_lifetime: DEFAULT_BOMB_LIFETIME,
            snapshot_interval: Duration::from_secs(1),
            empty_cell_odds: DEFAULT_EMPTY_CELL_ODDS,
            interface_index: 0,
            broadcast_addr: None,
            port_range: MIN_PORT..MAX_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.control_port, 8080);
        assert_eq!(config.mode, GameMode::Solo);
        assert!(config.bind_addr.is_unspecified());
        assert!(config.broadcast_addr.is_none());
        assert!(!config.port_range.is_empty());
        assert!(config.tick_interval < config.bomb_lifetime);
    }
}
