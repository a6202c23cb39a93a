use clap::Parser;
use log::info;
use server::config::{ServerConfig, DEFAULT_CONTROL_PORT};
use server::game::Outcome;
use server::session::Server;
use shared::GameMode;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind; an IPv6 address accepts IPv4 clients as well
    #[arg(short = 'H', long, default_value = "::")]
    host: IpAddr,

    /// Control port, 0 picks a random free port
    #[arg(short, long, default_value_t = DEFAULT_CONTROL_PORT)]
    port: u16,

    /// Game mode (solo or team)
    #[arg(short, long, default_value = "solo")]
    mode: GameMode,

    /// Board width, rounded down to an odd number
    #[arg(short = 'W', long, default_value = "21")]
    width: usize,

    /// Board height, rounded down to an odd number
    #[arg(long, default_value = "11")]
    height: usize,

    /// Simulation tick in milliseconds
    #[arg(short, long, default_value = "50")]
    tick_ms: u64,

    /// Bomb fuse in milliseconds
    #[arg(short, long, default_value = "3000")]
    bomb_ms: u64,

    /// Interval between full board snapshots in milliseconds
    #[arg(long, default_value = "1000")]
    snapshot_ms: u64,

    /// Network interface index for outgoing multicast
    #[arg(short, long, default_value = "0")]
    interface: u32,

    /// Send board state to this address instead of a multicast group
    #[arg(long)]
    broadcast: Option<IpAddr>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.host,
            control_port: self.port,
            mode: self.mode,
            width: self.width,
            height: self.height,
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            bomb_lifetime: Duration::from_millis(self.bomb_ms),
            snapshot_interval: Duration::from_millis(self.snapshot_ms),
            interface_index: self.interface,
            broadcast_addr: self.broadcast,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting {} server on a {}x{} board",
        config.mode, config.width, config.height
    );

    let server = Server::bind(config)?;
    info!("Listening for players on {}", server.control_addr()?);

    tokio::select! {
        result = server.run() => {
            match result? {
                Some(Outcome::Winner(seat)) => info!("Seat {} wins", seat),
                Some(Outcome::WinningTeam(team)) => info!("Team {} wins", team),
                Some(Outcome::Draw) => info!("The match ended in a draw"),
                None => info!("The match never started"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
