use clap::Parser;
use client::game::BoardCache;
use client::input::Command;
use client::network::{ClientConnection, ControlEvent, ControlReader, StateReceiver};
use log::{info, warn};
use shared::{ChatKind, GameMode};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: up/down/left/right (or w/a/s/d), bomb (b), say <text>, team <text>, show, quit";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server control address
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Game mode to ask for (solo or team)
    #[arg(short, long, default_value = "solo")]
    mode: GameMode,

    /// Listen for board state on this address instead of the assigned multicast group
    #[arg(long)]
    state: Option<IpAddr>,

    /// Network interface index used to join the multicast group
    #[arg(short, long, default_value = "0")]
    interface: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Joining a {} game at {}", args.mode, args.server);
    println!("Waiting for four players...");

    let connection = ClientConnection::join(args.server, args.mode, args.state, args.interface).await?;
    let seat = connection.seat();
    println!("You are player {}. {}", seat + 1, HELP);

    let (control, mut commander, state) = connection.into_parts();
    let cache = BoardCache::new();
    if let Some(state) = state {
        tokio::spawn(receive_state(state, cache.clone()));
    }
    let mut control_task = tokio::spawn(receive_control(control, args.mode));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Some(Command::Act(action)) => commander.send_action(action).await?,
                    Some(Command::Say(kind, text)) => commander.send_chat(kind, &text).await?,
                    Some(Command::Show) => match cache.render() {
                        Some(board) => println!("{}", board),
                        None => println!("No board received yet"),
                    },
                    Some(Command::Quit) => break,
                    None => println!("{}", HELP),
                }
            }
            _ = &mut control_task => break,
        }
    }

    info!("Leaving the game");
    Ok(())
}

async fn receive_state(mut state: StateReceiver, cache: BoardCache) {
    loop {
        match state.recv().await {
            Ok(Some(update)) => {
                if cache.apply(update) {
                    if let Some(board) = cache.render() {
                        println!("{}", board);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("State stream failed: {}", e);
                break;
            }
        }
    }
}

async fn receive_control(mut control: ControlReader, mode: GameMode) {
    loop {
        match control.recv().await {
            Ok(ControlEvent::Chat(chat)) => {
                let scope = match chat.kind {
                    ChatKind::Global => "all",
                    ChatKind::Team => "team",
                };
                println!("[{}] player {}: {}", scope, usize::from(chat.id) + 1, chat.text);
            }
            Ok(ControlEvent::GameEnd(end)) => {
                if mode.is_team() {
                    println!("Game over, team {} wins", end.eq);
                } else {
                    println!("Game over, player {} wins", usize::from(end.id) + 1);
                }
                break;
            }
            Ok(ControlEvent::Closed) => {
                println!("Game over, nobody survived");
                break;
            }
            Err(e) => {
                warn!("Control stream failed: {}", e);
                break;
            }
        }
    }
}
