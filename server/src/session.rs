//! Session coordination for one hosted match.
//!
//! [`Server::run`] accepts control connections and seats each one whose
//! initial connection asks for the hosted mode, spawning a worker per seat.
//! Rejected connections are closed without taking a seat. Workers walk every seat through the handshake, meeting at
//! the join and ready barriers, then relay chat until the simulation task
//! publishes an outcome. The simulation task owns the [`GameRegistry`] and is
//! the only code that mutates game state; workers and the action ingress task
//! feed it through a channel.

use crate::barrier::Rendezvous;
use crate::config::ServerConfig;
use crate::game::{Game, GameError, Outcome};
use crate::network::{Connection, NetworkError, StatePublisher};
use crate::registry::GameRegistry;
use log::{debug, error, info, warn};
use shared::framing::{read_message, write_message};
use shared::protocol::MAX_DIFFS;
use shared::{
    team_of, Action, BoardSnapshot, BoardUpdate, ChatEntry, ChatKind, ChatMessage,
    ConnectionInfo, GameAction, GameEnd, GameMode, Message, ProtocolError, RequestCode, TileDiff,
    PLAYER_NUM,
};
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

const INGRESS_CAPACITY: usize = 1024;
const RELAY_CAPACITY: usize = 64;
const ACTION_BUFFER_SIZE: usize = 64;

/// Failures while setting up a match. These are the only fatal errors.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("invalid game settings: {0}")]
    Game(#[from] GameError),
}

/// Failures that end a single seat's session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("control stream failed: {0}")]
    Io(#[from] io::Error),

    #[error("client closed the control stream")]
    Disconnected,

    #[error("expected {expected}, received {received:?}")]
    Unexpected {
        expected: &'static str,
        received: RequestCode,
    },

    #[error("client asked for a {requested} game but this server hosts {hosted}")]
    ModeMismatch { requested: GameMode, hosted: GameMode },

    #[error("ready message names seat {received}, expected {expected}")]
    SeatMismatch { expected: usize, received: u8 },

    #[error("cannot encode reply: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where a seat worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatPhase {
    Connecting,
    AwaitingJoinBarrier,
    Assigned,
    AwaitingReadyBarrier,
    InGame,
    AwaitingEndBarrier,
    Closed,
}

/// Input handed to the simulation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    Action {
        seat: usize,
        action: Action,
    },
    Chat {
        seat: usize,
        kind: ChatKind,
        text: String,
    },
}

/// Game end message announcing `outcome`, or `None` for a draw.
pub fn game_end_for(mode: GameMode, outcome: Outcome) -> Option<GameEnd> {
    match outcome {
        Outcome::Winner(seat) => Some(GameEnd {
            mode,
            id: seat as u8,
            eq: 0,
        }),
        Outcome::WinningTeam(team) => Some(GameEnd { mode, id: 0, eq: team }),
        Outcome::Draw => None,
    }
}

/// Decodes an action datagram and checks it belongs to a `mode` match.
pub fn accept_action(mode: GameMode, datagram: &[u8]) -> Option<(usize, Action)> {
    let message = GameAction::decode(datagram)?;
    if message.mode != mode {
        return None;
    }
    let seat = usize::from(message.id);
    if mode.is_team() && message.eq != team_of(seat) {
        return None;
    }
    Some((seat, message.action))
}

/// State shared by every seat worker.
struct SessionContext {
    mode: GameMode,
    port_udp: u16,
    port_multicast: u16,
    multicast_addr: Ipv6Addr,
    join: Rendezvous,
    ready: Rendezvous,
    end: Rendezvous,
    ingress: mpsc::Sender<Ingress>,
    relay: broadcast::Sender<ChatEntry>,
    outcome: watch::Receiver<Option<Outcome>>,
}

/// Authoritative host for a single match.
pub struct Server {
    config: ServerConfig,
    connection: Connection,
    registry: GameRegistry,
    game_id: u32,
}

impl Server {
    /// Generates the game and binds every socket. Must be called from
    /// within a tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self, BootstrapError> {
        let game = Game::new(
            config.width,
            config.height,
            config.mode,
            config.bomb_lifetime,
            config.empty_cell_odds,
            &mut rand::thread_rng(),
        )?;
        let mut registry = GameRegistry::new();
        let game_id = registry.create(game);
        let connection = Connection::bind(&config)?;

        Ok(Self {
            config,
            connection,
            registry,
            game_id,
        })
    }

    pub fn control_addr(&self) -> io::Result<SocketAddr> {
        self.connection.control_addr()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Hosts the match until every seat has closed. Returns the outcome, or
    /// `None` if the match never started.
    pub async fn run(self) -> Result<Option<Outcome>, SessionError> {
        let Server {
            config,
            connection,
            registry,
            game_id,
        } = self;
        let Connection {
            listener,
            actions,
            publisher,
            port_udp,
            port_multicast,
            multicast_addr,
        } = connection;

        // Channels between the seat workers and the simulation
        let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CAPACITY);
        let (relay_tx, _) = broadcast::channel(RELAY_CAPACITY);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let ctx = Arc::new(SessionContext {
            mode: config.mode,
            port_udp,
            port_multicast,
            multicast_addr,
            join: Rendezvous::new(PLAYER_NUM),
            ready: Rendezvous::new(PLAYER_NUM),
            end: Rendezvous::new(PLAYER_NUM),
            ingress: ingress_tx.clone(),
            relay: relay_tx.clone(),
            outcome: outcome_rx,
        });

        // Decode action datagrams on their own task
        let ingress_task = tokio::spawn(run_action_ingress(actions, config.mode, ingress_tx));

        let simulation = Simulation {
            registry,
            game_id,
            publisher,
            ingress: ingress_rx,
            relay: relay_tx,
            outcome: outcome_tx,
            tick_interval: config.tick_interval,
            snapshot_interval: config.snapshot_interval,
            snapshot_num: 0,
            diff_num: 0,
            last_snapshot: None,
        };
        // The simulation idles until every seat is ready
        let simulation_task = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                ctx.ready.released().await;
                simulation.run().await
            })
        };

        info!("Waiting for {} players", PLAYER_NUM);
        let mut workers = Vec::with_capacity(PLAYER_NUM);
        let mut admissions = JoinSet::new();
        while workers.len() < PLAYER_NUM {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted control connection from {}", peer);
                        let mode = config.mode;
                        admissions.spawn(async move { (peer, admit(stream, mode).await) });
                    }
                    Err(e) => {
                        warn!("Failed to accept control connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                Some(admitted) = admissions.join_next(), if !admissions.is_empty() => match admitted {
                    // Seats are handed out only to valid handshakes so ids stay dense
                    Ok((peer, Ok(stream))) => {
                        let seat = workers.len();
                        info!("Seat {} taken by {}", seat, peer);
                        let worker = SeatWorker::new(seat, stream, peer, Arc::clone(&ctx));
                        workers.push(tokio::spawn(worker.serve()));
                    }
                    Ok((peer, Err(e))) => warn!("Rejected {}: {}", peer, e),
                    Err(e) => error!("Admission task failed: {}", e),
                },
            }
        }
        // Connections still mid-handshake are turned away
        admissions.abort_all();
        drop(listener);

        // Wait for every seat to pass the end barrier
        for (seat, worker) in workers.into_iter().enumerate() {
            match worker.await {
                Ok(Ok(())) => debug!("Seat {} finished", seat),
                Ok(Err(e)) => warn!("Seat {} ended with an error: {}", seat, e),
                Err(e) => error!("Seat {} worker panicked: {}", seat, e),
            }
        }
        ingress_task.abort();

        if !ctx.ready.is_released() {
            simulation_task.abort();
            return Ok(None);
        }
        Ok(simulation_task.await?)
    }
}

/// Reads the initial connection of a freshly accepted stream and checks it
/// asks for the hosted mode. Malformed frames are skipped.
async fn admit(mut stream: TcpStream, mode: GameMode) -> Result<TcpStream, SessionError> {
    let initial = loop {
        match read_message(&mut stream).await {
            Ok(Some(Message::Initial(initial))) => break initial,
            Ok(Some(other)) => {
                return Err(SessionError::Unexpected {
                    expected: "initial connection",
                    received: other.request_code(),
                })
            }
            Ok(None) => debug!("Dropping malformed message before the initial connection"),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(SessionError::Disconnected)
            }
            Err(e) => return Err(e.into()),
        }
    };
    if initial.mode != mode {
        return Err(SessionError::ModeMismatch {
            requested: initial.mode,
            hosted: mode,
        });
    }
    Ok(stream)
}

/// Drives one seat from handshake to close.
struct SeatWorker {
    seat: usize,
    peer: SocketAddr,
    phase: SeatPhase,
    reader: Option<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    relay: broadcast::Receiver<ChatEntry>,
    ctx: Arc<SessionContext>,
}

impl SeatWorker {
    fn new(seat: usize, stream: TcpStream, peer: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            seat,
            peer,
            phase: SeatPhase::Connecting,
            reader: Some(reader),
            writer,
            relay: ctx.relay.subscribe(),
            ctx,
        }
    }

    fn enter(&mut self, phase: SeatPhase) {
        debug!("Seat {}: {:?} -> {:?}", self.seat, self.phase, phase);
        self.phase = phase;
    }

    async fn serve(mut self) -> Result<(), SessionError> {
        let result = self.run().await;
        if let Err(e) = &result {
            warn!(
                "Seat {} ({}) failed while {:?}: {}",
                self.seat, self.peer, self.phase, e
            );
            // the others are already playing and will wait for this seat
            if self.phase == SeatPhase::InGame {
                self.enter(SeatPhase::AwaitingEndBarrier);
                self.ctx.end.wait().await;
            }
        }
        self.enter(SeatPhase::Closed);
        result
    }

    async fn run(&mut self) -> Result<(), SessionError> {
        let mode = self.ctx.mode;

        // The initial connection was checked when the seat was admitted
        self.enter(SeatPhase::AwaitingJoinBarrier);
        if self.ctx.join.wait().await {
            info!("All seats joined");
        }

        let info = ConnectionInfo {
            mode,
            id: self.seat as u8,
            eq: self.team_bit(),
            port_udp: self.ctx.port_udp,
            port_multicast: self.ctx.port_multicast,
            multicast_addr: self.ctx.multicast_addr,
        };
        write_message(&mut self.writer, &Message::Assignment(info)).await?;
        self.enter(SeatPhase::Assigned);

        let ready = match self.read_control().await? {
            Message::Ready(ready) => ready,
            other => {
                return Err(SessionError::Unexpected {
                    expected: "ready",
                    received: other.request_code(),
                })
            }
        };
        if ready.mode != mode {
            return Err(SessionError::ModeMismatch {
                requested: ready.mode,
                hosted: mode,
            });
        }
        if usize::from(ready.id) != self.seat {
            return Err(SessionError::SeatMismatch {
                expected: self.seat,
                received: ready.id,
            });
        }

        self.enter(SeatPhase::AwaitingReadyBarrier);
        if self.ctx.ready.wait().await {
            info!("All seats ready, starting the game");
        }

        self.enter(SeatPhase::InGame);
        let outcome = self.play().await?;
        if let Some(end) = outcome.and_then(|o| game_end_for(mode, o)) {
            write_message(&mut self.writer, &Message::End(end)).await?;
        }

        self.enter(SeatPhase::AwaitingEndBarrier);
        self.ctx.end.wait().await;
        if let Err(e) = self.writer.shutdown().await {
            debug!("Seat {} shutdown: {}", self.seat, e);
        }
        Ok(())
    }

    fn team_bit(&self) -> u8 {
        if self.ctx.mode.is_team() {
            team_of(self.seat)
        } else {
            0
        }
    }

    /// Next valid control message; malformed frames are skipped.
    async fn read_control(&mut self) -> Result<Message, SessionError> {
        let reader = self.reader.as_mut().ok_or(SessionError::Disconnected)?;
        loop {
            match read_message(reader).await {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => debug!("Seat {} sent a malformed message", self.seat),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(SessionError::Disconnected)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Relays chat until the simulation publishes an outcome.
    async fn play(&mut self) -> Result<Option<Outcome>, SessionError> {
        let reader = self.reader.take().ok_or(SessionError::Disconnected)?;
        let chat_task = tokio::spawn(forward_chat(self.seat, reader, self.ctx.ingress.clone()));
        let mut outcome_rx = self.ctx.outcome.clone();

        let result = loop {
            tokio::select! {
                changed = outcome_rx.changed() => {
                    if changed.is_err() {
                        break Ok(None);
                    }
                    let outcome = *outcome_rx.borrow_and_update();
                    if outcome.is_some() {
                        break Ok(outcome);
                    }
                }
                relayed = self.relay.recv() => match relayed {
                    Ok(entry) => {
                        if let Err(e) = self.deliver_chat(&entry).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Seat {} missed {} chat messages", self.seat, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break Ok(None),
                },
            }
        };

        chat_task.abort();
        result
    }

    async fn deliver_chat(&mut self, entry: &ChatEntry) -> Result<(), SessionError> {
        let sender = usize::from(entry.sender);
        let eq = match entry.kind {
            ChatKind::Global => 0,
            ChatKind::Team if team_of(sender) == team_of(self.seat) => team_of(sender),
            ChatKind::Team => return Ok(()),
        };
        let message = ChatMessage {
            kind: entry.kind,
            id: entry.sender,
            eq,
            text: entry.text.clone(),
        };
        write_message(&mut self.writer, &Message::ServerChat(message)).await?;
        Ok(())
    }
}

/// Reads chat from a seat's control stream during the game.
async fn forward_chat(seat: usize, mut reader: OwnedReadHalf, ingress: mpsc::Sender<Ingress>) {
    loop {
        match read_message(&mut reader).await {
            Ok(Some(Message::ClientChat(chat))) if usize::from(chat.id) == seat => {
                let item = Ingress::Chat {
                    seat,
                    kind: chat.kind,
                    text: chat.text,
                };
                if ingress.send(item).await.is_err() {
                    break;
                }
            }
            Ok(Some(other)) => debug!(
                "Seat {} sent unexpected {:?} during the game",
                seat,
                other.request_code()
            ),
            Ok(None) => debug!("Seat {} sent a malformed message", seat),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!("Seat {} closed its control stream", seat);
                break;
            }
            Err(e) => {
                warn!("Seat {} control stream failed: {}", seat, e);
                break;
            }
        }
    }
}

/// Decodes action datagrams and queues them for the simulation.
async fn run_action_ingress(socket: UdpSocket, mode: GameMode, ingress: mpsc::Sender<Ingress>) {
    let mut buffer = [0u8; ACTION_BUFFER_SIZE];
    loop {
        let (len, from) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Error receiving action datagram: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let Some((seat, action)) = accept_action(mode, &buffer[..len]) else {
            debug!("Dropping invalid {} byte datagram from {}", len, from);
            continue;
        };
        match ingress.try_send(Ingress::Action { seat, action }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Ingress full, dropping action from seat {}", seat),
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

/// Owns the game state once the match starts.
struct Simulation {
    registry: GameRegistry,
    game_id: u32,
    publisher: StatePublisher,
    ingress: mpsc::Receiver<Ingress>,
    relay: broadcast::Sender<ChatEntry>,
    outcome: watch::Sender<Option<Outcome>>,
    tick_interval: Duration,
    snapshot_interval: Duration,
    snapshot_num: u16,
    diff_num: u16,
    last_snapshot: Option<Instant>,
}

impl Simulation {
    async fn run(mut self) -> Option<Outcome> {
        info!("Game {} started", self.game_id);
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.broadcast_snapshot(Instant::now()).await;

        loop {
            ticker.tick().await;
            let now = Instant::now();
            let actions = self.drain_ingress();

            let Some(game) = self.registry.get_mut(self.game_id) else {
                error!("Game {} vanished from the registry", self.game_id);
                return None;
            };
            let diffs = game.update(&actions, now);
            let outcome = game.outcome();

            self.broadcast(diffs, now).await;

            if let Some(outcome) = outcome {
                info!("Game {} over: {:?}", self.game_id, outcome);
                self.outcome.send_replace(Some(outcome));
                self.registry.remove(self.game_id);
                return Some(outcome);
            }
        }
    }

    /// Collects queued actions in receipt order, relaying chat on the way.
    fn drain_ingress(&mut self) -> Vec<(usize, Action)> {
        let mut actions = Vec::new();
        while let Ok(item) = self.ingress.try_recv() {
            match item {
                Ingress::Action { seat, action } => actions.push((seat, action)),
                Ingress::Chat { seat, kind, text } => self.relay_chat(seat, kind, text),
            }
        }
        actions
    }

    fn relay_chat(&mut self, seat: usize, kind: ChatKind, text: String) {
        let Some(game) = self.registry.get_mut(self.game_id) else {
            return;
        };
        if kind == ChatKind::Team && !game.mode().is_team() {
            debug!("Dropping team chat from seat {} in a solo game", seat);
            return;
        }
        let entry = ChatEntry {
            sender: seat as u8,
            kind,
            text,
        };
        game.chat_mut().push(entry.clone());
        // fails only once every worker has left
        let _ = self.relay.send(entry);
    }

    async fn broadcast(&mut self, diffs: Vec<TileDiff>, now: Instant) {
        let snapshot_due = self
            .last_snapshot
            .map_or(true, |at| now.duration_since(at) >= self.snapshot_interval);

        if snapshot_due || diffs.len() > MAX_DIFFS {
            self.broadcast_snapshot(now).await;
        } else if !diffs.is_empty() {
            let update = BoardUpdate {
                num: self.diff_num,
                diffs,
            };
            self.diff_num = self.diff_num.wrapping_add(1);
            self.send(Message::Update(update)).await;
        }
    }

    async fn broadcast_snapshot(&mut self, now: Instant) {
        let Some(game) = self.registry.get(self.game_id) else {
            return;
        };
        let snapshot = BoardSnapshot {
            num: self.snapshot_num,
            board: game.board().clone(),
        };
        self.snapshot_num = self.snapshot_num.wrapping_add(1);
        self.last_snapshot = Some(now);
        self.send(Message::Snapshot(snapshot)).await;
    }

    async fn send(&self, message: Message) {
        match message.encode() {
            Ok(frame) => {
                if let Err(e) = self.publisher.publish(&frame).await {
                    warn!("Failed to publish board state: {}", e);
                }
            }
            Err(e) => error!("Cannot encode board state: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Board, Tile};
    use std::net::{IpAddr, Ipv4Addr};

    fn action_bytes(mode: GameMode, id: u8, eq: u8, action: Action) -> Vec<u8> {
        GameAction {
            mode,
            id,
            eq,
            num: 1,
            action,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn test_accept_action_checks_mode_and_team() {
        let solo = action_bytes(GameMode::Solo, 2, 0, Action::Left);
        assert_eq!(accept_action(GameMode::Solo, &solo), Some((2, Action::Left)));
        assert_eq!(accept_action(GameMode::Team, &solo), None);

        let good = action_bytes(GameMode::Team, 3, 0, Action::PlaceBomb);
        assert_eq!(accept_action(GameMode::Team, &good), Some((3, Action::PlaceBomb)));
        let wrong_team = action_bytes(GameMode::Team, 3, 1, Action::PlaceBomb);
        assert_eq!(accept_action(GameMode::Team, &wrong_team), None);

        assert_eq!(accept_action(GameMode::Solo, &solo[..3]), None);
    }

    #[test]
    fn test_game_end_for_outcomes() {
        assert_eq!(
            game_end_for(GameMode::Solo, Outcome::Winner(2)),
            Some(GameEnd {
                mode: GameMode::Solo,
                id: 2,
                eq: 0
            })
        );
        assert_eq!(
            game_end_for(GameMode::Team, Outcome::WinningTeam(1)),
            Some(GameEnd {
                mode: GameMode::Team,
                id: 0,
                eq: 1
            })
        );
        assert_eq!(game_end_for(GameMode::Solo, Outcome::Draw), None);
    }

    /// Simulation over an open 7x7 board, publishing to an unused loopback port.
    fn loopback_simulation(
        snapshot_interval: Duration,
    ) -> (Simulation, mpsc::Sender<Ingress>, broadcast::Receiver<ChatEntry>) {
        let config = ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: 0,
            broadcast_addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ..ServerConfig::default()
        };
        let publisher = Connection::bind(&config).unwrap().publisher;

        let mut registry = GameRegistry::new();
        let game = Game::with_board(Board::new(7, 7), GameMode::Solo, Duration::from_secs(60));
        let game_id = registry.create(game);

        let (ingress_tx, ingress_rx) = mpsc::channel(16);
        let (relay_tx, relay_rx) = broadcast::channel(16);
        let (outcome_tx, _) = watch::channel(None);

        let simulation = Simulation {
            registry,
            game_id,
            publisher,
            ingress: ingress_rx,
            relay: relay_tx,
            outcome: outcome_tx,
            tick_interval: Duration::from_millis(10),
            snapshot_interval,
            snapshot_num: 0,
            diff_num: 0,
            last_snapshot: None,
        };
        (simulation, ingress_tx, relay_rx)
    }

    #[tokio::test]
    async fn test_drain_ingress_keeps_receipt_order_and_relays_chat() {
        let (mut simulation, ingress, mut relay) = loopback_simulation(Duration::from_secs(60));

        ingress
            .send(Ingress::Action {
                seat: 1,
                action: Action::Down,
            })
            .await
            .unwrap();
        ingress
            .send(Ingress::Chat {
                seat: 1,
                kind: ChatKind::Global,
                text: "hi".to_string(),
            })
            .await
            .unwrap();
        ingress
            .send(Ingress::Chat {
                seat: 2,
                kind: ChatKind::Team,
                text: "secret".to_string(),
            })
            .await
            .unwrap();
        ingress
            .send(Ingress::Action {
                seat: 0,
                action: Action::Right,
            })
            .await
            .unwrap();

        let actions = simulation.drain_ingress();
        assert_eq!(actions, vec![(1, Action::Down), (0, Action::Right)]);

        let relayed = relay.try_recv().unwrap();
        assert_eq!(relayed.text, "hi");
        assert_eq!(relayed.sender, 1);
        // team chat is dropped in a solo game
        assert!(relay.try_recv().is_err());

        let game = simulation.registry.get(simulation.game_id).unwrap();
        assert_eq!(game.chat().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_picks_snapshot_or_diff() {
        let (mut simulation, _ingress, _relay) = loopback_simulation(Duration::from_secs(60));
        let start = Instant::now();

        simulation.broadcast_snapshot(start).await;
        assert_eq!(simulation.snapshot_num, 1);

        let diff = TileDiff {
            x: 1,
            y: 0,
            tile: Tile::Player1,
        };
        simulation.broadcast(vec![diff], start).await;
        assert_eq!(simulation.diff_num, 1);
        assert_eq!(simulation.snapshot_num, 1);

        simulation.broadcast(Vec::new(), start).await;
        assert_eq!(simulation.diff_num, 1);

        simulation.broadcast(vec![diff; MAX_DIFFS + 1], start).await;
        assert_eq!(simulation.snapshot_num, 2);
        assert_eq!(simulation.diff_num, 1);

        simulation
            .broadcast(vec![diff], start + Duration::from_secs(61))
            .await;
        assert_eq!(simulation.snapshot_num, 3);
    }
}
