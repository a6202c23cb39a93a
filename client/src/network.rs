//! Client side of the three transports.

use crate::input::InputSequencer;
use log::{debug, info};
use shared::framing::{read_message, write_message};
use shared::protocol::frame_len;
use shared::{
    Action, BoardSnapshot, BoardUpdate, ChatKind, ChatMessage, ConnectionInfo, GameAction,
    GameEnd, GameMode, InitialConnection, Message, ProtocolError, ReadyConnection, RequestCode,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};

/// Largest datagram the state stream can carry (a 255x255 snapshot).
pub const MAX_STATE_DATAGRAM: usize = 6 + 255 * 255;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("server closed the control stream")]
    Disconnected,

    #[error("expected {expected}, received {received:?}")]
    Unexpected {
        expected: &'static str,
        received: RequestCode,
    },

    #[error("cannot encode message: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not subscribed to the state stream")]
    NotSubscribed,
}

/// Board state received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    Snapshot(BoardSnapshot),
    Update(BoardUpdate),
}

/// Server messages arriving on the control stream during the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Chat(ChatMessage),
    GameEnd(GameEnd),
    /// The server closed the stream; without a prior game end this is a draw.
    Closed,
}

/// Receives snapshots and diffs on the state stream.
#[derive(Debug)]
pub struct StateReceiver {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl StateReceiver {
    /// Listens on `port`. A multicast `addr` joins that group on
    /// `interface`; any other address is bound directly.
    pub fn bind(addr: IpAddr, port: u16, interface: u32) -> Result<Self, ClientError> {
        let socket = match addr {
            IpAddr::V6(group) if group.is_multicast() => {
                let local = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
                let socket = new_udp_socket(&local)?;
                socket.join_multicast_v6(&group, interface)?;
                socket
            }
            IpAddr::V4(group) if group.is_multicast() => {
                let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
                let socket = new_udp_socket(&local)?;
                socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
                socket
            }
            unicast => new_udp_socket(&SocketAddr::new(unicast, port))?,
        };
        info!("Listening for board state on {}:{}", addr, port);

        Ok(Self {
            socket: UdpSocket::from_std(socket.into())?,
            buffer: vec![0u8; MAX_STATE_DATAGRAM],
        })
    }

    /// Waits for the next datagram. Returns `None` for anything that is not
    /// a well-formed snapshot or diff of exactly the advertised length.
    pub async fn recv(&mut self) -> Result<Option<StateUpdate>, ClientError> {
        let (len, from) = self.socket.recv_from(&mut self.buffer).await?;
        let datagram = &self.buffer[..len];
        if frame_len(datagram) != Some(len) {
            debug!("Dropping {} byte state datagram from {}", len, from);
            return Ok(None);
        }
        let update = match Message::decode(datagram) {
            Some(Message::Snapshot(snapshot)) => Some(StateUpdate::Snapshot(snapshot)),
            Some(Message::Update(update)) => Some(StateUpdate::Update(update)),
            _ => {
                debug!("Dropping non-state datagram from {}", from);
                None
            }
        };
        Ok(update)
    }
}

fn new_udp_socket(local: &SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*local), Type::DGRAM, Some(Protocol::UDP))?;
    if local.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*local).into())?;
    Ok(socket)
}

/// Reads server messages from the control stream.
#[derive(Debug)]
pub struct ControlReader {
    reader: OwnedReadHalf,
}

impl ControlReader {
    /// Next chat or game end message; malformed frames are skipped.
    pub async fn recv(&mut self) -> Result<ControlEvent, ClientError> {
        loop {
            match read_message(&mut self.reader).await {
                Ok(Some(Message::ServerChat(chat))) => return Ok(ControlEvent::Chat(chat)),
                Ok(Some(Message::End(end))) => return Ok(ControlEvent::GameEnd(end)),
                Ok(Some(other)) => debug!("Ignoring {:?} on the control stream", other.request_code()),
                Ok(None) => debug!("Dropping malformed control message"),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(ControlEvent::Closed)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn next_message(&mut self, expected: &'static str) -> Result<Message, ClientError> {
        loop {
            match read_message(&mut self.reader).await {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => debug!("Dropping malformed message while waiting for {}", expected),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(ClientError::Disconnected)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Sends actions and chat on behalf of the assigned seat.
#[derive(Debug)]
pub struct Commander {
    writer: OwnedWriteHalf,
    actions: UdpSocket,
    action_dest: SocketAddr,
    info: ConnectionInfo,
    sequencer: InputSequencer,
}

impl Commander {
    pub async fn send_action(&mut self, action: Action) -> Result<(), ClientError> {
        let message = GameAction {
            mode: self.info.mode,
            id: self.info.id,
            eq: self.info.eq,
            num: self.sequencer.next(),
            action,
        };
        let datagram = message.encode()?;
        self.actions.send_to(&datagram, self.action_dest).await?;
        Ok(())
    }

    pub async fn send_chat(&mut self, kind: ChatKind, text: &str) -> Result<(), ClientError> {
        let message = ChatMessage {
            kind,
            id: self.info.id,
            eq: self.info.eq,
            text: text.to_string(),
        };
        write_message(&mut self.writer, &Message::ClientChat(message)).await?;
        Ok(())
    }

    async fn send_ready(&mut self) -> Result<(), ClientError> {
        let ready = ReadyConnection {
            mode: self.info.mode,
            id: self.info.id,
            eq: self.info.eq,
        };
        write_message(&mut self.writer, &Message::Ready(ready)).await?;
        Ok(())
    }
}

/// A seat in a match, from handshake to game end.
#[derive(Debug)]
pub struct ClientConnection {
    control: ControlReader,
    commander: Commander,
    state: Option<StateReceiver>,
    server: SocketAddr,
}

impl ClientConnection {
    /// Connects to `server`, asks for a `mode` game and waits for the seat
    /// assignment, which arrives once every seat has joined.
    pub async fn connect(server: SocketAddr, mode: GameMode) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server).await?;
        let (reader, mut writer) = stream.into_split();
        let mut control = ControlReader { reader };

        // Ask for a seat in a game of this mode
        write_message(&mut writer, &Message::Initial(InitialConnection { mode })).await?;
        info!("Connected to {}, waiting for the other players", server);

        // The assignment only arrives once all four seats have joined
        let info = match control.next_message("seat assignment").await? {
            Message::Assignment(info) => info,
            other => {
                return Err(ClientError::Unexpected {
                    expected: "seat assignment",
                    received: other.request_code(),
                })
            }
        };
        info!(
            "Assigned seat {} (team {}), actions to port {}",
            info.id, info.eq, info.port_udp
        );

        // Actions go to the assigned port on the server's address
        let action_dest = SocketAddr::new(server.ip(), info.port_udp);
        let local = match server {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let actions = UdpSocket::bind(local).await?;

        Ok(Self {
            control,
            commander: Commander {
                writer,
                actions,
                action_dest,
                info,
                sequencer: InputSequencer::new(),
            },
            state: None,
            server,
        })
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.commander.info
    }

    pub fn seat(&self) -> usize {
        usize::from(self.commander.info.id)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Starts listening for board state, on the assigned multicast group
    /// unless `addr` overrides it.
    pub fn subscribe(&mut self, addr: Option<IpAddr>, interface: u32) -> Result<(), ClientError> {
        let info = &self.commander.info;
        let addr = addr.unwrap_or(IpAddr::V6(info.multicast_addr));
        self.state = Some(StateReceiver::bind(addr, info.port_multicast, interface)?);
        Ok(())
    }

    pub async fn ready(&mut self) -> Result<(), ClientError> {
        self.commander.send_ready().await
    }

    /// Full handshake: connect, subscribe to state, then signal ready.
    pub async fn join(
        server: SocketAddr,
        mode: GameMode,
        state_addr: Option<IpAddr>,
        interface: u32,
    ) -> Result<Self, ClientError> {
        let mut connection = Self::connect(server, mode).await?;
        connection.subscribe(state_addr, interface)?;
        connection.ready().await?;
        Ok(connection)
    }

    pub async fn send_action(&mut self, action: Action) -> Result<(), ClientError> {
        self.commander.send_action(action).await
    }

    pub async fn send_chat(&mut self, kind: ChatKind, text: &str) -> Result<(), ClientError> {
        self.commander.send_chat(kind, text).await
    }

    pub async fn recv_state(&mut self) -> Result<Option<StateUpdate>, ClientError> {
        self.state
            .as_mut()
            .ok_or(ClientError::NotSubscribed)?
            .recv()
            .await
    }

    pub async fn recv_control(&mut self) -> Result<ControlEvent, ClientError> {
        self.control.recv().await
    }

    /// Splits the connection so each direction can run in its own task.
    pub fn into_parts(self) -> (ControlReader, Commander, Option<StateReceiver>) {
        (self.control, self.commander, self.state)
    }
}
