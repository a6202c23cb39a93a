//! Server sockets: control listener, action ingress and state egress.

use crate::config::ServerConfig;
use log::{debug, info};
use rand::Rng;
use shared::PLAYER_NUM;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::ops::Range;
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};

/// Random ports tried before giving up.
pub const PORT_ATTEMPTS: usize = 250;
/// Multicast prefix of generated state groups (transient, link-local scope).
pub const MULTICAST_PREFIX: u16 = 0xff12;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("socket setup failed: {0}")]
    Io(#[from] io::Error),

    #[error("no free port in {}..{} after {attempts} attempts", .range.start, .range.end)]
    PortsExhausted { range: Range<u16>, attempts: usize },

    #[error("port range {}..{} is empty", .0.start, .0.end)]
    EmptyPortRange(Range<u16>),

    #[error("cannot send to {dest} from a socket bound to {local}")]
    AddressFamily { local: SocketAddr, dest: IpAddr },
}

fn new_socket(addr: &SocketAddr, ty: Type, protocol: Protocol) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*addr), ty, Some(protocol))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Binds a dual-stack (for IPv6 addresses) TCP listener.
///
/// Must be called from within a tokio runtime.
pub fn bind_tcp(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = new_socket(&addr, Type::STREAM, Protocol::TCP)?;
    socket.bind(&addr.into())?;
    socket.listen(PLAYER_NUM as i32)?;
    TcpListener::from_std(socket.into())
}

/// Binds a dual-stack (for IPv6 addresses) UDP socket.
///
/// Must be called from within a tokio runtime.
pub fn bind_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = new_socket(&addr, Type::DGRAM, Protocol::UDP)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Tries random ports from `range` until `bind` succeeds. Only
/// `AddrInUse` is retried; any other failure is returned immediately.
pub fn probe_port<T, R, F>(
    range: &Range<u16>,
    rng: &mut R,
    mut bind: F,
) -> Result<(T, u16), NetworkError>
where
    R: Rng + ?Sized,
    F: FnMut(u16) -> io::Result<T>,
{
    if range.is_empty() {
        return Err(NetworkError::EmptyPortRange(range.clone()));
    }
    for _ in 0..PORT_ATTEMPTS {
        let port = rng.gen_range(range.clone());
        match bind(port) {
            Ok(bound) => return Ok((bound, port)),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!("Port {} in use, trying another", port);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(NetworkError::PortsExhausted {
        range: range.clone(),
        attempts: PORT_ATTEMPTS,
    })
}

/// Random group address under [`MULTICAST_PREFIX`].
pub fn random_multicast_addr<R: Rng + ?Sized>(rng: &mut R) -> Ipv6Addr {
    Ipv6Addr::new(
        MULTICAST_PREFIX,
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
        rng.gen(),
    )
}

/// Maps `dest` onto the address family of `local`.
fn destination_for(local: SocketAddr, dest: IpAddr, port: u16) -> Result<SocketAddr, NetworkError> {
    let ip = match (local, dest) {
        (SocketAddr::V6(_), IpAddr::V4(v4)) => IpAddr::V6(v4.to_ipv6_mapped()),
        (SocketAddr::V4(_), IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .ok_or(NetworkError::AddressFamily { local, dest })?,
        _ => dest,
    };
    Ok(SocketAddr::new(ip, port))
}

/// Sends board state datagrams to the state destination.
#[derive(Debug)]
pub struct StatePublisher {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl StatePublisher {
    pub fn destination(&self) -> SocketAddr {
        self.dest
    }

    pub async fn publish(&self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(frame, self.dest).await?;
        if sent != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }
}

/// Every socket a hosted match needs, plus the coordinates handed to clients.
#[derive(Debug)]
pub struct Connection {
    pub listener: TcpListener,
    pub actions: UdpSocket,
    pub publisher: StatePublisher,
    pub port_udp: u16,
    pub port_multicast: u16,
    pub multicast_addr: Ipv6Addr,
}

impl Connection {
    /// Binds the control listener and both datagram sockets.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: &ServerConfig) -> Result<Self, NetworkError> {
        let mut rng = rand::thread_rng();
        let ip = config.bind_addr;

        let listener = if config.control_port == 0 {
            probe_port(&config.port_range, &mut rng, |port| {
                bind_tcp(SocketAddr::new(ip, port))
            })?
            .0
        } else {
            bind_tcp(SocketAddr::new(ip, config.control_port))?
        };

        let (actions, port_udp) = probe_port(&config.port_range, &mut rng, |port| {
            bind_udp(SocketAddr::new(ip, port))
        })?;

        let multicast_addr = random_multicast_addr(&mut rng);
        let mut port_multicast = rng.gen_range(config.port_range.clone());
        while port_multicast == port_udp && config.port_range.len() > 1 {
            port_multicast = rng.gen_range(config.port_range.clone());
        }

        let state_ip = config.broadcast_addr.unwrap_or(IpAddr::V6(multicast_addr));
        let publisher = Self::bind_publisher(ip, state_ip, port_multicast, config.interface_index)?;

        info!(
            "Control on {}, actions on port {}, state to {}",
            listener.local_addr()?,
            port_udp,
            publisher.dest
        );

        Ok(Self {
            listener,
            actions,
            publisher,
            port_udp,
            port_multicast,
            multicast_addr,
        })
    }

    fn bind_publisher(
        ip: IpAddr,
        state_ip: IpAddr,
        port: u16,
        interface: u32,
    ) -> Result<StatePublisher, NetworkError> {
        let local = SocketAddr::new(ip, 0);
        let socket = new_socket(&local, Type::DGRAM, Protocol::UDP)?;
        if let (IpAddr::V6(_), IpAddr::V6(group)) = (ip, state_ip) {
            if group.is_multicast() {
                socket.set_multicast_if_v6(interface)?;
                socket.set_multicast_loop_v6(true)?;
            }
        }
        socket.bind(&local.into())?;
        let socket = UdpSocket::from_std(socket.into())?;

        let dest = destination_for(socket.local_addr()?, state_ip, port)?;
        Ok(StatePublisher { socket, dest })
    }

    pub fn control_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state_destination(&self) -> SocketAddr {
        self.publisher.dest
    }
}
