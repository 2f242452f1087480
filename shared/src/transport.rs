//! Transport collaborators
//!
//! The connection manager only needs a handful of operations from the
//! underlying reliable-UDP layer, captured by [`Transport`]. Two
//! implementations ship here: a non-blocking UDP socket for real traffic and
//! an in-memory queue for tests and local simulations.

use crate::message::MessageId;
use crate::Time;
use log::{debug, trace};
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Largest datagram we expect to receive.
pub const MAX_PACKET_SIZE: usize = 2048;

/// A raw packet as dequeued from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    pub sender: SocketAddr,
}

pub trait Transport {
    fn send(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()>;

    /// Dequeues the next packet without blocking. `Ok(None)` means the queue is empty.
    fn receive(&mut self) -> io::Result<Option<Packet>>;

    /// Local clock in milliseconds.
    fn time(&self) -> Time;

    fn connect(&mut self, addr: SocketAddr) -> io::Result<()>;

    fn disconnect(&mut self, addr: SocketAddr) -> io::Result<()>;

    fn local_addr(&self) -> SocketAddr;
}

/// Address equality that lets a wildcard-bound local address match the
/// concrete address peers see on the same port.
pub fn same_endpoint(local: SocketAddr, remote: SocketAddr) -> bool {
    local.port() == remote.port() && (local.ip().is_unspecified() || local.ip() == remote.ip())
}

/// Get current timestamp in milliseconds
pub fn get_timestamp() -> Time {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as Time
}

/// Non-blocking UDP transport.
///
/// Emulates the transport library's connection handshake: `connect` sends a
/// bare `CONNECTION_REQUEST`, the receiving side answers with
/// `CONNECTION_REQUEST_ACCEPTED` and reports `NEW_INCOMING_CONNECTION` to the
/// application in place of the request.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: Vec<u8>,
}

impl UdpTransport {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        debug!("UDP transport bound to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: vec![0u8; MAX_PACKET_SIZE],
        })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket.send_to(data, to)?;
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Option<Packet>> {
        let (len, sender) = match self.socket.recv_from(&mut self.recv_buffer) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };

        let data = &self.recv_buffer[..len];
        if data == [MessageId::CONNECTION_REQUEST.0] {
            trace!("Accepting connection from {}", sender);
            self.socket
                .send_to(&[MessageId::CONNECTION_REQUEST_ACCEPTED.0], sender)?;
            return Ok(Some(Packet {
                data: vec![MessageId::NEW_INCOMING_CONNECTION.0],
                sender,
            }));
        }

        Ok(Some(Packet {
            data: data.to_vec(),
            sender,
        }))
    }

    fn time(&self) -> Time {
        get_timestamp()
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.send(&[MessageId::CONNECTION_REQUEST.0], addr)
    }

    fn disconnect(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.send(&[MessageId::DISCONNECTION_NOTIFICATION.0], addr)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// In-process transport with a manual clock.
///
/// Incoming packets are queued with [`MemoryTransport::inject`]; everything
/// sent is recorded and can be drained with [`MemoryTransport::take_sent`].
/// A queued `CONNECTION_REQUEST` is answered the same way [`UdpTransport`]
/// answers it. Socket failures can be queued between packets with
/// [`MemoryTransport::inject_error`].
#[derive(Debug)]
pub struct MemoryTransport {
    local_addr: SocketAddr,
    clock: Time,
    inbox: VecDeque<Result<Packet, io::ErrorKind>>,
    sent: Vec<(SocketAddr, Vec<u8>)>,
}

impl MemoryTransport {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            clock: 0,
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    pub fn inject(&mut self, sender: SocketAddr, data: Vec<u8>) {
        self.inbox.push_back(Ok(Packet { data, sender }));
    }

    /// Makes the receive that reaches this point of the queue fail with `kind`.
    pub fn inject_error(&mut self, kind: io::ErrorKind) {
        self.inbox.push_back(Err(kind));
    }

    pub fn take_sent(&mut self) -> Vec<(SocketAddr, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }

    pub fn set_time(&mut self, now: Time) {
        self.clock = now;
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8], to: SocketAddr) -> io::Result<()> {
        self.sent.push((to, data.to_vec()));
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Option<Packet>> {
        let packet = match self.inbox.pop_front() {
            Some(Ok(packet)) => packet,
            Some(Err(kind)) => return Err(io::Error::from(kind)),
            None => return Ok(None),
        };

        if packet.data == [MessageId::CONNECTION_REQUEST.0] {
            self.send(&[MessageId::CONNECTION_REQUEST_ACCEPTED.0], packet.sender)?;
            return Ok(Some(Packet {
                data: vec![MessageId::NEW_INCOMING_CONNECTION.0],
                sender: packet.sender,
            }));
        }

        Ok(Some(packet))
    }

    fn time(&self) -> Time {
        self.clock
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.send(&[MessageId::CONNECTION_REQUEST.0], addr)
    }

    fn disconnect(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.send(&[MessageId::DISCONNECTION_NOTIFICATION.0], addr)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
