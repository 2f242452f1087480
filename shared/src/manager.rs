//! Connection manager and message dispatch
//!
//! [`ConnectionManager`] owns the transport handle for one endpoint and offers
//! the framed send helpers every role needs. Roles implement
//! [`MessageHandler`]: they try their own identifier range first and hand
//! anything else to [`process_common_message`].
//!
//! A manager keeps its own transform apart from the poses peers send it.
//! `SPATIAL_DATA_SEND` files the decoded pose under the sender's address, so a
//! worker serving several clients never answers one client's
//! `SPATIAL_DATA_RECEIVE` with another client's pose.

use crate::error::NetError;
use crate::framing;
use crate::message::MessageId;
use crate::pose::SpatialPose;
use crate::stream::BitStream;
use crate::transport::{Packet, Transport};
use crate::Time;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Uninitialized,
    /// Transport attached, message loop not yet run
    Initialized,
    Active,
    ShutDown,
}

/// Exclusive owner of one transport handle.
///
/// The handle starts out empty and is released on [`shutdown`](Self::shutdown)
/// or drop, whichever comes first. Every operation that needs the transport
/// fails with [`NetError::NotInitialized`] before [`attach`](Self::attach).
pub struct ConnectionManager<T: Transport> {
    name: String,
    transport: Option<T>,
    state: PeerState,
    /// Latest known transform for this endpoint
    pub pose: Option<SpatialPose>,
    remote_poses: HashMap<SocketAddr, SpatialPose>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: None,
            state: PeerState::Uninitialized,
            pose: None,
            remote_poses: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Last pose received from `peer`, if it ever sent one.
    pub fn remote_pose(&self, peer: SocketAddr) -> Option<&SpatialPose> {
        self.remote_poses.get(&peer)
    }

    /// Takes ownership of a bound transport. Any previous handle is released.
    pub fn attach(&mut self, transport: T) {
        info!("{} initialized on {}", self.name, transport.local_addr());
        self.transport = Some(transport);
        self.state = PeerState::Initialized;
    }

    pub fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            info!("{} shutting down ({})", self.name, transport.local_addr());
        }
        self.state = PeerState::ShutDown;
    }

    pub fn transport(&self) -> Result<&T, NetError> {
        match self.transport.as_ref() {
            Some(transport) => Ok(transport),
            None => Err(self.missing_transport()),
        }
    }

    pub fn transport_mut(&mut self) -> Result<&mut T, NetError> {
        let missing = self.missing_transport();
        self.transport.as_mut().ok_or(missing)
    }

    fn missing_transport(&self) -> NetError {
        if self.state == PeerState::ShutDown {
            NetError::ShutDown
        } else {
            NetError::NotInitialized
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.transport()?.local_addr())
    }

    pub fn time(&self) -> Result<Time, NetError> {
        Ok(self.transport()?.time())
    }

    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), NetError> {
        debug!("{} connecting to {}", self.name, addr);
        self.transport_mut()?.connect(addr)?;
        Ok(())
    }

    pub fn disconnect(&mut self, addr: SocketAddr) -> Result<(), NetError> {
        self.transport_mut()?.disconnect(addr)?;
        Ok(())
    }

    /// Dequeues one packet. The first successful poll marks the manager active.
    pub fn receive(&mut self) -> Result<Option<Packet>, NetError> {
        let packet = self.transport_mut()?.receive()?;
        if self.state == PeerState::Initialized {
            self.state = PeerState::Active;
        }
        Ok(packet)
    }

    pub fn send(&mut self, stream: &BitStream, to: SocketAddr) -> Result<(), NetError> {
        self.transport_mut()?.send(stream.as_bytes(), to)?;
        Ok(())
    }

    /// Starts a packet with the timestamp header and the given identifier.
    pub fn begin_message(&self, id: MessageId) -> Result<BitStream, NetError> {
        let mut stream = BitStream::new();
        framing::write_timestamp(&mut stream, self.time()?)?;
        stream.write(&id)?;
        Ok(stream)
    }

    pub fn send_greeting(&mut self, to: SocketAddr) -> Result<(), NetError> {
        let mut stream = self.begin_message(MessageId::COMMON_BEGIN)?;
        framing::write_test(&mut stream, &format!("Hello from {}", self.name))?;
        self.send(&stream, to)
    }

    /// Sends the current pose, compressing it first. Returns false when no
    /// pose is held.
    pub fn send_pose(&mut self, to: SocketAddr) -> Result<bool, NetError> {
        let Some(mut pose) = self.pose else {
            return Ok(false);
        };

        let mut stream = self.begin_message(MessageId::SPATIAL_DATA_SEND)?;
        pose.compress_into(&mut stream)?;
        self.pose = Some(pose);
        self.send(&stream, to)?;
        Ok(true)
    }

    /// Asks a remote endpoint for its pose.
    pub fn request_pose(&mut self, from: SocketAddr) -> Result<(), NetError> {
        let stream = self.begin_message(MessageId::SPATIAL_DATA_RECEIVE)?;
        self.send(&stream, from)
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            self.shutdown();
        }
    }
}

/// Role-specific packet handling on top of a [`ConnectionManager`].
pub trait MessageHandler {
    type Transport: Transport;

    fn manager(&self) -> &ConnectionManager<Self::Transport>;

    fn manager_mut(&mut self) -> &mut ConnectionManager<Self::Transport>;

    /// Interprets one message. `stream` is positioned just after the
    /// identifier. Returns whether the message was recognized and consumed.
    fn process_message(
        &mut self,
        stream: &mut BitStream,
        sender: SocketAddr,
        dt: Time,
        id: MessageId,
    ) -> bool;

    /// Drains every packet currently queued on the transport.
    ///
    /// Returns how many packets were taken off the queue, whether or not the
    /// role recognized them. A socket error ends the drain for this call and
    /// the packets taken so far are still counted; only a missing transport is
    /// reported as an error.
    fn message_loop(&mut self) -> Result<usize, NetError> {
        let mut processed = 0;

        loop {
            let packet = match self.manager_mut().receive() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(NetError::Transport(e)) => {
                    warn!("{}: receive failed: {}", self.manager().name(), e);
                    break;
                }
                Err(e) => return Err(e),
            };

            processed += 1;
            let now = self.manager().time()?;
            let mut stream = BitStream::from(packet.data);

            let (dt, id) = match framing::read_timestamp(&mut stream, now) {
                Ok(header) => header,
                Err(e) => {
                    warn!("Malformed packet from {}: {}", packet.sender, e);
                    continue;
                }
            };

            if self.process_message(&mut stream, packet.sender, dt, id) {
                continue;
            }

            if id.is_common() || id.is_server() {
                warn!(
                    "{}: could not process {} from {}",
                    self.manager().name(),
                    id,
                    packet.sender
                );
            } else {
                debug!(
                    "{}: unhandled message {} from {}",
                    self.manager().name(),
                    id,
                    packet.sender
                );
            }
        }

        Ok(processed)
    }
}

/// Handles the transport notifications and the common identifier block.
pub fn process_common_message<T: Transport>(
    manager: &mut ConnectionManager<T>,
    stream: &mut BitStream,
    sender: SocketAddr,
    dt: Time,
    id: MessageId,
) -> bool {
    match id {
        MessageId::CONNECTION_REQUEST_ACCEPTED => {
            info!("{}: connection to {} accepted", manager.name(), sender);
            if let Err(e) = manager.send_greeting(sender) {
                warn!("{}: failed to greet {}: {}", manager.name(), sender, e);
            }
            true
        }
        MessageId::CONNECTION_ATTEMPT_FAILED => {
            warn!("{}: connection to {} failed", manager.name(), sender);
            true
        }
        MessageId::NEW_INCOMING_CONNECTION => {
            info!("{}: incoming connection from {}", manager.name(), sender);
            true
        }
        MessageId::DISCONNECTION_NOTIFICATION | MessageId::CONNECTION_LOST => {
            info!("{}: {} disconnected", manager.name(), sender);
            manager.remote_poses.remove(&sender);
            true
        }
        MessageId::COMMON_BEGIN => match framing::read_test(stream) {
            Ok(text) => {
                info!("{}: {} says \"{}\" ({} ms)", manager.name(), sender, text, dt);
                true
            }
            Err(e) => {
                warn!("{}: bad greeting from {}: {}", manager.name(), sender, e);
                false
            }
        },
        MessageId::SPATIAL_DATA_SEND => {
            let mut pose = manager
                .remote_poses
                .get(&sender)
                .copied()
                .unwrap_or_default();
            match pose.decompress_from(stream) {
                Ok(()) => {
                    debug!("{}: pose from {} ({} ms old)", manager.name(), sender, dt);
                    manager.remote_poses.insert(sender, pose);
                    true
                }
                Err(e) => {
                    warn!("{}: bad pose from {}: {}", manager.name(), sender, e);
                    false
                }
            }
        }
        MessageId::SPATIAL_DATA_RECEIVE => {
            match manager.send_pose(sender) {
                Ok(true) => {}
                Ok(false) => debug!("{}: no pose to send to {}", manager.name(), sender),
                Err(e) => warn!("{}: failed to send pose to {}: {}", manager.name(), sender, e),
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, UdpTransport};
    use assert_approx_eq::assert_approx_eq;
    use std::io;

    fn local() -> SocketAddr {
        "127.0.0.1:7777".parse().unwrap()
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    struct PlainPeer {
        manager: ConnectionManager<MemoryTransport>,
        seen: Vec<(MessageId, Time)>,
    }

    impl PlainPeer {
        fn new() -> Self {
            let mut manager = ConnectionManager::new("peer");
            manager.attach(MemoryTransport::new(local()));
            Self {
                manager,
                seen: Vec::new(),
            }
        }

        fn inject(&mut self, data: Vec<u8>) {
            self.manager.transport_mut().unwrap().inject(remote(), data);
        }
    }

    impl MessageHandler for PlainPeer {
        type Transport = MemoryTransport;

        fn manager(&self) -> &ConnectionManager<MemoryTransport> {
            &self.manager
        }

        fn manager_mut(&mut self) -> &mut ConnectionManager<MemoryTransport> {
            &mut self.manager
        }

        fn process_message(
            &mut self,
            stream: &mut BitStream,
            sender: SocketAddr,
            dt: Time,
            id: MessageId,
        ) -> bool {
            self.seen.push((id, dt));
            process_common_message(&mut self.manager, stream, sender, dt, id)
        }
    }

    fn framed(id: MessageId, sent_at: Time) -> BitStream {
        let mut stream = BitStream::new();
        framing::write_timestamp(&mut stream, sent_at).unwrap();
        stream.write(&id).unwrap();
        stream
    }

    #[test]
    fn test_lifecycle_states() {
        let mut manager: ConnectionManager<MemoryTransport> = ConnectionManager::new("peer");
        assert_eq!(manager.state(), PeerState::Uninitialized);

        manager.attach(MemoryTransport::new(local()));
        assert_eq!(manager.state(), PeerState::Initialized);

        assert!(manager.receive().unwrap().is_none());
        assert_eq!(manager.state(), PeerState::Active);

        manager.shutdown();
        assert_eq!(manager.state(), PeerState::ShutDown);
        assert!(matches!(manager.receive(), Err(NetError::ShutDown)));
    }

    #[test]
    fn test_uninitialized_use_fails_fast() {
        let mut manager: ConnectionManager<MemoryTransport> = ConnectionManager::new("peer");
        assert!(matches!(manager.time(), Err(NetError::NotInitialized)));
        assert!(matches!(manager.connect(remote()), Err(NetError::NotInitialized)));
        assert!(matches!(
            manager.begin_message(MessageId::COMMON_BEGIN),
            Err(NetError::NotInitialized)
        ));
    }

    #[test]
    fn test_message_loop_before_initialize() {
        let mut peer = PlainPeer {
            manager: ConnectionManager::new("peer"),
            seen: Vec::new(),
        };
        assert!(matches!(peer.message_loop(), Err(NetError::NotInitialized)));
    }

    #[test]
    fn test_message_loop_empty_queue() {
        let mut peer = PlainPeer::new();
        assert_eq!(peer.message_loop().unwrap(), 0);
    }

    #[test]
    fn test_message_loop_counts_every_packet() {
        let mut peer = PlainPeer::new();
        peer.inject(framed(MessageId::SERVER_END, 0).into_bytes());
        peer.inject(vec![MessageId::NEW_INCOMING_CONNECTION.0]);
        peer.inject(framed(MessageId(250), 0).into_bytes());
        peer.inject(vec![]);

        assert_eq!(peer.message_loop().unwrap(), 4);
        assert_eq!(peer.message_loop().unwrap(), 0);
        // the empty packet never reached dispatch
        assert_eq!(peer.seen.len(), 3);
    }

    #[test]
    fn test_message_loop_preserves_order_and_delay() {
        let mut peer = PlainPeer::new();
        peer.manager.transport_mut().unwrap().set_time(1_000);
        peer.inject(framed(MessageId::SPATIAL_DATA_RECEIVE, 900).into_bytes());
        peer.inject(framed(MessageId(200), 990).into_bytes());

        peer.message_loop().unwrap();
        assert_eq!(
            peer.seen,
            vec![(MessageId::SPATIAL_DATA_RECEIVE, 100), (MessageId(200), 10)]
        );
    }

    #[test]
    fn test_unrecognized_identifier_is_not_handled() {
        let mut manager = ConnectionManager::new("peer");
        manager.attach(MemoryTransport::new(local()));
        let mut stream = BitStream::new();

        assert!(!process_common_message(
            &mut manager,
            &mut stream,
            remote(),
            0,
            MessageId::CLIENT_MASTER_CONNECT
        ));
    }

    #[test]
    fn test_message_loop_stops_drain_on_socket_error() {
        let mut peer = PlainPeer::new();
        peer.inject(framed(MessageId(200), 0).into_bytes());
        peer.manager
            .transport_mut()
            .unwrap()
            .inject_error(io::ErrorKind::ConnectionReset);
        peer.inject(framed(MessageId(201), 0).into_bytes());

        assert_eq!(peer.message_loop().unwrap(), 1);
        assert_eq!(peer.manager.state(), PeerState::Active);
        // the next tick picks up where the failed one stopped
        assert_eq!(peer.message_loop().unwrap(), 1);
        assert_eq!(peer.seen, vec![(MessageId(200), 0), (MessageId(201), 0)]);
    }

    fn pose_packet(pose: &mut SpatialPose) -> Vec<u8> {
        let mut stream = framed(MessageId::SPATIAL_DATA_SEND, 0);
        pose.compress_into(&mut stream).unwrap();
        stream.into_bytes()
    }

    #[test]
    fn test_spatial_data_send_records_sender_pose() {
        let mut peer = PlainPeer::new();
        peer.manager.pose = Some(SpatialPose::identity());

        let mut pose = SpatialPose::new([1.0, 1.0, 1.0], [0.25, 0.5, 0.75], [10.0, -2.0, 4.0]);
        peer.inject(pose_packet(&mut pose));

        peer.message_loop().unwrap();
        let received = *peer.manager.remote_pose(remote()).unwrap();
        assert_approx_eq!(received.rotate[1], 0.5, 0.0014);
        assert_approx_eq!(received.translate[0], 10.0, 0.0014);
        assert_eq!(received.comp_translate, pose.comp_translate);
        assert_eq!(peer.manager.pose, Some(SpatialPose::identity()));
    }

    #[test]
    fn test_pose_request_is_answered_with_own_pose() {
        let mut peer = PlainPeer::new();
        peer.manager.pose = Some(SpatialPose::identity());
        let other: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        let mut pose = SpatialPose::new([3.0; 3], [0.0; 3], [-8.0; 3]);
        peer.manager
            .transport_mut()
            .unwrap()
            .inject(other, pose_packet(&mut pose));
        peer.inject(framed(MessageId::SPATIAL_DATA_RECEIVE, 0).into_bytes());
        peer.message_loop().unwrap();

        let sent = peer.manager.transport_mut().unwrap().take_sent();
        assert_eq!(sent.len(), 1);
        let mut reply = BitStream::from(sent[0].1.clone());
        framing::read_timestamp(&mut reply, 0).unwrap();
        let mut decoded = SpatialPose::default();
        decoded.decompress_from(&mut reply).unwrap();
        assert_approx_eq!(decoded.scale[0], 1.0, 0.0014);
        assert_approx_eq!(decoded.translate[0], 0.0, 0.0014);
    }

    #[test]
    fn test_disconnect_forgets_remote_pose() {
        let mut peer = PlainPeer::new();
        let mut pose = SpatialPose::identity();
        peer.inject(pose_packet(&mut pose));
        peer.message_loop().unwrap();
        assert!(peer.manager.remote_pose(remote()).is_some());

        peer.inject(vec![MessageId::DISCONNECTION_NOTIFICATION.0]);
        peer.message_loop().unwrap();
        assert!(peer.manager.remote_pose(remote()).is_none());
    }

    #[test]
    fn test_truncated_pose_is_rejected() {
        let mut manager = ConnectionManager::new("peer");
        manager.attach(MemoryTransport::new(local()));
        let mut stream = BitStream::from(vec![0, 0, 0]);

        assert!(!process_common_message(
            &mut manager,
            &mut stream,
            remote(),
            0,
            MessageId::SPATIAL_DATA_SEND
        ));
        assert!(manager.pose.is_none());
        assert!(manager.remote_pose(remote()).is_none());
    }

    #[test]
    fn test_pose_request_replies_with_pose() {
        let mut peer = PlainPeer::new();
        peer.manager.pose = Some(SpatialPose::identity());
        peer.inject(framed(MessageId::SPATIAL_DATA_RECEIVE, 0).into_bytes());

        peer.message_loop().unwrap();
        let sent = peer.manager.transport_mut().unwrap().take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, remote());

        let mut reply = BitStream::from(sent[0].1.clone());
        let (_, id) = framing::read_timestamp(&mut reply, 0).unwrap();
        assert_eq!(id, MessageId::SPATIAL_DATA_SEND);
        let mut decoded = SpatialPose::default();
        decoded.decompress_from(&mut reply).unwrap();
        assert_approx_eq!(decoded.scale[0], 1.0, 0.0014);
    }

    #[test]
    fn test_pose_request_without_pose_sends_nothing() {
        let mut peer = PlainPeer::new();
        peer.inject(framed(MessageId::SPATIAL_DATA_RECEIVE, 0).into_bytes());

        peer.message_loop().unwrap();
        assert!(peer.manager.transport_mut().unwrap().take_sent().is_empty());
    }

    #[test]
    fn test_accepted_connection_sends_greeting() {
        let mut peer = PlainPeer::new();
        peer.inject(vec![MessageId::CONNECTION_REQUEST_ACCEPTED.0]);
        peer.message_loop().unwrap();

        let sent = peer.manager.transport_mut().unwrap().take_sent();
        assert_eq!(sent.len(), 1);
        let mut greeting = BitStream::from(sent[0].1.clone());
        let (_, id) = framing::read_timestamp(&mut greeting, 0).unwrap();
        assert_eq!(id, MessageId::COMMON_BEGIN);
        assert_eq!(framing::read_test(&mut greeting).unwrap(), "Hello from peer");
    }

    #[test]
    fn test_drop_releases_transport() {
        let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let transport = UdpTransport::bind(loopback).unwrap();
        let bound = transport.local_addr();

        let mut manager = ConnectionManager::new("peer");
        manager.attach(transport);
        // the port is held while the manager lives
        assert!(UdpTransport::bind(bound).is_err());

        drop(manager);
        assert!(UdpTransport::bind(bound).is_ok());
    }

    #[test]
    fn test_shutdown_releases_transport() {
        let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let transport = UdpTransport::bind(loopback).unwrap();
        let bound = transport.local_addr();

        let mut manager = ConnectionManager::new("peer");
        manager.attach(transport);
        manager.shutdown();
        assert!(UdpTransport::bind(bound).is_ok());
    }

    #[test]
    fn test_drop_without_initialize() {
        let manager: ConnectionManager<MemoryTransport> = ConnectionManager::new("peer");
        assert_eq!(manager.state(), PeerState::Uninitialized);
        drop(manager);
    }
}
