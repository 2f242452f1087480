//! Worker server role
//!
//! A worker handles the traffic of the clients a master assigns to it. It
//! keeps its own pose and tells its master whenever it gains its first client
//! or loses its last one, which is what drives the master's availability
//! bookkeeping.

use log::{debug, info, warn};
use shared::{
    process_common_message, BitStream, ConnectionManager, MessageHandler, MessageId, NetError,
    SpatialPose, Time, Transport,
};
use std::net::SocketAddr;

/// A worker server.
///
/// Workers are created by the server pool and live as long as the master. A
/// worker's client list only holds peers that opened a connection to it; the
/// master itself is never counted as a client.
pub struct Server<T: Transport> {
    manager: ConnectionManager<T>,
    master: Option<SocketAddr>,
    clients: Vec<SocketAddr>,
}

impl<T: Transport> Server<T> {
    /// Creates an uninitialized worker. `name` tags its log lines.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            manager: ConnectionManager::new(name),
            master: None,
            clients: Vec::new(),
        }
    }

    /// Attaches the listening transport and allocates this server's pose.
    pub fn initialize(&mut self, transport: T) {
        self.manager.attach(transport);
        self.manager.pose = Some(SpatialPose::identity());
    }

    /// Sets the endpoint that receives this worker's connect and disconnect
    /// reports. Without a master the worker reports nothing.
    pub fn set_master(&mut self, master: SocketAddr) {
        self.master = Some(master);
    }

    pub fn master(&self) -> Option<SocketAddr> {
        self.master
    }

    /// Connected clients in the order they joined.
    pub fn clients(&self) -> &[SocketAddr] {
        &self.clients
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.manager.local_addr()
    }

    /// This worker's own transform, served to clients that ask for it.
    pub fn pose(&self) -> Option<&SpatialPose> {
        self.manager.pose.as_ref()
    }

    /// Last pose `client` sent to this worker.
    pub fn client_pose(&self, client: SocketAddr) -> Option<&SpatialPose> {
        self.manager.remote_pose(client)
    }

    pub fn shutdown(&mut self) {
        self.manager.shutdown();
    }

    fn add_client(&mut self, client: SocketAddr) {
        if self.master == Some(client) || self.clients.contains(&client) {
            return;
        }

        self.clients.push(client);
        info!("{}: client {} joined", self.manager.name(), client);
        if self.clients.len() == 1 {
            self.report(MessageId::CLIENT_SERVER_CONNECT);
        }
    }

    fn remove_client(&mut self, client: SocketAddr) {
        let Some(position) = self.clients.iter().position(|c| *c == client) else {
            return;
        };

        self.clients.remove(position);
        info!("{}: client {} left", self.manager.name(), client);
        if self.clients.is_empty() {
            self.report(MessageId::CLIENT_SERVER_DISCONNECT);
        }
    }

    fn report(&mut self, id: MessageId) {
        let Some(master) = self.master else {
            return;
        };

        let result = self
            .manager
            .begin_message(id)
            .and_then(|stream| self.manager.send(&stream, master));
        if let Err(e) = result {
            warn!("{}: failed to report {} to master: {}", self.manager.name(), id, e);
        }
    }
}

impl<T: Transport> MessageHandler for Server<T> {
    type Transport = T;

    fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    fn manager_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.manager
    }

    fn process_message(
        &mut self,
        stream: &mut BitStream,
        sender: SocketAddr,
        dt: Time,
        id: MessageId,
    ) -> bool {
        match id {
            MessageId::NEW_INCOMING_CONNECTION => self.add_client(sender),
            MessageId::DISCONNECTION_NOTIFICATION | MessageId::CONNECTION_LOST => {
                self.remove_client(sender)
            }
            _ => {}
        }

        let handled = process_common_message(&mut self.manager, stream, sender, dt, id);
        if handled && id == MessageId::SPATIAL_DATA_SEND {
            if let Some(pose) = self.client_pose(sender) {
                debug!(
                    "{}: client {} at {:?}",
                    self.manager.name(),
                    sender,
                    pose.translate
                );
            }
        }
        handled
    }
}
