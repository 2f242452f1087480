//! Client peer: connects to a master, follows its assignment to a worker and
//! exchanges poses with that worker.

use log::{info, warn};
use shared::{
    process_common_message, BitStream, ConnectionManager, MessageHandler, MessageId, NetError,
    SpatialPose, Time, Transport,
};
use std::net::SocketAddr;

/// A client endpoint.
///
/// Talks to the master until it is assigned a worker, then exchanges poses
/// with that worker. A refusal leaves the peer connected to the master so it
/// can ask again.
pub struct Peer<T: Transport> {
    manager: ConnectionManager<T>,
    master: Option<SocketAddr>,
    server: Option<SocketAddr>,
    rejected: bool,
}

impl<T: Transport> Peer<T> {
    pub fn new() -> Self {
        Self {
            manager: ConnectionManager::new("client"),
            master: None,
            server: None,
            rejected: false,
        }
    }

    /// Attaches the transport and opens a connection to the master.
    pub fn initialize(&mut self, transport: T, master: SocketAddr) -> Result<(), NetError> {
        self.manager.attach(transport);
        self.master = Some(master);
        self.manager.connect(master)
    }

    /// Asks the master for a worker server.
    pub fn request_server(&mut self) -> Result<(), NetError> {
        let master = self.master.ok_or(NetError::NotInitialized)?;
        self.rejected = false;
        let stream = self.manager.begin_message(MessageId::CLIENT_MASTER_CONNECT)?;
        self.manager.send(&stream, master)
    }

    pub fn assigned_server(&self) -> Option<SocketAddr> {
        self.server
    }

    /// True when the master refused the last request for lack of servers.
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// This client's own transform.
    pub fn pose(&self) -> Option<&SpatialPose> {
        self.manager.pose.as_ref()
    }

    /// Last pose the assigned server sent, usually in answer to
    /// [`request_pose`](Self::request_pose).
    pub fn server_pose(&self) -> Option<&SpatialPose> {
        self.manager.remote_pose(self.server?)
    }

    pub fn set_pose(&mut self, pose: SpatialPose) {
        self.manager.pose = Some(pose);
    }

    /// Sends the current pose to the assigned server. Returns false when
    /// there is no server or no pose yet.
    pub fn send_pose(&mut self) -> Result<bool, NetError> {
        match self.server {
            Some(server) => self.manager.send_pose(server),
            None => Ok(false),
        }
    }

    pub fn request_pose(&mut self) -> Result<bool, NetError> {
        match self.server {
            Some(server) => {
                self.manager.request_pose(server)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Leaves the assigned server and the master.
    pub fn disconnect(&mut self) -> Result<(), NetError> {
        if let Some(server) = self.server.take() {
            self.manager.disconnect(server)?;
        }
        if let Some(master) = self.master {
            self.manager.disconnect(master)?;
        }
        Ok(())
    }

    fn follow_assignment(&mut self, stream: &mut BitStream, sender: SocketAddr) -> bool {
        let server = match stream.read::<SocketAddr>() {
            Ok(server) => server,
            Err(e) => {
                warn!("Bad server assignment from {}: {}", sender, e);
                return false;
            }
        };

        info!("Master assigned server {}", server);
        self.server = Some(server);
        if let Err(e) = self.manager.connect(server) {
            warn!("Failed to connect to server {}: {}", server, e);
        }
        true
    }
}

impl<T: Transport> Default for Peer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> MessageHandler for Peer<T> {
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
        let from_master = self.master == Some(sender);

        match id {
            MessageId::CLIENT_MASTER_CONNECT if from_master => {
                self.follow_assignment(stream, sender)
            }
            MessageId::NO_FREE_INCOMING_CONNECTIONS if from_master => {
                warn!("Master has no free server");
                self.rejected = true;
                true
            }
            MessageId::CONNECTION_REQUEST_ACCEPTED if from_master => {
                let handled = process_common_message(&mut self.manager, stream, sender, dt, id);
                if let Err(e) = self.request_server() {
                    warn!("Failed to ask master for a server: {}", e);
                }
                handled
            }
            _ => process_common_message(&mut self.manager, stream, sender, dt, id),
        }
    }
}
