//! Master routing role
//!
//! The master owns the worker pool and answers clients asking for a server.
//! A request is answered with `CLIENT_MASTER_CONNECT` carrying the address of
//! the assigned worker, or refused with `NO_FREE_INCOMING_CONNECTIONS` when
//! every worker is busy. Refused clients are not queued; they may ask again.
//!
//! Workers report `CLIENT_SERVER_CONNECT` / `CLIENT_SERVER_DISCONNECT` as
//! clients come and go, flipping their slot busy or available again.

use crate::pool::ServerPool;
use log::{debug, error, info, warn};
use shared::{
    process_common_message, BitStream, ConnectionManager, MessageHandler, MessageId, NetError,
    SpatialPose, Time, Transport,
};
use std::net::SocketAddr;

/// Routing endpoint that owns the worker pool.
///
/// Clients connect here first and are handed the address of a free worker.
/// The master keeps its own pose so it can answer `SPATIAL_DATA_RECEIVE` like
/// any other endpoint.
pub struct MasterServer<T: Transport> {
    manager: ConnectionManager<T>,
    pool: ServerPool<T>,
}

impl<T: Transport> MasterServer<T> {
    /// Attaches the master's transport and builds `capacity` workers, each
    /// reporting back to the master.
    pub fn new<F>(transport: T, capacity: usize, make_worker: F) -> Result<Self, NetError>
    where
        F: FnMut(usize) -> std::io::Result<T>,
    {
        let master_addr = transport.local_addr();
        let mut manager = ConnectionManager::new("master");
        manager.attach(transport);
        manager.pose = Some(SpatialPose::identity());

        let mut pool = ServerPool::new(capacity, make_worker)?;
        for server in pool.servers_mut() {
            server.set_master(master_addr);
        }

        Ok(Self { manager, pool })
    }

    /// Read access to the pool, mostly for status reporting.
    pub fn pool(&self) -> &ServerPool<T> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ServerPool<T> {
        &mut self.pool
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.manager.local_addr()
    }

    /// Hands `client` to the lowest-index available worker.
    ///
    /// Returns false when the pool is exhausted (the client is sent a refusal)
    /// or the hand-off could not be sent, in which case the claimed slot is
    /// released again.
    pub fn connect_client_to_available_server(&mut self, client: SocketAddr) -> bool {
        let Some(index) = self.pool.claim_first_available() else {
            warn!("No server available for client {}", client);
            self.reject_client(client);
            return false;
        };

        match self.hand_off(client, index) {
            Ok(worker) => {
                info!(
                    "Client {} assigned to server-{} at {} ({} free)",
                    client,
                    index,
                    worker,
                    self.pool.available_count()
                );
                true
            }
            Err(e) => {
                error!("Failed to hand client {} to server-{}: {}", client, index, e);
                self.pool.set_available(index, true);
                false
            }
        }
    }

    fn hand_off(&mut self, client: SocketAddr, index: usize) -> Result<SocketAddr, NetError> {
        let worker = self.pool.worker_addr(index)?;
        let mut stream = self.manager.begin_message(MessageId::CLIENT_MASTER_CONNECT)?;
        stream.write(&worker)?;
        self.manager.send(&stream, client)?;
        Ok(worker)
    }

    fn reject_client(&mut self, client: SocketAddr) {
        let result = self
            .manager
            .begin_message(MessageId::NO_FREE_INCOMING_CONNECTIONS)
            .and_then(|stream| self.manager.send(&stream, client));
        if let Err(e) = result {
            warn!("Failed to refuse client {}: {}", client, e);
        }
    }

    /// Runs one tick of the whole routing tier.
    ///
    /// Drains the master's queue first, then each worker's in slot order.
    /// Returns the total number of packets taken off every queue this tick.
    /// Socket errors only cut a single drain short; an error is returned only
    /// when a transport is missing.
    pub fn tick(&mut self) -> Result<usize, NetError> {
        let mut processed = self.message_loop()?;
        for server in self.pool.servers_mut() {
            processed += server.message_loop()?;
        }
        Ok(processed)
    }

    pub fn shutdown(&mut self) {
        for server in self.pool.servers_mut() {
            server.shutdown();
        }
        self.manager.shutdown();
    }
}

impl<T: Transport> MessageHandler for MasterServer<T> {
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
            MessageId::CLIENT_MASTER_CONNECT => {
                info!("Client {} requests a server ({} ms)", sender, dt);
                self.connect_client_to_available_server(sender);
                true
            }
            MessageId::CLIENT_SERVER_CONNECT | MessageId::CLIENT_SERVER_DISCONNECT => {
                let Some(index) = self.pool.find_by_addr(sender) else {
                    warn!("{} from unknown server {}", id, sender);
                    return false;
                };

                let available = id == MessageId::CLIENT_SERVER_DISCONNECT;
                if self.pool.is_available(index) == available {
                    debug!("server-{} repeated {}", index, id);
                }
                self.pool.set_available(index, available);
                info!(
                    "server-{} is now {}",
                    index,
                    if available { "available" } else { "busy" }
                );
                true
            }
            _ => process_common_message(&mut self.manager, stream, sender, dt, id),
        }
    }
}
