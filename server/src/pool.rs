//! Fixed-capacity pool of worker servers owned by the master
//!
//! The pool is built once and never grows or shrinks. Each slot pairs a
//! worker with an availability flag; "available" is bookkeeping on the slot,
//! not membership in the collection.
//!
//! Selection is first-fit by slot index. There is no load balancing beyond
//! the availability flag, which keeps the assignment order predictable: a
//! client always lands on the lowest-index free worker.

use crate::worker::Server;
use log::info;
use shared::transport::same_endpoint;
use shared::{NetError, Transport};
use std::net::SocketAddr;

/// One entry of the pool.
///
/// The slot owns its worker for the lifetime of the master. Only the
/// availability flag changes after construction: it is cleared when the master
/// hands a client to the worker and set again when the worker reports that its
/// last client left.
pub struct ServerSlot<T: Transport> {
    pub server: Server<T>,
    available: bool,
}

impl<T: Transport> ServerSlot<T> {
    /// Whether the master may hand this worker a new client.
    pub fn is_available(&self) -> bool {
        self.available
    }
}

/// Exactly `capacity` slots, indexed `0..capacity`.
pub struct ServerPool<T: Transport> {
    slots: Box<[ServerSlot<T>]>,
}

impl<T: Transport> ServerPool<T> {
    /// Builds `capacity` workers, each initialized on the transport returned
    /// by `make_transport(index)`. Every slot starts out available.
    pub fn new<F>(capacity: usize, mut make_transport: F) -> Result<Self, NetError>
    where
        F: FnMut(usize) -> std::io::Result<T>,
    {
        let mut slots = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let mut server = Server::new(format!("server-{}", index));
            server.initialize(make_transport(index)?);
            slots.push(ServerSlot {
                server,
                available: true,
            });
        }

        info!("Server pool ready with {} workers", capacity);
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Lowest-index slot currently marked available.
    pub fn first_available(&self) -> Option<usize> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_available() {
                return Some(index);
            }
        }
        None
    }

    /// Same scan as [`first_available`](Self::first_available), marking the
    /// slot busy. The caller releases it with
    /// [`set_available`](Self::set_available) if the hand-off falls through.
    pub fn claim_first_available(&mut self) -> Option<usize> {
        let index = self.first_available()?;
        self.slots[index].available = false;
        Some(index)
    }

    pub fn is_available(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(ServerSlot::is_available)
    }

    /// Returns false when `index` is outside the pool.
    pub fn set_available(&mut self, index: usize, available: bool) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.available = available;
                true
            }
            None => false,
        }
    }

    /// Number of workers that can take a client right now.
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_available()).count()
    }

    /// Availability flags in slot order.
    pub fn availability(&self) -> Vec<bool> {
        self.slots.iter().map(ServerSlot::is_available).collect()
    }

    /// Slot whose worker listens on `addr`.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.server
                .local_addr()
                .is_ok_and(|local| same_endpoint(local, addr))
        })
    }

    /// Address handed to clients assigned to slot `index`. Fails for an
    /// index outside the pool or a worker whose transport is gone.
    pub fn worker_addr(&self, index: usize) -> Result<SocketAddr, NetError> {
        match self.slots.get(index) {
            Some(slot) => slot.server.local_addr(),
            None => Err(NetError::NotInitialized),
        }
    }

    pub fn server(&self, index: usize) -> Option<&Server<T>> {
        self.slots.get(index).map(|slot| &slot.server)
    }

    pub fn slots(&self) -> &[ServerSlot<T>] {
        &self.slots
    }

    pub fn servers_mut(&mut self) -> impl Iterator<Item = &mut Server<T>> {
        self.slots.iter_mut().map(|slot| &mut slot.server)
    }
}
