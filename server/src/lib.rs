//! # Server roles
//!
//! Server-side message handling on top of the shared connection manager.
//!
//! ## Roles
//!
//! ### Worker (`worker`)
//! A [`worker::Server`] accepts the clients a master sends its way, keeps its
//! own pose, and reports to its master when it becomes busy or free again.
//!
//! ### Pool (`pool`)
//! [`pool::ServerPool`] is the master's fixed set of workers. Slots are never
//! added or removed after construction; only their availability changes.
//! Assignment is a linear first-fit scan by slot index.
//!
//! ### Master (`master`)
//! [`master::MasterServer`] listens for `CLIENT_MASTER_CONNECT`, picks a worker
//! from the pool and tells the client where to go. When the pool is exhausted
//! the client is refused with `NO_FREE_INCOMING_CONNECTIONS` and may retry.
//!
//! ## Threading
//!
//! Everything here is driven by [`master::MasterServer::tick`] (or a role's
//! `message_loop`) from a single thread. No locks are taken; ticking the same
//! role from several threads at once is not supported.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::master::MasterServer;
//! use shared::{NetConfig, UdpTransport};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NetConfig::default();
//!     let transport = UdpTransport::bind(config.master_addr()?)?;
//!     let mut master = MasterServer::new(transport, config.max_servers, |index| {
//!         UdpTransport::bind(config.worker_addr(index)?)
//!     })?;
//!
//!     loop {
//!         master.tick()?;
//!         std::thread::sleep(config.tick_duration());
//!     }
//! }
//! ```

pub mod master;
pub mod pool;
pub mod worker;
