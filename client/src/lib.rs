//! # Client peer
//!
//! The plain peer role. A client connects to a master, asks it for a worker
//! server, follows the assignment and then streams its compressed pose to
//! that worker.
//!
//! ## Connection Flow
//!
//! 1. `initialize` connects to the master.
//! 2. Once the master accepts, the client sends `CLIENT_MASTER_CONNECT`.
//! 3. The master answers with the worker's address, or refuses with
//!    `NO_FREE_INCOMING_CONNECTIONS` when every worker is busy.
//! 4. The client connects to the worker and exchanges
//!    `SPATIAL_DATA_SEND` / `SPATIAL_DATA_RECEIVE` messages with it.
//!
//! All of this advances only when the caller runs `message_loop`, once per
//! tick, from a single thread.

pub mod network;
