//! # Shared protocol core
//!
//! Everything both ends of a connection must agree on: message identifiers,
//! the packet stream, the timestamp header, the spatial pose codec, and the
//! connection manager that turns queued packets into dispatched messages.
//!
//! ## Packet layout
//!
//! ```text
//! [TIMESTAMP: u8][send time: u64][message id: u8][payload...]
//! ```
//!
//! Transport notifications (connection accepted, new incoming connection,
//! disconnection) arrive as a bare identifier byte with no header.
//!
//! ## Dispatch
//!
//! A role wraps a [`ConnectionManager`] and implements [`MessageHandler`]. Its
//! `process_message` matches its own identifiers first and falls back to
//! [`process_common_message`] for everything else. Calling
//! [`MessageHandler::message_loop`] once per tick drains the transport queue
//! synchronously, so all state changes happen on the caller's thread.

pub mod config;
pub mod error;
pub mod framing;
pub mod manager;
pub mod message;
pub mod pose;
pub mod stream;
pub mod transport;

/// Clock value in milliseconds, as supplied by the transport.
pub type Time = u64;

pub use config::{NetConfig, DEFAULT_SERVER_PORT, MAX_SERVERS};
pub use error::NetError;
pub use manager::{process_common_message, ConnectionManager, MessageHandler, PeerState};
pub use message::MessageId;
pub use pose::SpatialPose;
pub use stream::BitStream;
pub use transport::{MemoryTransport, Packet, Transport, UdpTransport};
