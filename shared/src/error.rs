//! Error type shared by every layer of the protocol core

use thiserror::Error;

/// Failures raised by the connection manager and the wire codecs.
///
/// Protocol-level outcomes such as an unrecognized identifier or an exhausted
/// server pool are not errors; they are reported through `bool` returns.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("connection manager is not initialized")]
    NotInitialized,

    #[error("connection manager has been shut down")]
    ShutDown,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("stream error: {0}")]
    Stream(#[from] bincode::Error),
}
