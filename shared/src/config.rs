//! Network settings shared by the binaries

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Default port the master listens on.
pub const DEFAULT_SERVER_PORT: u16 = 7777;

/// Default number of worker servers owned by a master.
pub const MAX_SERVERS: usize = 4;

pub const DEFAULT_TICK_RATE: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    pub host: String,
    pub port: u16,
    pub max_servers: usize,
    /// Message loop iterations per second
    pub tick_rate: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
            max_servers: MAX_SERVERS,
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl NetConfig {
    pub fn master_addr(&self) -> std::io::Result<SocketAddr> {
        resolve(&self.host, self.port)
    }

    /// Workers listen on the ports directly above the master's.
    pub fn worker_addr(&self, index: usize) -> std::io::Result<SocketAddr> {
        let offset = u16::try_from(index + 1).map_err(|_| invalid_port(index))?;
        let port = self.port.checked_add(offset).ok_or_else(|| invalid_port(index))?;
        resolve(&self.host, port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }
}

fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no address for {}:{}", host, port),
        )
    })
}

fn invalid_port(index: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("worker {} port out of range", index),
    )
}
