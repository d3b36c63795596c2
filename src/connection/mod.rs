//! Collector connections: dialing, bounded write retries and lifetime
//! management.

mod manager;
mod retry;
mod transport;


use std::io;

use thiserror::Error;

use crate::config::Protocol;

pub use manager::{ConnectionManager, SendError, Session};
pub use retry::send_with_retry;
pub use transport::{ActiveConnection, Connection, Dialer, TcpDialer, TlsOptions};

/// Failure to establish a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("{endpoint} has no {protocol} address")]
    NoAddress { endpoint: String, protocol: Protocol },
    #[error("failed to connect to {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("TLS handshake with {endpoint} failed: {reason}")]
    Tls { endpoint: String, reason: String },
    /// The owning context has been shut down.
    #[error("connection manager is closed")]
    Closed,
}

/// Every permitted write attempt for one frame failed.
#[derive(Debug, Error)]
#[error("write failed after {attempts} attempt(s): {source}")]
pub struct WriteExhausted {
    pub attempts: u32,
    #[source]
    pub source: io::Error,
}
