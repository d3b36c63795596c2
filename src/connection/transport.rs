//! Transport primitives: the dial/write seams and the TCP/TLS implementation.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

use crate::config::{Endpoint, Protocol, Settings};

use super::ConnectError;

/// An open stream to the collector.
pub trait Connection: Send {
    /// Write one complete frame and flush it.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Close the stream. Called exactly once by the owner.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens connections to the collector.
pub trait Dialer: Send + Sync {
    fn dial(&self) -> Result<Box<dyn Connection>, ConnectError>;
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> Result<TlsConnector, native_tls::Error> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build()
    }
}

/// Dials the collector over TCP, wrapping the stream in TLS when configured.
#[derive(Clone, Debug)]
pub struct TcpDialer {
    /// Host and port to connect to.
    pub endpoint: Endpoint,
    /// Restricts resolved addresses to one family when not [`Protocol::Tcp`].
    pub protocol: Protocol,
    /// TLS parameters; `None` for a plaintext stream.
    pub tls: Option<TlsOptions>,
    /// Applies to the TCP connect and again to the TLS handshake.
    pub connect_timeout: Duration,
    /// Write timeout set on the socket once connected.
    pub write_timeout: Duration,
}

impl TcpDialer {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            protocol: settings.protocol,
            tls: settings.tls.clone(),
            connect_timeout: settings.connect_timeout,
            write_timeout: settings.write_timeout,
        }
    }

    fn socket_addrs(&self) -> Result<Vec<SocketAddr>, ConnectError> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        let addrs: Vec<SocketAddr> = addrs
            .filter(|addr| match self.protocol {
                Protocol::Tcp => true,
                Protocol::Tcp4 => addr.is_ipv4(),
                Protocol::Tcp6 => addr.is_ipv6(),
            })
            .collect();
        if addrs.is_empty() {
            return Err(ConnectError::NoAddress {
                endpoint: self.endpoint.to_string(),
                protocol: self.protocol,
            });
        }
        Ok(addrs)
    }

    fn connect_tcp(&self) -> Result<TcpStream, ConnectError> {
        let mut last_err = None;
        for addr in self.socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nonblocking(false).map_err(|e| self.io_error(e))?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(self.io_error(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::TimedOut, "no address accepted the connection")
        })))
    }

    fn io_error(&self, source: io::Error) -> ConnectError {
        ConnectError::Io {
            endpoint: self.endpoint.to_string(),
            source,
        }
    }

    fn tls_error(&self, reason: impl ToString) -> ConnectError {
        ConnectError::Tls {
            endpoint: self.endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self) -> Result<Box<dyn Connection>, ConnectError> {
        let stream = self.connect_tcp()?;
        let connection = if let Some(tls) = &self.tls {
            let connector = tls.connector().map_err(|e| self.tls_error(e))?;
            // Bound the handshake by the connect timeout, then hand over to the
            // write timeout for the life of the stream.
            stream
                .set_read_timeout(Some(self.connect_timeout))
                .and_then(|()| stream.set_write_timeout(Some(self.connect_timeout)))
                .map_err(|e| self.io_error(e))?;
            let stream = connector
                .connect(&tls.domain, stream)
                .map_err(|e| self.tls_error(e))?;
            let tcp_ref = stream.get_ref();
            tcp_ref
                .set_read_timeout(None)
                .and_then(|()| tcp_ref.set_write_timeout(Some(self.write_timeout)))
                .map_err(|e| self.io_error(e))?;
            ActiveConnection::Tls(Box::new(stream))
        } else {
            stream
                .set_write_timeout(Some(self.write_timeout))
                .map_err(|e| self.io_error(e))?;
            ActiveConnection::PlainTcp(stream)
        };
        Ok(Box::new(connection))
    }
}

/// Active socket connection state.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection for ActiveConnection {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
            ActiveConnection::Tls(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let result = match self {
            ActiveConnection::PlainTcp(stream) => stream.shutdown(Shutdown::Both),
            ActiveConnection::Tls(stream) => stream
                .shutdown()
                .and_then(|()| stream.get_ref().shutdown(Shutdown::Both)),
        };
        match result {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
