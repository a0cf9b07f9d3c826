//! Transport primitives for the network handler.
//!
//! A [`NetworkTarget`] is parsed from a connection string such as
//! `tcp://graylog.internal:12201` or `udp://[::1]:12201`. A [`Connector`]
//! turns it into a fresh writable connection each time the handler needs
//! one; [`SocketConnector`] is the real implementation and tests can supply
//! their own.

use crate::core::LoggerError;
use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::str::FromStr;
use std::time::Duration;

const COMPONENT: &str = "NetworkHandler";

/// Socket flavour used to reach the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Reliable byte stream (TCP)
    Tcp,
    /// One datagram per record (UDP)
    Udp,
}

impl Transport {
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }

    pub fn is_datagram(&self) -> bool {
        matches!(self, Transport::Udp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Parsed collector address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTarget {
    pub transport: Transport,
    /// Hostname or IP address, without IPv6 brackets
    pub host: String,
    pub port: u16,
}

impl NetworkTarget {
    /// `host:port`, bracketing IPv6 literals
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

impl fmt::Display for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.authority())
    }
}

impl FromStr for NetworkTarget {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| LoggerError::config(COMPONENT, format!("'{}': {}", s, reason));

        let (scheme, rest) = s
            .trim()
            .split_once("://")
            .ok_or_else(|| invalid("expected <scheme>://<host>:<port>"))?;

        let transport = if scheme.eq_ignore_ascii_case("tcp") {
            Transport::Tcp
        } else if scheme.eq_ignore_ascii_case("udp") {
            Transport::Udp
        } else {
            return Err(invalid(&format!("unsupported scheme '{}'", scheme)));
        };

        let authority = rest.strip_suffix('/').unwrap_or(rest);
        if authority.contains('/') {
            return Err(invalid("paths are not supported"));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = after
                .strip_prefix(':')
                .ok_or_else(|| invalid("missing port"))?;
            (host, port)
        } else {
            let (host, port) = authority
                .rsplit_once(':')
                .ok_or_else(|| invalid("missing port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 hosts must be enclosed in brackets"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| invalid(&format!("invalid port '{}'", port)))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(NetworkTarget {
            transport,
            host: host.to_string(),
            port,
        })
    }
}

/// A live, writable link to the collector
pub type Connection = Box<dyn Write + Send>;

/// Opens connections for the network handler.
pub trait Connector: Send + Sync {
    fn connect(&self) -> io::Result<Connection>;

    /// Datagram connectors get one `write` call per record, so the handler
    /// does not buffer for them.
    fn is_datagram(&self) -> bool {
        false
    }

    /// Human-readable destination for diagnostics
    fn describe(&self) -> String;
}

/// Connector backed by real TCP or UDP sockets
#[derive(Debug, Clone)]
pub struct SocketConnector {
    target: NetworkTarget,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl SocketConnector {
    pub fn new(target: NetworkTarget, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
            write_timeout,
        }
    }

    pub fn target(&self) -> &NetworkTarget {
        &self.target
    }

    fn connect_tcp(&self) -> io::Result<Connection> {
        let mut last_err = None;
        for addr in self.target.socket_addrs()? {
            let attempt = if self.connect_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, self.connect_timeout)
            };

            match attempt {
                Ok(stream) => {
                    stream.set_write_timeout(non_zero(self.write_timeout))?;
                    // Enable TCP_NODELAY for low-latency logging
                    stream.set_nodelay(true)?;
                    return Ok(Box::new(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| self.unresolved()))
    }

    fn connect_udp(&self) -> io::Result<Connection> {
        let mut last_err = None;
        for addr in self.target.socket_addrs()? {
            let local: SocketAddr = if addr.is_ipv4() {
                SocketAddr::from(([0, 0, 0, 0], 0))
            } else {
                SocketAddr::from(([0u16; 8], 0))
            };

            let attempt = UdpSocket::bind(local).and_then(|socket| {
                socket.connect(addr)?;
                socket.set_write_timeout(non_zero(self.write_timeout))?;
                Ok(socket)
            });

            match attempt {
                Ok(socket) => return Ok(Box::new(DatagramConnection { socket })),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| self.unresolved()))
    }

    fn unresolved(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", self.target.authority()),
        )
    }
}

impl Connector for SocketConnector {
    fn connect(&self) -> io::Result<Connection> {
        match self.target.transport {
            Transport::Tcp => self.connect_tcp(),
            Transport::Udp => self.connect_udp(),
        }
    }

    fn is_datagram(&self) -> bool {
        self.target.transport.is_datagram()
    }

    fn describe(&self) -> String {
        self.target.to_string()
    }
}

/// Sends each `write` call as a single datagram
struct DatagramConnection {
    socket: UdpSocket,
}

impl Write for DatagramConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}
