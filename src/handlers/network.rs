//! Network handler for remote logging
//!
//! Ships entries as GELF 1.1 JSON records, each followed by a NUL byte,
//! over a persistent TCP or UDP connection. Useful for centralized logging
//! with Graylog-compatible collectors.
//!
//! Connection lifecycle:
//!
//! ```text
//!   new() ──connect ok──▶ Connected ◀──reconnect ok── Connecting ◀── Disconnected
//!     │                      │                            │              ▲
//!     └──connect failed──────┼────────────────────────────┴──failed──────┤
//!                            └──write/flush failed───────────────────────┘
//!   close() from any state ──▶ Closed
//! ```
//!
//! A supervisor thread wakes once per reconnect interval. While
//! disconnected it tries to reconnect; while connected it flushes buffered
//! records. Writes issued while disconnected are dropped and reported as
//! success, so a missing collector never stalls or fails application
//! logging. A datagram too large to send fails on its own and leaves the
//! connection up.

use super::transport::{Connection, Connector, NetworkTarget, SocketConnector};
use crate::core::{Entry, Handler, LogLevel, LoggerError, Result};
use chrono::SecondsFormat;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Time between supervisor passes (reconnect attempts and flushes)
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for establishing a TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a single socket write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of the write buffer for stream transports
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Byte appended to every record on the wire
pub const RECORD_SEPARATOR: u8 = 0;

/// Largest frame (record plus separator) sent over a datagram transport
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[cfg(any(target_os = "linux", target_os = "android"))]
const EMSGSIZE: i32 = 90;
#[cfg(windows)]
const EMSGSIZE: i32 = 10040;
#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
const EMSGSIZE: i32 = 40;

const GELF_VERSION: &str = "1.1";

/// Connect failures are reported on the first attempt of an outage and
/// then once per this many attempts.
const FAILURE_REPORT_EVERY: u64 = 60;

/// Map a level to its GELF (syslog) severity code
pub fn gelf_level(level: LogLevel) -> u8 {
    match level {
        LogLevel::Debug => 7,
        LogLevel::Info => 6,
        LogLevel::Warn => 4,
        LogLevel::Error => 3,
        LogLevel::Fatal => 2,
        LogLevel::Panic => 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal; reached through `close`
    Closed,
}

struct Link {
    state: ConnectionState,
    writer: Option<BufWriter<Connection>>,
}

impl Link {
    /// Forget the current connection without writing what is still
    /// buffered. The socket closes when the connection drops.
    fn discard(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.into_parts();
        }
    }
}

struct Shared {
    link: Mutex<Link>,
    connector: Box<dyn Connector>,
    destination: String,
    buffer_capacity: usize,
    datagram: bool,
    dropped: AtomicU64,
    connects: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl Shared {
    /// One connection attempt, starting from `Disconnected`.
    ///
    /// The link lock is not held while connecting, so writers are never
    /// stuck behind a slow connect; they see `Connecting` and drop.
    fn try_connect(&self) {
        {
            let mut link = self.link.lock();
            if link.state != ConnectionState::Disconnected {
                return;
            }
            link.state = ConnectionState::Connecting;
        }

        let attempt = self.connector.connect();

        let mut link = self.link.lock();
        if link.state != ConnectionState::Connecting {
            // Closed while connecting; a fresh connection is simply dropped
            return;
        }

        match attempt {
            Ok(conn) => {
                link.writer = Some(BufWriter::with_capacity(self.buffer_capacity, conn));
                link.state = ConnectionState::Connected;
                drop(link);

                self.connects.fetch_add(1, Ordering::Relaxed);
                let failures = self.consecutive_failures.swap(0, Ordering::Relaxed);
                if failures > 0 {
                    eprintln!(
                        "[LOGGER INFO] Network handler connected to {} after {} failed attempts",
                        self.destination, failures
                    );
                }
            }
            Err(err) => {
                link.state = ConnectionState::Disconnected;
                drop(link);

                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                if failures % FAILURE_REPORT_EVERY == 0 {
                    eprintln!(
                        "[LOGGER WARNING] Network handler cannot connect to {}: {} \
                         ({} consecutive failures, records are dropped until reconnected)",
                        self.destination,
                        err,
                        failures + 1
                    );
                }
            }
        }
    }

    /// Push buffered bytes to the socket. A failure disconnects.
    fn flush_link(&self, link: &mut Link) -> io::Result<()> {
        if link.state != ConnectionState::Connected {
            return Ok(());
        }
        let Some(writer) = link.writer.as_mut() else {
            return Ok(());
        };

        if let Err(err) = writer.flush() {
            link.discard();
            link.state = ConnectionState::Disconnected;
            eprintln!(
                "[LOGGER WARNING] Network handler lost connection to {} while flushing: {}",
                self.destination, err
            );
            return Err(err);
        }
        Ok(())
    }

    /// One supervisor pass. Returns false once the handler is closed.
    fn tick(&self) -> bool {
        let state = self.link.lock().state;
        match state {
            ConnectionState::Closed => false,
            ConnectionState::Disconnected => {
                self.try_connect();
                true
            }
            ConnectionState::Connecting => true,
            ConnectionState::Connected => {
                let mut link = self.link.lock();
                let _ = self.flush_link(&mut link);
                true
            }
        }
    }
}

/// Whether a failed send concerns only the record itself, leaving the
/// socket usable
fn rejects_record_only(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidInput || err.raw_os_error() == Some(EMSGSIZE)
}

fn supervise(shared: Arc<Shared>, shutdown: Receiver<()>, interval: Duration) {
    loop {
        // Waiting on the channel doubles as the retry delay and wakes
        // immediately when the handler closes.
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if !shared.tick() {
            break;
        }
    }
}

enum Destination {
    Address(String),
    Custom(Box<dyn Connector>),
}

/// Builder for [`NetworkHandler`]
///
/// # Example
///
/// ```no_run
/// use rust_field_logger::handlers::NetworkHandler;
/// use std::time::Duration;
///
/// let handler = NetworkHandler::builder("tcp://graylog.internal:12201")
///     .reconnect_interval(Duration::from_millis(500))
///     .buffer_capacity(16 * 1024)
///     .build()
///     .expect("invalid collector address");
/// ```
pub struct NetworkHandlerBuilder {
    destination: Destination,
    reconnect_interval: Duration,
    connect_timeout: Duration,
    write_timeout: Duration,
    buffer_capacity: usize,
}

impl NetworkHandlerBuilder {
    /// Start from a connection string such as `tcp://host:12201`
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self::with_destination(Destination::Address(connection_string.into()))
    }

    /// Start from a custom connector instead of a connection string
    pub fn from_connector<C: Connector + 'static>(connector: C) -> Self {
        Self::with_destination(Destination::Custom(Box::new(connector)))
    }

    fn with_destination(destination: Destination) -> Self {
        Self {
            destination,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Ignored by custom connectors
    #[must_use = "builder methods return a new value"]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Ignored by custom connectors
    #[must_use = "builder methods return a new value"]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Write buffer size for stream transports; 0 writes every record
    /// straight to the socket. Datagram transports never buffer.
    #[must_use = "builder methods return a new value"]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Validate the configuration, make the first connection attempt and
    /// start the supervisor thread.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a malformed connection string or
    /// a zero reconnect interval. An unreachable collector is not an error.
    pub fn build(self) -> Result<NetworkHandler> {
        if self.reconnect_interval.is_zero() {
            return Err(LoggerError::config(
                "NetworkHandler",
                "reconnect interval must be non-zero",
            ));
        }

        let (connector, target): (Box<dyn Connector>, Option<NetworkTarget>) =
            match self.destination {
                Destination::Address(address) => {
                    let target: NetworkTarget = address.parse()?;
                    let connector = SocketConnector::new(
                        target.clone(),
                        self.connect_timeout,
                        self.write_timeout,
                    );
                    (Box::new(connector), Some(target))
                }
                Destination::Custom(connector) => (connector, None),
            };

        let datagram = connector.is_datagram();
        let buffer_capacity = if datagram {
            0
        } else {
            self.buffer_capacity
        };

        let shared = Arc::new(Shared {
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                writer: None,
            }),
            destination: connector.describe(),
            connector,
            buffer_capacity,
            datagram,
            dropped: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
        });

        shared.try_connect();

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let interval = self.reconnect_interval;
        let supervisor = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("network-handler".to_string())
                .spawn(move || supervise(shared, shutdown_rx, interval))?
        };

        Ok(NetworkHandler {
            shared,
            target,
            shutdown: Mutex::new(Some(shutdown_tx)),
            supervisor: Mutex::new(Some(supervisor)),
        })
    }
}

/// Network handler that sends GELF records to a remote collector
///
/// # Example
///
/// ```no_run
/// use rust_field_logger::handlers::NetworkHandler;
/// use rust_field_logger::prelude::*;
/// use std::sync::Arc;
///
/// let handler = NetworkHandler::new("udp://127.0.0.1:12201")
///     .expect("invalid collector address");
///
/// let logger = Logger::new();
/// logger.register(Arc::new(handler), &LogLevel::ALL);
/// logger.with_field("order_id", 42).info("order shipped");
/// ```
pub struct NetworkHandler {
    shared: Arc<Shared>,
    target: Option<NetworkTarget>,
    shutdown: Mutex<Option<Sender<()>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkHandler {
    /// Create a handler with default settings
    ///
    /// # Errors
    ///
    /// Returns error if the connection string is malformed
    pub fn new(connection_string: impl Into<String>) -> Result<Self> {
        NetworkHandlerBuilder::new(connection_string).build()
    }

    pub fn builder(connection_string: impl Into<String>) -> NetworkHandlerBuilder {
        NetworkHandlerBuilder::new(connection_string)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    /// Parsed target, unless built from a custom connector
    pub fn target(&self) -> Option<&NetworkTarget> {
        self.target.as_ref()
    }

    /// Records dropped because no connection was available
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Connections established so far, the initial one included
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::Relaxed)
    }

    fn stop_supervisor(&self) {
        // Dropping the sender wakes the supervisor immediately
        drop(self.shutdown.lock().take());

        if let Some(handle) = self.supervisor.lock().take() {
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Network handler supervisor thread panicked");
            }
        }
    }
}

impl Handler for NetworkHandler {
    fn name(&self) -> &str {
        "network"
    }

    fn before_writing(&self, entry: &mut Entry) -> Result<()> {
        let level = gelf_level(entry.level);
        let short_message = std::mem::take(&mut entry.message);
        let timestamp = entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);

        entry
            .str("version", GELF_VERSION)
            .uint8("level", level)
            .str("short_message", short_message)
            .str("timestamp", timestamp);
        Ok(())
    }

    /// GELF object: annotations as-is, user fields prefixed with `_`
    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut object = entry.annotations().clone();
        for (key, value) in entry.fields.iter() {
            object.insert(format!("_{}", key), value.to_json_value());
        }
        Ok(serde_json::to_vec(&Value::Object(object))?)
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        let mut link = self.shared.link.lock();

        match link.state {
            ConnectionState::Closed => Err(LoggerError::handler_closed(self.name())),
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            ConnectionState::Connected => {
                // Payload and separator go out in one write so a datagram
                // carries a whole record and stream framing stays intact.
                let mut frame = Vec::with_capacity(payload.len() + 1);
                frame.extend_from_slice(payload);
                frame.push(RECORD_SEPARATOR);

                if self.shared.datagram && frame.len() > MAX_DATAGRAM_SIZE {
                    let err = io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "record of {} bytes exceeds the {} byte datagram limit",
                            frame.len(),
                            MAX_DATAGRAM_SIZE
                        ),
                    );
                    return Err(LoggerError::network_write(self.shared.destination.clone(), err));
                }

                let result = match link.writer.as_mut() {
                    Some(writer) => writer.write_all(&frame),
                    None => Err(io::Error::new(io::ErrorKind::NotConnected, "no connection")),
                };

                result.map_err(|err| {
                    // An oversized datagram fails alone; the socket stays up
                    if !(self.shared.datagram && rejects_record_only(&err)) {
                        link.discard();
                        link.state = ConnectionState::Disconnected;
                    }
                    LoggerError::network_write(self.shared.destination.clone(), err)
                })
            }
        }
    }

    fn flush(&self) -> Result<()> {
        let mut link = self.shared.link.lock();
        self.shared
            .flush_link(&mut link)
            .map_err(|err| LoggerError::network_write(self.shared.destination.clone(), err))
    }

    /// Flush pending bytes, close the socket and stop the supervisor.
    /// Later writes fail with `HandlerClosed`.
    fn close(&self) -> Result<()> {
        let flushed = {
            let mut link = self.shared.link.lock();
            if link.state == ConnectionState::Closed {
                Ok(())
            } else {
                let flushed = match link.writer.take() {
                    Some(mut writer) => {
                        let result = writer.flush();
                        let _ = writer.into_parts();
                        result
                    }
                    None => Ok(()),
                };
                link.state = ConnectionState::Closed;
                flushed
            }
        };

        self.stop_supervisor();
        flushed.map_err(|err| LoggerError::network_write(self.shared.destination.clone(), err))
    }
}

impl Drop for NetworkHandler {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed
        let _ = self.close();
    }
}
