//! Handler implementations

pub mod memory;
pub mod network;
pub mod transport;

pub use memory::MemoryHandler;
pub use network::{
    gelf_level, ConnectionState, NetworkHandler, NetworkHandlerBuilder,
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_INTERVAL,
    DEFAULT_WRITE_TIMEOUT, MAX_DATAGRAM_SIZE, RECORD_SEPARATOR,
};
pub use transport::{Connection, Connector, NetworkTarget, SocketConnector, Transport};

// Re-export the trait next to its implementations
pub use crate::core::Handler;
