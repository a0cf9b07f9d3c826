//! Network logging example
//!
//! Ships GELF records to a local TCP collector, then shows how the handler
//! drops records while the collector is away and reconnects on its own.
//!
//! Run with: cargo run --example network_logging

use rust_field_logger::handlers::{ConnectionState, NetworkHandler};
use rust_field_logger::prelude::*;
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Field Logger - Network Logging Example ===\n");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let collector = thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let (mut stream, _) = listener.accept()?;
        let mut received = Vec::new();
        stream.read_to_end(&mut received)?;
        Ok(received)
    });

    let handler = Arc::new(
        NetworkHandler::builder(format!("tcp://{}", addr))
            .reconnect_interval(Duration::from_millis(200))
            .build()?,
    );
    println!("1. Handler state after construction: {:?}", handler.state());

    let logger = Logger::builder()
        .default_field("host", "demo-box")
        .handler(handler.clone(), &[LogLevel::Info, LogLevel::Warn, LogLevel::Error])
        .build();

    logger.with_field("order_id", 1042).info("order shipped");
    logger.warn("inventory low");
    logger.debug("not routed to the network handler");

    logger.close()?;
    println!("2. Handler state after close: {:?}", handler.state());

    let received = collector
        .join()
        .map_err(|_| LoggerError::other("collector thread panicked"))??;
    println!("3. Collector received:");
    for record in received.split(|b| *b == 0).filter(|r| !r.is_empty()) {
        println!("   {}", String::from_utf8_lossy(record));
    }

    println!("\n4. Unreachable collector:");
    let offline = NetworkHandler::builder("tcp://127.0.0.1:9")
        .connect_timeout(Duration::from_millis(200))
        .build()?;
    offline.write(b"{}")?;
    println!(
        "   state={:?} dropped={}",
        offline.state(),
        offline.dropped_count()
    );
    assert_ne!(offline.state(), ConnectionState::Closed);

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
