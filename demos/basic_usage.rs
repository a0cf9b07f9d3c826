//! Basic logger usage example
//!
//! Demonstrates per-level handlers, structured fields and failure isolation.
//!
//! Run with: cargo run --example basic_usage

use rust_field_logger::prelude::*;
use rust_field_logger::{fields, info, warn};
use std::sync::Arc;

/// Prints each rendered entry on stdout
struct StdoutHandler;

impl Handler for StdoutHandler {
    fn name(&self) -> &str {
        "stdout"
    }

    fn before_writing(&self, entry: &mut Entry) -> Result<()> {
        let level = entry.level.to_str();
        entry.str("level", level);
        Ok(())
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        println!("   {}", String::from_utf8_lossy(payload));
        Ok(())
    }
}

/// Always fails, to show that other handlers keep working
struct BrokenHandler;

impl Handler for BrokenHandler {
    fn name(&self) -> &str {
        "broken"
    }

    fn write(&self, _payload: &[u8]) -> Result<()> {
        Err(LoggerError::other("backend unavailable"))
    }
}

fn main() -> Result<()> {
    println!("=== Rust Field Logger - Basic Usage Example ===\n");

    let errors = Arc::new(MemoryHandler::new());
    let logger = Logger::builder()
        .default_field("service", "checkout")
        .handler(Arc::new(StdoutHandler), &LogLevel::ALL)
        .handler(errors.clone(), &[LogLevel::Warn, LogLevel::Error])
        .build();

    println!("1. Logging at different levels:");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    println!("\n2. Structured fields:");
    let request = logger.with_field("request_id", "r-1042");
    request.with_field("items", 3).info("cart loaded");
    request
        .with_fields(&fields! { "amount" => 59.90, "currency" => "EUR" })
        .info("payment authorized");
    // The base entry never picks up fields added to derived entries
    request.info("request finished");

    println!("\n3. Formatted messages:");
    info!(request, "served in {}ms", 42);
    warn!(logger, "{} retries left", 1);

    println!("\n4. A failing handler does not stop the others:");
    logger.register(Arc::new(BrokenHandler), &[LogLevel::Info]);
    logger.info("still delivered to stdout");

    println!(
        "\nWarn/Error handler captured {} entries; {} handler failures",
        errors.len(),
        logger.metrics().handler_failures()
    );

    logger.close()?;
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
