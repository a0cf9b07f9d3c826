//! Trace timing example
//!
//! Demonstrates `trace`/`stop` and scoped tracing.
//!
//! Run with: cargo run --example trace_timing

use rust_field_logger::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Field Logger - Trace Timing Example ===\n");

    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::new();
    logger.register(memory.clone(), &LogLevel::ALL);

    let timer = logger.with_field("job", "reindex").trace("reindexing catalog");
    thread::sleep(Duration::from_millis(25));
    timer.stop();

    {
        let _scope = logger.trace_scope("warming cache");
        thread::sleep(Duration::from_millis(5));
    }

    for record in memory.json_records() {
        println!("{}", record);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
