//! Integration tests for the field logger
//!
//! These tests verify:
//! - Per-level routing
//! - Handler failure and panic isolation
//! - Copy-on-write entry semantics
//! - Dispatch-time timestamps
//! - Trace timing
//! - Network handler over loopback TCP/UDP and a capturing connector

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_field_logger::core::{Entry, Handler, LogLevel, Logger, LoggerError, Result};
use rust_field_logger::handlers::{
    ConnectionState, Connection, Connector, MemoryHandler, NetworkHandler,
    NetworkHandlerBuilder, MAX_DATAGRAM_SIZE, RECORD_SEPARATOR,
};
use rust_field_logger::{fields, DURATION_FIELD, ERROR_FIELD};
use std::io::{self, Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct FailingHandler {
    calls: AtomicUsize,
}

impl Handler for FailingHandler {
    fn name(&self) -> &str {
        "failing"
    }

    fn write(&self, _payload: &[u8]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LoggerError::other("disk full"))
    }
}

struct PanickingHandler;

impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        "panicking"
    }

    fn write(&self, _payload: &[u8]) -> Result<()> {
        panic!("handler bug");
    }
}

/// Records the timestamp each entry carries when it reaches a handler
#[derive(Default)]
struct TimestampRecorder {
    seen: Mutex<Vec<DateTime<Utc>>>,
}

impl Handler for TimestampRecorder {
    fn name(&self) -> &str {
        "timestamp-recorder"
    }

    fn before_writing(&self, entry: &mut Entry) -> Result<()> {
        self.seen.lock().push(entry.timestamp);
        Ok(())
    }

    fn write(&self, _payload: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CaptureConnector {
    bytes: Arc<Mutex<Vec<u8>>>,
    online: Arc<AtomicBool>,
}

struct CaptureConnection {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connector for CaptureConnector {
    fn connect(&self) -> io::Result<Connection> {
        if self.online.load(Ordering::SeqCst) {
            Ok(Box::new(CaptureConnection {
                bytes: Arc::clone(&self.bytes),
            }))
        } else {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
        }
    }

    fn describe(&self) -> String {
        "capture".to_string()
    }
}

fn quiet_logger() -> Logger {
    Logger::builder()
        .on_handler_error(Arc::new(|_, _| {}))
        .build()
}

fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn split_records(bytes: &[u8]) -> Vec<serde_json::Value> {
    bytes
        .split(|b| *b == RECORD_SEPARATOR)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| serde_json::from_slice(chunk).expect("record is valid JSON"))
        .collect()
}

#[test]
fn test_handler_only_receives_its_levels() {
    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::new();
    logger.register(memory.clone(), &[LogLevel::Error]);

    logger.info("ignored");
    logger.debug("ignored");
    logger.with_field("code", 500).error("boom");

    let records = memory.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "boom");
    assert_eq!(records[0]["code"], 500);
    assert_eq!(records[0]["level"], "ERROR");
}

#[test]
fn test_log_without_handlers_is_noop() {
    let logger = Logger::new();
    logger.info("nobody listens");
    logger.with_field("k", "v").warn("still nobody");

    assert_eq!(logger.metrics().dispatched_count(), 2);
    assert_eq!(logger.metrics().handler_invocations(), 0);
}

#[test]
fn test_failing_handler_does_not_block_others() {
    let failing = Arc::new(FailingHandler {
        calls: AtomicUsize::new(0),
    });
    let memory = Arc::new(MemoryHandler::new());
    let reported = Arc::new(Mutex::new(Vec::new()));

    let logger = Logger::builder()
        .handler(failing.clone(), &[LogLevel::Info])
        .handler(Arc::new(PanickingHandler), &[LogLevel::Info])
        .handler(memory.clone(), &[LogLevel::Info])
        .on_handler_error({
            let reported = Arc::clone(&reported);
            Arc::new(move |name, _err| reported.lock().push(name.to_string()))
        })
        .build();

    logger.info("survives");

    assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    assert_eq!(memory.len(), 1);
    assert_eq!(*reported.lock(), vec!["failing", "panicking"]);

    let metrics = logger.metrics();
    assert_eq!(metrics.handler_invocations(), 3);
    assert_eq!(metrics.handler_failures(), 2);
    assert_eq!(metrics.handler_panics(), 1);
}

#[test]
fn test_entries_are_copy_on_write() {
    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::new();
    logger.register(memory.clone(), &LogLevel::ALL);

    let base = logger.with_field("request_id", "r-1");
    let child = base.with_field("step", "parse");
    let merged = base.with_fields(&fields! { "request_id" => "r-2", "retry" => true });

    base.info("base");
    child.info("child");
    merged.info("merged");

    assert_eq!(base.fields.len(), 1);
    let records = memory.json_records();
    assert!(records[0].get("step").is_none());
    assert_eq!(records[1]["step"], "parse");
    assert_eq!(records[1]["request_id"], "r-1");
    assert_eq!(records[2]["request_id"], "r-2");
    assert_eq!(records[2]["retry"], true);
}

#[test]
fn test_default_fields_apply_to_every_entry() {
    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::builder()
        .default_field("service", "billing")
        .handler(memory.clone(), &LogLevel::ALL)
        .build();

    logger.info("one");
    logger.with_field("service", "override").info("two");

    let records = memory.json_records();
    assert_eq!(records[0]["service"], "billing");
    assert_eq!(records[1]["service"], "override");
}

#[test]
fn test_with_error_records_chain() {
    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::new();
    logger.register(memory.clone(), &LogLevel::ALL);

    let err = LoggerError::network_write(
        "tcp://collector:12201",
        io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
    );
    logger.with_error(Some(err)).error("ship failed");
    logger.with_error(None::<io::Error>).info("fine");

    let records = memory.json_records();
    let detail = records[0][ERROR_FIELD].as_str().unwrap();
    assert_eq!(detail, "Network write to 'tcp://collector:12201' failed: pipe closed");
    assert!(records[1].get(ERROR_FIELD).is_none());
}

#[test]
fn test_timestamp_is_set_at_dispatch() {
    let recorder = Arc::new(TimestampRecorder::default());
    let logger = Logger::new();
    logger.register(recorder.clone(), &LogLevel::ALL);

    let entry = logger.with_field("k", 1);
    let created = entry.timestamp;
    thread::sleep(Duration::from_millis(20));

    let before = Utc::now();
    entry.info("late");

    let seen = recorder.seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0] >= before);
    assert!(seen[0] > created);
}

#[test]
fn test_trace_and_stop_log_duration() {
    let memory = Arc::new(MemoryHandler::new());
    let logger = Logger::new();
    logger.register(memory.clone(), &LogLevel::ALL);

    let traced = logger.with_field("job", "reindex").trace("reindexing");
    thread::sleep(Duration::from_millis(15));
    traced.stop();

    {
        let _guard = logger.trace_scope("scoped");
    }

    logger.entry().stop();

    let records = memory.json_records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["message"], "reindexing");
    assert_eq!(records[0]["level"], "INFO");
    assert_eq!(records[0]["job"], "reindex");
    let duration = records[0][DURATION_FIELD].as_str().unwrap();
    assert!(duration.ends_with("ms"), "unexpected duration {}", duration);

    assert_eq!(records[1]["message"], "scoped");
    assert!(records[1][DURATION_FIELD].is_string());
    assert_eq!(records[2][DURATION_FIELD], "0s");
}

#[test]
fn test_fatal_closes_handlers_then_terminates() {
    let capture = CaptureConnector::default();
    capture.online.store(true, Ordering::SeqCst);
    let network = Arc::new(
        NetworkHandlerBuilder::from_connector(capture.clone())
            .reconnect_interval(Duration::from_secs(60))
            .build()
            .unwrap(),
    );
    let exit_codes = Arc::new(Mutex::new(Vec::new()));

    let logger = Logger::builder()
        .handler(network.clone(), &LogLevel::ALL)
        .on_terminate({
            let exit_codes = Arc::clone(&exit_codes);
            Arc::new(move |code| exit_codes.lock().push(code))
        })
        .build();

    logger.fatal("cannot continue");

    assert_eq!(*exit_codes.lock(), vec![rust_field_logger::TERMINATE_EXIT_CODE]);
    assert_eq!(network.state(), ConnectionState::Closed);
    let records = split_records(&capture.bytes.lock());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["short_message"], "cannot continue");
    assert_eq!(records[0]["level"], 2);
}

#[test]
fn test_network_handler_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handler = Arc::new(
        NetworkHandler::builder(format!("tcp://127.0.0.1:{}", port))
            .reconnect_interval(Duration::from_millis(50))
            .build()
            .unwrap(),
    );
    let (mut stream, _) = listener.accept().unwrap();
    assert_eq!(handler.state(), ConnectionState::Connected);
    assert_eq!(handler.target().unwrap().port, port);

    let logger = quiet_logger();
    logger.register(handler.clone(), &LogLevel::ALL);
    logger.with_field("user", "alice").warn("first");
    logger.error("second");
    logger.close().unwrap();

    let mut received = Vec::new();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.read_to_end(&mut received).unwrap();

    let records = split_records(&received);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["version"], "1.1");
    assert_eq!(records[0]["level"], 4);
    assert_eq!(records[0]["short_message"], "first");
    assert_eq!(records[0]["_user"], "alice");
    assert_eq!(records[1]["level"], 3);
}

#[test]
fn test_network_handler_over_udp() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = receiver.local_addr().unwrap().port();

    let handler = Arc::new(NetworkHandler::new(format!("udp://127.0.0.1:{}", port)).unwrap());
    let logger = quiet_logger();
    logger.register(handler.clone(), &LogLevel::ALL);

    logger.info("datagram");

    let mut buf = [0u8; 2048];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(buf[len - 1], RECORD_SEPARATOR);

    let record: serde_json::Value = serde_json::from_slice(&buf[..len - 1]).unwrap();
    assert_eq!(record["short_message"], "datagram");
    assert_eq!(record["level"], 6);
    logger.close().unwrap();
}

#[test]
fn test_oversized_udp_record_fails_alone() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = receiver.local_addr().unwrap().port();

    let handler = NetworkHandler::builder(format!("udp://127.0.0.1:{}", port))
        .reconnect_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    assert_eq!(handler.state(), ConnectionState::Connected);

    let result = handler.write(&vec![b'a'; 70_000]);
    assert!(matches!(result, Err(LoggerError::NetworkWrite { .. })));
    assert_eq!(handler.state(), ConnectionState::Connected);

    // Largest record that still fits is delivered
    let largest = vec![b'b'; MAX_DATAGRAM_SIZE - 1];
    handler.write(&largest).unwrap();
    handler.write(b"small").unwrap();
    assert_eq!(handler.dropped_count(), 0);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 16];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(len, MAX_DATAGRAM_SIZE);
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"small\0");

    handler.close().unwrap();
}

#[test]
fn test_network_handler_unreachable_collector() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let handler = Arc::new(
        NetworkHandler::builder(format!("tcp://127.0.0.1:{}", port))
            .connect_timeout(Duration::from_millis(200))
            .reconnect_interval(Duration::from_secs(60))
            .build()
            .unwrap(),
    );
    assert_eq!(handler.state(), ConnectionState::Disconnected);

    let failures = Arc::new(AtomicUsize::new(0));
    let logger = Logger::builder()
        .handler(handler.clone(), &LogLevel::ALL)
        .on_handler_error({
            let failures = Arc::clone(&failures);
            Arc::new(move |_, _| {
                failures.fetch_add(1, Ordering::SeqCst);
            })
        })
        .build();

    logger.info("dropped");
    logger.error("dropped too");

    assert_eq!(handler.dropped_count(), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn test_network_handler_recovers_after_outage() {
    let capture = CaptureConnector::default();
    let handler = Arc::new(
        NetworkHandlerBuilder::from_connector(capture.clone())
            .reconnect_interval(Duration::from_millis(20))
            .build()
            .unwrap(),
    );
    let logger = quiet_logger();
    logger.register(handler.clone(), &LogLevel::ALL);

    logger.info("lost");
    capture.online.store(true, Ordering::SeqCst);
    assert!(wait_for(Duration::from_secs(5), || {
        handler.state() == ConnectionState::Connected
    }));

    logger.info("delivered");
    logger.flush().unwrap();

    let records = split_records(&capture.bytes.lock());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["short_message"], "delivered");
    assert_eq!(handler.dropped_count(), 1);
    assert_eq!(handler.connect_count(), 1);
}

#[test]
fn test_malformed_connection_string_fails_construction() {
    for input in ["localhost:12201", "ftp://host:21", "tcp://host", "udp://[::1"] {
        let result = NetworkHandler::new(input);
        assert!(
            matches!(result, Err(LoggerError::InvalidConfiguration { .. })),
            "accepted {:?}",
            input
        );
    }
}
