//! Telemetry sources: the live serial link and the mission simulator.
//!
//! Both variants implement [`TelemetrySource`] and feed an
//! [`IngestionQueue`] from a background task, so the consumer side never
//! blocks. Per-frame failures stay inside the source; only lifecycle
//! failures (a connect that does not succeed) surface to the caller.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn};

use crate::decoder;
use crate::events::EventSink;
use crate::queue::IngestionQueue;
use crate::record::TelemetryRecord;
use crate::simulator::MissionSimulator;

/// Bound on a single transport read, so a stop request is observed within
/// one read cycle.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Source lifecycle failures. Per-frame decode failures are logged and
/// discarded inside the reader task and never reach this type.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {port}: {reason}")]
    ConnectFailed { port: String, reason: String },
    #[error("transport closed unexpectedly")]
    TransportClosed,
}

/// Connection state of a live source. The transport itself is exclusively
/// owned by the reader task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { port: String, baud: u32 },
    Failed { reason: String },
}

/// Common contract for telemetry producers.
pub trait TelemetrySource {
    /// Spawns the background producer. On failure the task is not started.
    fn start(&mut self) -> Result<(), SourceError>;
    /// Stops the producer and releases its transport. Idempotent.
    fn stop(&mut self);
    /// Non-blocking pop of the next produced record.
    fn poll(&mut self) -> Option<TelemetryRecord>;
}

/// Lists serial endpoints currently present on the host, sorted by name.
/// The returned identifiers are stable and can be passed straight back to
/// [`LiveSerialSource::new`].
pub fn list_available_ports() -> Vec<String> {
    let mut ports: Vec<String> = tokio_serial::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    ports.sort();
    ports
}

/// Live telemetry over a serial link.
///
/// A background task reads newline-delimited frames, decodes them, and
/// enqueues successful records. Malformed frames are logged and discarded
/// without stalling the pipeline.
pub struct LiveSerialSource {
    port: String,
    baud: u32,
    queue: IngestionQueue,
    state: ConnectionState,
    running: Arc<AtomicBool>,
    link_closed: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl LiveSerialSource {
    pub fn new(port: &str, baud: u32, queue: IngestionQueue) -> Self {
        Self {
            port: port.to_string(),
            baud,
            queue,
            state: ConnectionState::Disconnected,
            running: Arc::new(AtomicBool::new(false)),
            link_closed: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    /// True once the reader task has observed EOF or an I/O error and
    /// exited on its own.
    pub fn link_closed(&self) -> bool {
        self.link_closed.load(Ordering::SeqCst)
    }

    /// Spawns the reader task over an already-open transport. Split from
    /// `start` so an in-memory transport can stand in for the port.
    pub(crate) fn spawn_reader<R>(&mut self, transport: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.running.store(true, Ordering::SeqCst);
        self.link_closed.store(false, Ordering::SeqCst);

        let queue = self.queue.clone();
        let running = Arc::clone(&self.running);
        let link_closed = Arc::clone(&self.link_closed);
        self.reader = Some(tokio::spawn(read_loop(
            transport,
            queue,
            running,
            link_closed,
        )));
    }
}

impl TelemetrySource for LiveSerialSource {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.reader.is_some() {
            return Ok(());
        }

        let stream = match tokio_serial::new(&self.port, self.baud)
            .timeout(READ_TIMEOUT)
            .open_native_async()
        {
            Ok(stream) => stream,
            Err(e) => {
                let reason = e.to_string();
                self.state = ConnectionState::Failed {
                    reason: reason.clone(),
                };
                return Err(SourceError::ConnectFailed {
                    port: self.port.clone(),
                    reason,
                });
            }
        };

        info!(port = %self.port, baud = self.baud, "serial link connected");
        self.state = ConnectionState::Connected {
            port: self.port.clone(),
            baud: self.baud,
        };
        self.spawn_reader(stream);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            // The task owns the stream, so aborting it also closes the
            // port.
            reader.abort();
            info!(port = %self.port, "serial link closed");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn poll(&mut self) -> Option<TelemetryRecord> {
        self.queue.pop()
    }
}

impl Drop for LiveSerialSource {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn read_loop<R>(
    transport: R,
    queue: IngestionQueue,
    running: Arc<AtomicBool>,
    link_closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(transport).lines();
    while running.load(Ordering::SeqCst) {
        match tokio::time::timeout(READ_TIMEOUT, lines.next_line()).await {
            // Timeout: nothing arrived this cycle, re-check the stop flag.
            Err(_) => continue,
            Ok(Ok(Some(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decoder::decode_frame(&line) {
                    Ok(record) => queue.push(record),
                    Err(e) => warn!("discarding malformed frame: {e}"),
                }
            }
            Ok(Ok(None)) => {
                error!("serial link reached end of stream");
                link_closed.store(true, Ordering::SeqCst);
                break;
            }
            // Undecodable bytes are a bad frame, not a dead link. The
            // offending line is already consumed, so the next read starts
            // on a frame boundary.
            Ok(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                warn!("discarding frame with invalid bytes: {e}");
            }
            Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => continue,
            Ok(Err(e)) => {
                error!("serial read error: {e}");
                link_closed.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}

/// Simulated telemetry: a background task steps a [`MissionSimulator`] at a
/// fixed interval and enqueues each record.
///
/// The simulator is constructed inside the task and never shared, so its
/// state is mutated by exactly one owner.
pub struct SimulatedSource {
    interval: Duration,
    queue: IngestionQueue,
    events: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
    stepper: Option<JoinHandle<()>>,
}

impl SimulatedSource {
    pub fn new(interval: Duration, queue: IngestionQueue, events: Arc<dyn EventSink>) -> Self {
        Self {
            interval,
            queue,
            events,
            running: Arc::new(AtomicBool::new(false)),
            stepper: None,
        }
    }
}

impl TelemetrySource for SimulatedSource {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.stepper.is_some() {
            return Ok(());
        }

        info!(interval_ms = self.interval.as_millis() as u64, "starting simulated telemetry");
        self.running.store(true, Ordering::SeqCst);

        let queue = self.queue.clone();
        let events = Arc::clone(&self.events);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        self.stepper = Some(tokio::spawn(async move {
            let mut simulator = MissionSimulator::new(events);
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let now_ms = started.elapsed().as_millis() as u64;
                queue.push(simulator.step(now_ms));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stepper) = self.stepper.take() {
            stepper.abort();
        }
    }

    fn poll(&mut self) -> Option<TelemetryRecord> {
        self.queue.pop()
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEventSink;
    use tokio::io::AsyncWriteExt;

    const WIRE_FRAME: &[u8] =
        b"3.3,13.0,80.2,850.0,22.0,925.0,14.0,0.4,0.0,0.0,0.0,99.0,10:00:00\n";

    async fn wait_for_link_closed(source: &LiveSerialSource) {
        for _ in 0..100 {
            if source.link_closed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_reader_skips_undecodable_bytes_and_keeps_reading() {
        let queue = IngestionQueue::new(0);
        let mut source = LiveSerialSource::new("mem", 9600, queue.clone());
        let (transport, mut peer) = tokio::io::duplex(256);
        source.spawn_reader(transport);

        // A good frame, a line of raw garbage, then another good frame.
        peer.write_all(WIRE_FRAME).await.unwrap();
        peer.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
        peer.write_all(WIRE_FRAME).await.unwrap();
        drop(peer);

        wait_for_link_closed(&source).await;
        assert!(source.link_closed(), "EOF was not observed");
        // Both well-formed frames made it past the garbage line.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().altitude, 850.0);
        source.stop();
    }

    #[tokio::test]
    async fn test_reader_flags_closure_only_at_end_of_stream() {
        let queue = IngestionQueue::new(0);
        let mut source = LiveSerialSource::new("mem", 9600, queue.clone());
        let (transport, mut peer) = tokio::io::duplex(256);
        source.spawn_reader(transport);

        peer.write_all(WIRE_FRAME).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Link open and idle: delivered, not closed.
        assert!(!source.link_closed());
        assert_eq!(queue.len(), 1);

        drop(peer);
        wait_for_link_closed(&source).await;
        assert!(source.link_closed());
        source.stop();
    }

    #[tokio::test]
    async fn test_connect_failure_is_typed_and_task_free() {
        let queue = IngestionQueue::new(0);
        let mut source = LiveSerialSource::new("/dev/nonexistent-cansat-port", 9600, queue);

        let err = source.start().unwrap_err();
        assert!(matches!(err, SourceError::ConnectFailed { .. }));
        assert!(matches!(
            source.connection_state(),
            ConnectionState::Failed { .. }
        ));
        assert!(source.poll().is_none());

        // stop() on a never-started source is a no-op.
        source.stop();
        source.stop();
        assert_eq!(*source.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_simulated_source_produces_records() {
        let queue = IngestionQueue::new(0);
        let mut source = SimulatedSource::new(
            Duration::from_millis(10),
            queue.clone(),
            Arc::new(LogEventSink),
        );
        source.start().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        source.stop();

        let record = queue.pop().expect("simulated source produced nothing");
        assert!(record.altitude <= 1000.0);
        assert!(record.battery <= 100.0);
    }

    #[tokio::test]
    async fn test_simulated_source_stop_is_idempotent() {
        let queue = IngestionQueue::new(4);
        let mut source = SimulatedSource::new(
            Duration::from_millis(10),
            queue.clone(),
            Arc::new(LogEventSink),
        );
        source.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        source.stop();
        source.stop();

        // No records are produced after stop.
        while queue.pop().is_some() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.is_empty());
    }

    #[test]
    fn test_list_available_ports_is_sorted() {
        let ports = list_available_ports();
        let mut sorted = ports.clone();
        sorted.sort();
        assert_eq!(ports, sorted);
    }
}
