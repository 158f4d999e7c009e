//! Source selection, fallback, and the pull API handed to the
//! presentation layer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::GcsConfig;
use crate::events::{EventSeverity, EventSink};
use crate::queue::IngestionQueue;
use crate::record::TelemetryRecord;
use crate::source::{self, LiveSerialSource, SimulatedSource, TelemetrySource};

/// Which source currently feeds `get_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Simulated,
}

/// Orchestrates the telemetry sources and owns their ingestion queues.
///
/// Startup tries the selected serial endpoint first and falls back to
/// simulated telemetry when the link cannot be opened or stays silent.
/// At runtime the fallback is one-directional: a live record observed in
/// simulated mode promotes the service to live, and live mode never
/// fabricates simulated data when the link merely has nothing to say.
/// The only live-to-simulated transition is an observed transport closure.
pub struct TelemetryService {
    config: GcsConfig,
    events: Arc<dyn EventSink>,
    live_queue: IngestionQueue,
    sim_queue: IngestionQueue,
    live: Option<LiveSerialSource>,
    simulated: Option<SimulatedSource>,
    mode: SourceMode,
}

impl TelemetryService {
    pub fn new(config: GcsConfig, events: Arc<dyn EventSink>) -> Self {
        let live_queue = IngestionQueue::new(config.queue_capacity);
        let sim_queue = IngestionQueue::new(config.queue_capacity);
        Self {
            config,
            events,
            live_queue,
            sim_queue,
            live: None,
            simulated: None,
            mode: SourceMode::Simulated,
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Serial endpoints available for selection, in a stable order. The
    /// presentation layer offers these alongside a synthetic "Simulated"
    /// option.
    pub fn list_available_ports(&self) -> Vec<String> {
        source::list_available_ports()
    }

    /// Producer-side handle to the live ingestion queue, for transports
    /// that deliver already-decoded records (test rigs, replay tools).
    pub fn live_queue_handle(&self) -> IngestionQueue {
        self.live_queue.clone()
    }

    /// Records evicted from either queue by overflow.
    pub fn dropped_records(&self) -> u64 {
        self.live_queue.dropped() + self.sim_queue.dropped()
    }

    /// Startup protocol.
    ///
    /// `selection` overrides the configured default endpoint. With no
    /// endpoint at all, a `use_dummy` override, or a failed connect, the
    /// service enters simulated mode immediately. After a successful
    /// connect it waits up to `fallback_retries` intervals of
    /// `fallback_interval_ms` for a first record before falling back; the
    /// silent link stays open so live data can still take over later.
    pub async fn start(&mut self, selection: Option<&str>) {
        if self.config.use_dummy {
            info!("dummy mode forced by configuration");
            self.enter_simulated("Simulated telemetry enabled.");
            return;
        }

        let port = selection
            .map(str::to_string)
            .or_else(|| self.config.port.clone());
        let Some(port) = port else {
            self.enter_simulated("No endpoint selected. Switching to simulated telemetry.");
            return;
        };

        let mut live = LiveSerialSource::new(&port, self.config.baud_rate, self.live_queue.clone());
        match live.start() {
            Ok(()) => {
                self.live = Some(live);
                if self.wait_for_live_data().await {
                    self.mode = SourceMode::Live;
                    info!(%port, "live telemetry established");
                } else {
                    warn!(%port, "link is up but silent, falling back to simulated telemetry");
                    self.enter_simulated("No serial data. Switching to simulated telemetry.");
                }
            }
            Err(e) => {
                warn!("serial connect failed: {e}");
                self.enter_simulated("Serial connection failed. Switching to simulated telemetry.");
            }
        }
    }

    /// Stops all sources and releases their transports. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.stop();
        }
        self.stop_simulated();
    }

    /// Non-blocking pop of the freshest available record, or `None` when
    /// nothing arrived since the last tick. Never blocks the caller's
    /// timer tick and never surfaces per-frame errors.
    pub fn get_data(&mut self) -> Option<TelemetryRecord> {
        match self.mode {
            SourceMode::Live => {
                if let Some(record) = self.live_queue.pop() {
                    return Some(record);
                }
                if self.live.as_ref().is_some_and(LiveSerialSource::link_closed) {
                    warn!("live transport closed, falling back to simulated telemetry");
                    if let Some(mut live) = self.live.take() {
                        live.stop();
                    }
                    self.enter_simulated("Serial link lost. Switching to simulated telemetry.");
                    return self.sim_queue.pop();
                }
                // Live mode with a quiet link: report nothing rather than
                // fabricate a record.
                None
            }
            SourceMode::Simulated => {
                if let Some(record) = self.live_queue.pop() {
                    info!("live record received, leaving simulated mode");
                    self.stop_simulated();
                    self.mode = SourceMode::Live;
                    self.events.on_event(
                        "Live telemetry detected. Leaving simulated mode.",
                        EventSeverity::Info,
                    );
                    return Some(record);
                }
                self.sim_queue.pop()
            }
        }
    }

    async fn wait_for_live_data(&self) -> bool {
        let interval = Duration::from_millis(self.config.fallback_interval_ms);
        for _ in 0..self.config.fallback_retries {
            if !self.live_queue.is_empty() {
                return true;
            }
            tokio::time::sleep(interval).await;
        }
        !self.live_queue.is_empty()
    }

    fn enter_simulated(&mut self, message: &str) {
        self.events.on_event(message, EventSeverity::Info);
        let mut simulated = SimulatedSource::new(
            Duration::from_millis(self.config.dummy_interval_ms),
            self.sim_queue.clone(),
            Arc::clone(&self.events),
        );
        if let Err(e) = simulated.start() {
            // Unreachable for the simulated source; keep the contract
            // honest anyway.
            warn!("failed to start simulated source: {e}");
        }
        self.simulated = Some(simulated);
        self.mode = SourceMode::Simulated;
    }

    fn stop_simulated(&mut self) {
        if let Some(mut simulated) = self.simulated.take() {
            simulated.stop();
        }
    }
}

impl Drop for TelemetryService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEventSink;
    use crate::record::{GpsReading, GyroReading};
    use tokio::io::AsyncWriteExt;

    fn test_config() -> GcsConfig {
        GcsConfig {
            fallback_retries: 3,
            fallback_interval_ms: 10,
            dummy_interval_ms: 10,
            ..GcsConfig::default()
        }
    }

    fn live_record() -> TelemetryRecord {
        TelemetryRecord {
            voltage: Some(3.3),
            current: Some(0.4),
            battery: 99.0,
            altitude: 850.0,
            vertical_speed: 14.0,
            temperature: 22.0,
            pressure: 925.0,
            gyro: GyroReading { x: 0.0, y: 0.0, z: 0.0 },
            gps: GpsReading { lat: 13.0, lon: 80.2, sat: Some(8) },
            time: "10:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_endpoint_falls_back_immediately() {
        let mut service = TelemetryService::new(test_config(), Arc::new(LogEventSink));
        service.start(None).await;
        assert_eq!(service.mode(), SourceMode::Simulated);
        service.stop();
    }

    #[tokio::test]
    async fn test_connect_failure_falls_back_immediately() {
        let mut service = TelemetryService::new(test_config(), Arc::new(LogEventSink));
        service.start(Some("/dev/nonexistent-cansat-port")).await;
        assert_eq!(service.mode(), SourceMode::Simulated);

        // The simulated stepper delivers a record shortly after.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.get_data().is_some());
        service.stop();
    }

    #[tokio::test]
    async fn test_wait_for_live_data_times_out_on_silence() {
        let service = TelemetryService::new(test_config(), Arc::new(LogEventSink));
        assert!(!service.wait_for_live_data().await);
    }

    #[tokio::test]
    async fn test_wait_for_live_data_sees_queued_record() {
        let service = TelemetryService::new(test_config(), Arc::new(LogEventSink));
        service.live_queue_handle().push(live_record());
        assert!(service.wait_for_live_data().await);
    }

    #[tokio::test]
    async fn test_simulated_mode_promotes_to_live_once() {
        let mut service = TelemetryService::new(test_config(), Arc::new(LogEventSink));
        service.start(None).await;
        assert_eq!(service.mode(), SourceMode::Simulated);

        service.live_queue_handle().push(live_record());
        let record = service.get_data().expect("live record should surface");
        assert_eq!(record.voltage, Some(3.3));
        assert_eq!(service.mode(), SourceMode::Live);

        // An empty live queue afterwards yields nothing; no demotion.
        assert!(service.get_data().is_none());
        assert_eq!(service.mode(), SourceMode::Live);
        service.stop();
    }

    #[tokio::test]
    async fn test_live_transport_closure_falls_back_to_simulated() {
        let mut service = TelemetryService::new(test_config(), Arc::new(LogEventSink));

        // Live mode over an in-memory transport in place of the port.
        let (transport, mut peer) = tokio::io::duplex(256);
        let mut live = LiveSerialSource::new("mem", 9600, service.live_queue_handle());
        live.spawn_reader(transport);
        service.live = Some(live);
        service.mode = SourceMode::Live;

        peer.write_all(b"3.3,13.0,80.2,850.0,22.0,925.0,14.0,0.4,0.0,0.0,0.0,99.0,10:00:00\n")
            .await
            .unwrap();
        drop(peer);

        // The in-flight record still surfaces in live mode.
        let mut record = None;
        for _ in 0..100 {
            record = service.get_data();
            if record.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(record.expect("in-flight record lost").altitude, 850.0);

        // Once the reader observes end of stream, polling switches over.
        for _ in 0..100 {
            service.get_data();
            if service.mode() == SourceMode::Simulated {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.mode(), SourceMode::Simulated);
        assert!(service.live.is_none());

        // And the simulator takes over production.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.get_data().is_some());
        service.stop();
    }
}
