//! # CanSat Ground-Station Telemetry Core
//!
//! Ingestion and mission-simulation core for a CanSat ground control
//! station: a background producer supplies structured telemetry frames
//! from either a live serial link or a physics-like mission simulator,
//! buffers them in a thread-safe queue, and exposes a non-blocking pull
//! API to the presentation layer.
//!
//! ## Features
//!
//! - **Dual-format frame decoding**: JSON objects or fixed-order 13-field
//!   delimited lines, with typed decode failures that never crash the
//!   pipeline
//! - **Mission simulation**: a descent profile with one-directional,
//!   altitude-triggered phase transitions and derived sensor models
//! - **Source fallback**: automatic switch to simulated telemetry when
//!   the serial link is absent or silent, with one-directional promotion
//!   back to live data
//! - **Bounded ingestion**: drop-oldest queueing so the display sees
//!   fresh data under backpressure
//!
//! ## Quick Start
//!
//! ```no_run
//! use cansat_gcs::{GcsConfig, LogEventSink, TelemetryService};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let mut service = TelemetryService::new(GcsConfig::default(), Arc::new(LogEventSink));
//! service.start(None).await;
//!
//! // Presentation layer pulls on a fixed timer tick.
//! if let Some(record) = service.get_data() {
//!     println!("altitude: {:.1} m", record.altitude);
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`decoder`] - frame decoding (one raw line in, one record or failure out)
//! - [`simulator`] - stateful mission-phase simulator
//! - [`source`] - live serial and simulated telemetry sources
//! - [`queue`] - shared producer/consumer record queue
//! - [`service`] - source orchestration and the `get_data` pull API
//! - [`config`] - recognized station options
//! - [`events`] - mission event sink capability

pub mod config;
pub mod decoder;
pub mod events;
pub mod queue;
pub mod record;
pub mod service;
pub mod simulator;
pub mod source;

// Re-export the main public types for convenience.
pub use config::{ConfigError, GcsConfig};
pub use decoder::{decode_frame, DecodeError};
pub use events::{EventSeverity, EventSink, LogEventSink};
pub use queue::IngestionQueue;
pub use record::{GpsReading, GyroReading, TelemetryRecord};
pub use service::{SourceMode, TelemetryService};
pub use simulator::{MissionPhase, MissionSimulator};
pub use source::{
    list_available_ports, ConnectionState, LiveSerialSource, SimulatedSource, SourceError,
    TelemetrySource,
};
