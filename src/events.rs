//! Mission event side channel.
//!
//! The simulator and the service surface human-readable mission events
//! (phase transitions, fallback decisions) through an injected sink. The
//! presentation layer implements [`EventSink`]; the core never imports
//! presentation code.

use tracing::{info, warn};

/// How prominently the presentation layer should surface an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    /// Append to the mission log.
    Info,
    /// Worth interrupting the operator for.
    Popup,
}

/// Capability for receiving mission events.
pub trait EventSink: Send + Sync {
    fn on_event(&self, message: &str, severity: EventSeverity);
}

/// Sink that forwards events to the tracing log. Used when no interactive
/// consumer is attached.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn on_event(&self, message: &str, severity: EventSeverity) {
        match severity {
            EventSeverity::Info => info!(target: "mission", "{message}"),
            EventSeverity::Popup => warn!(target: "mission", "{message}"),
        }
    }
}
