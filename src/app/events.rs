//! Outbound station events.
//!
//! The [`StationService`](super::service::StationService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, encode and
//! hand to the uplink, or both.

use crate::alarm::{AlarmEvent, ClogEvent};
use crate::config::StationConfig;
use crate::telemetry::LiveSnapshot;

/// Structured events emitted by the station core.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// A channel entered or left its alarm band.
    Alarm(AlarmEvent),

    /// The distance path reported a clog.
    Clog(ClogEvent),

    /// Periodic summary of live readings.
    Heartbeat(Heartbeat),

    /// Free-form diagnostic line, published only with `debug_enable`.
    Debug(String),

    /// A new configuration snapshot took effect at a cycle boundary.
    ConfigApplied(Box<StationConfig>),

    /// The service has started (carries the initial snapshot).
    Started(LiveSnapshot),
}

/// Payload of [`StationEvent::Heartbeat`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct Heartbeat {
    pub uptime_s: u64,
    pub readings: LiveSnapshot,
}
