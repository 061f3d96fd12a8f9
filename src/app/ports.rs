//! Port traits: the hexagonal boundary between the station core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StationService / DeliveryBuffer (domain)
//! ```
//!
//! Driven adapters (sensors, servos, uplink, durable log, config file)
//! implement these traits.  The domain consumes them via generics, so the
//! supervisory logic never touches hardware, flash or the network directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **LogStore** implementations MUST make `replace` atomic: a failed
//!   replace leaves the previous contents readable.

use crate::aim::Aim;
use crate::config::{Qos, StationConfig};
use crate::error::{SensorError, StorageError};
use crate::sensors::Channel;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw per-channel measurements.
pub trait SensorSource {
    /// Read one environmental channel.  Non-finite values are the caller's
    /// problem; the [`SensorHub`](crate::sensors::SensorHub) maps them to
    /// [`SensorError::InvalidReading`].
    fn read(&mut self, channel: Channel) -> Result<f32, SensorError>;

    /// Single distance measurement in millimetres, bounded by `timeout_ms`.
    fn read_distance(&mut self, timeout_ms: u32) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Aim port (driven adapter: domain → pan/tilt actuator)
// ───────────────────────────────────────────────────────────────

pub trait AimOutput {
    /// Drive the pan/tilt mount to `aim`.  Angles are already clamped.
    fn point(&mut self, aim: Aim);
}

// ───────────────────────────────────────────────────────────────
// Uplink port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Message uplink.  Shared between the scan and network threads, hence
/// `&self` and `Sync`.
pub trait Publisher: Send + Sync {
    /// Publish one message.  `true` means the client accepted it.
    fn publish(&self, topic: &str, payload: &str, qos: Qos, retain: bool) -> bool;

    /// Current session state.
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Wall clock port (driven adapter: SNTP-disciplined system time → domain)
// ───────────────────────────────────────────────────────────────

/// Calendar time for payload timestamps.  Scheduling never uses it; that
/// runs on the monotonic clock.
pub trait WallClock: Send + Sync {
    /// Seconds since the Unix epoch, or `None` until time has been synced.
    fn now_epoch_secs(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Durable log port (driven adapter: domain ↔ flash file)
// ───────────────────────────────────────────────────────────────

/// Line-oriented append-only log used by the delivery buffer.
///
/// Lines are handed over without their trailing newline.
pub trait LogStore {
    /// Append one line.
    fn append_line(&mut self, line: &str) -> Result<(), StorageError>;

    /// All lines in append order.  A log that does not exist yet reads as
    /// empty.
    fn read_lines(&mut self) -> Result<Vec<String>, StorageError>;

    /// Atomically replace the whole log with `lines`.
    fn replace(&mut self, lines: &[String]) -> Result<(), StorageError>;

    /// Delete the log.  Deleting a missing log succeeds.
    fn remove(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / uplink)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`StationEvent`](super::events::StationEvent)s
/// through this port.  Adapters decide where they go (serial log, broker).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::StationEvent);
}

/// Fan out to two sinks, in order.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::StationEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &super::events::StationEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists station configuration.
///
/// Invalid values are rejected with [`ConfigError::ValidationFailed`], not
/// clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`ConfigError::NotFound`] if nothing has
    /// been stored yet.
    fn load(&self) -> Result<StationConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &StationConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config could not be deserialized.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}
