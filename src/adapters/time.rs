//! Clock adapters.
//!
//! Every timing decision in the station (scan periods, settle delay,
//! heartbeat) is expressed in milliseconds since boot.  Calendar time is
//! only used to stamp outbound payloads, through [`SystemWallClock`].
//!
//! - **`feature = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **otherwise**: uses `std::time::Instant` for host-side runs.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::WallClock;

/// Milliseconds-since-boot clock.
pub struct MonotonicClock {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(feature = "espidf")]
    pub fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since this clock was created.
    #[cfg(not(feature = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Whole seconds since boot.
    pub fn uptime_secs(&self) -> u64 {
        self.now_ms() / 1_000
    }
}

/// Earliest time accepted as synced: 2024-01-01T00:00:00Z.  The ESP32
/// boots at the epoch, so anything earlier means SNTP has not landed yet.
pub const MIN_SYNCED_EPOCH_SECS: u64 = 1_704_067_200;

/// [`WallClock`] over the system time, which SNTP disciplines on device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_epoch_secs(&self) -> Option<u64> {
        synced_epoch_secs(SystemTime::now())
    }
}

fn synced_epoch_secs(t: SystemTime) -> Option<u64> {
    let secs = t.duration_since(UNIX_EPOCH).ok()?.as_secs();
    (secs >= MIN_SYNCED_EPOCH_SECS).then_some(secs)
}
