//! Sensor subsystem: channel identities and the aggregating [`SensorHub`].
//!
//! The hub sits between a [`SensorSource`] (real drivers or the
//! [`simulated`] stand-in) and the station service.  It turns per-channel
//! read results into usable values, applying the fallback policy for
//! transient failures.

pub mod simulated;

use log::warn;

use crate::app::ports::SensorSource;
use crate::error::SensorError;

/// Number of measured channels.
pub const CHANNEL_COUNT: usize = 5;

/// A measured quantity with its own threshold and alarm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// MQ-2 smoke sensor (raw units).
    Smoke = 0,
    /// ENS160 equivalent CO2 (ppm).
    Eco2 = 1,
    /// ENS160 total VOC (ppb).
    Tvoc = 2,
    /// SDP810 differential pressure (Pa).
    Pressure = 3,
    /// Pan-tilt aimed distance sensor (mm).
    Lidar = 4,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Smoke,
        Channel::Eco2,
        Channel::Tvoc,
        Channel::Pressure,
        Channel::Lidar,
    ];

    /// Channels read on the slow environmental cadence.
    pub const ENVIRONMENTAL: [Channel; 4] = [
        Channel::Smoke,
        Channel::Eco2,
        Channel::Tvoc,
        Channel::Pressure,
    ];

    /// Index into per-channel arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used in topics and payloads.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Eco2 => "eco2",
            Self::Tvoc => "tvoc",
            Self::Pressure => "pressure",
            Self::Lidar => "lidar",
        }
    }

    /// Gas/AQ channels tolerate a failed read by reusing the last good value.
    pub const fn reuses_last_known(self) -> bool {
        matches!(self, Self::Smoke | Self::Eco2 | Self::Tvoc)
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// One raw measurement.  Consumed immediately by the channel's filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub channel: Channel,
    pub value: f32,
    /// Monotonic milliseconds since boot.
    pub timestamp_ms: u64,
}

/// Outcome of one channel read after the fallback policy was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// A fresh value from the device.
    Fresh(Sample),
    /// The read failed; this is the last good raw value for the channel.
    Stale(Sample, SensorError),
    /// The read failed and nothing usable is available.
    Missing(SensorError),
}

/// Wraps a [`SensorSource`] and remembers the last good raw value per
/// channel.
///
/// Individual read failures are logged and, for gas/AQ channels, the
/// previous good value is retained.  A single flaky sensor must not stall
/// the other channels.
pub struct SensorHub<S: SensorSource> {
    source: S,
    last_good: [Option<f32>; CHANNEL_COUNT],
    failures: [u32; CHANNEL_COUNT],
}

impl<S: SensorSource> SensorHub<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_good: [None; CHANNEL_COUNT],
            failures: [0; CHANNEL_COUNT],
        }
    }

    /// Read one environmental channel.
    pub fn read(&mut self, channel: Channel, now_ms: u64) -> Reading {
        let result = self.source.read(channel);
        self.settle(channel, result, now_ms)
    }

    /// Read the distance sensor, bounded by `timeout_ms`.
    pub fn read_distance(&mut self, timeout_ms: u32, now_ms: u64) -> Reading {
        let result = self.source.read_distance(timeout_ms);
        self.settle(Channel::Lidar, result, now_ms)
    }

    /// Consecutive failures on `channel` since its last good read.
    pub fn failure_count(&self, channel: Channel) -> u32 {
        self.failures[channel.index()]
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn settle(&mut self, channel: Channel, result: Result<f32, SensorError>, now_ms: u64) -> Reading {
        let idx = channel.index();
        let result = result.and_then(|v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(SensorError::InvalidReading)
            }
        });

        match result {
            Ok(value) => {
                self.last_good[idx] = Some(value);
                self.failures[idx] = 0;
                Reading::Fresh(Sample {
                    channel,
                    value,
                    timestamp_ms: now_ms,
                })
            }
            Err(e) => {
                self.failures[idx] = self.failures[idx].saturating_add(1);
                match self.last_good[idx] {
                    Some(value) if channel.reuses_last_known() => {
                        warn!("Sensor {}: {}, reusing last value {:.1}", channel, e, value);
                        Reading::Stale(
                            Sample {
                                channel,
                                value,
                                timestamp_ms: now_ms,
                            },
                            e,
                        )
                    }
                    _ => {
                        warn!("Sensor {}: {}, skipping this cycle", channel, e);
                        Reading::Missing(e)
                    }
                }
            }
        }
    }
}
