//! Station configuration parameters
//!
//! All tunable parameters for the SiteWatch station.  The settings
//! collaborator supplies a snapshot at startup and on update; the core
//! treats it as immutable for the duration of one evaluation cycle.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::sensors::Channel;

/// Maximum site identifier length (bytes), matching the topic budget.
pub const SITE_ID_MAX: usize = 24;

/// Alarm limits for one channel.  Values outside `[min, max]` trigger an
/// event with 5 % hysteresis (see [`crate::alarm`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub min: f32,
    pub max: f32,
}

impl Threshold {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Per-channel alarm limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Distance in mm.
    pub lidar: Threshold,
    /// MQ-2 raw value.
    pub smoke: Threshold,
    /// ENS160 eCO2 in ppm.
    pub eco2: Threshold,
    /// ENS160 TVOC in ppb.
    pub tvoc: Threshold,
    /// Differential pressure in Pa.
    pub pressure: Threshold,
}

impl Thresholds {
    pub fn get(&self, channel: Channel) -> Threshold {
        match channel {
            Channel::Smoke => self.smoke,
            Channel::Eco2 => self.eco2,
            Channel::Tvoc => self.tvoc,
            Channel::Pressure => self.pressure,
            Channel::Lidar => self.lidar,
        }
    }

    pub fn set(&mut self, channel: Channel, threshold: Threshold) {
        match channel {
            Channel::Smoke => self.smoke = threshold,
            Channel::Eco2 => self.eco2 = threshold,
            Channel::Tvoc => self.tvoc = threshold,
            Channel::Pressure => self.pressure = threshold,
            Channel::Lidar => self.lidar = threshold,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lidar: Threshold::new(0.0, 1500.0),
            smoke: Threshold::new(0.0, 400.0),
            eco2: Threshold::new(400.0, 2000.0),
            tvoc: Threshold::new(0.0, 600.0),
            pressure: Threshold::new(-500.0, 500.0),
        }
    }
}

/// MQTT quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }

    /// Inverse of [`Qos::level`]; levels above 2 saturate.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::AtMostOnce,
            1 => Self::AtLeastOnce,
            _ => Self::ExactlyOnce,
        }
    }
}

/// Core station configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    // --- Identity / uplink ---
    /// Station identifier used in MQTT topics.
    pub site_id: heapless::String<SITE_ID_MAX>,
    /// Default QoS for publishes.
    pub qos: Qos,
    /// Publish `site/<id>/debug` messages.
    pub debug_enable: bool,

    // --- Alarm policy ---
    pub thresholds: Thresholds,
    /// Distance (mm) below which the chute counts as clogged.
    pub clog_min: f32,
    /// Consecutive low readings before a clog event.
    pub clog_hold: u8,

    // --- Filtering ---
    /// Moving-average window for the gas/AQ channels.
    pub gas_window: u8,

    // --- Timing ---
    /// Environmental sampling period (seconds).
    pub slow_interval_secs: u32,
    /// Routine distance scan period (seconds).
    pub distance_interval_secs: u32,
    /// Aim settle time before a re-scan is trusted (milliseconds).
    pub settle_ms: u32,
    /// Distance sensor serial response timeout (milliseconds).
    pub distance_timeout_ms: u32,
    /// Heartbeat summary period (seconds).
    pub heartbeat_interval_secs: u32,

    // --- Aim ---
    /// Lowest servo angle on both axes (degrees).
    pub aim_min: u8,
    /// Highest servo angle on both axes (degrees).
    pub aim_max: u8,
}

impl Default for StationConfig {
    fn default() -> Self {
        let mut site_id = heapless::String::new();
        // "UNDEF" always fits in SITE_ID_MAX.
        let _ = site_id.push_str("UNDEF");
        Self {
            site_id,
            qos: Qos::AtMostOnce,
            debug_enable: false,

            thresholds: Thresholds::default(),
            clog_min: 400.0,
            clog_hold: 2,

            gas_window: 5,

            slow_interval_secs: 60,
            distance_interval_secs: 600,
            settle_ms: 100,
            distance_timeout_ms: 1000,
            heartbeat_interval_secs: 300,

            aim_min: 0,
            aim_max: 180,
        }
    }
}

impl StationConfig {
    /// Range-check the snapshot.  Called by every [`ConfigPort`] before a
    /// config is handed to the core, so an inverted threshold is reported
    /// instead of producing a permanently triggered channel.
    ///
    /// [`ConfigPort`]: crate::app::ports::ConfigPort
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_id.is_empty() {
            return Err(ConfigError::ValidationFailed("site_id must not be empty"));
        }
        if self.site_id.contains(['/', '|', '+', '#']) {
            return Err(ConfigError::ValidationFailed(
                "site_id must not contain '/', '|', '+' or '#'",
            ));
        }
        for channel in Channel::ALL {
            let t = self.thresholds.get(channel);
            if !t.min.is_finite() || !t.max.is_finite() {
                return Err(ConfigError::ValidationFailed("thresholds must be finite"));
            }
            if t.min > t.max {
                return Err(ConfigError::ValidationFailed(
                    "threshold min must not exceed max",
                ));
            }
        }
        if !self.clog_min.is_finite() || self.clog_min < 0.0 {
            return Err(ConfigError::ValidationFailed("clog_min must be >= 0"));
        }
        if self.clog_hold == 0 {
            return Err(ConfigError::ValidationFailed("clog_hold must be >= 1"));
        }
        if !(1..=16).contains(&self.gas_window) {
            return Err(ConfigError::ValidationFailed("gas_window must be 1–16"));
        }
        if self.slow_interval_secs == 0 || self.distance_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("scan intervals must be > 0"));
        }
        if self.settle_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("settle_ms must be <= 10000"));
        }
        if !(10..=10_000).contains(&self.distance_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "distance_timeout_ms must be 10–10000",
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_interval_secs must be > 0",
            ));
        }
        if self.aim_min >= self.aim_max || self.aim_max > 180 {
            return Err(ConfigError::ValidationFailed(
                "aim range must satisfy aim_min < aim_max <= 180",
            ));
        }
        Ok(())
    }

    pub fn threshold(&self, channel: Channel) -> Threshold {
        self.thresholds.get(channel)
    }
}
