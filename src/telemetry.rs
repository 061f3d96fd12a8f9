//! Lock-free live readings for external readers (web UI, heartbeat).
//!
//! The scan thread is the only writer.  Every field is its own atomic, so a
//! reader never blocks the scan path.  A [`LiveReadings::snapshot`] may mix
//! fields from two neighbouring cycles; that is acceptable for display.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use serde::Serialize;

use crate::aim::Aim;
use crate::sensors::{CHANNEL_COUNT, Channel};

/// Latest filtered value, alarm flag and aim, one atomic per field.
#[derive(Debug)]
pub struct LiveReadings {
    /// `f32::to_bits` of the latest value per channel.
    values: [AtomicU32; CHANNEL_COUNT],
    alarms: [AtomicBool; CHANNEL_COUNT],
    clogged: AtomicBool,
    pan: AtomicU8,
    tilt: AtomicU8,
}

impl Default for LiveReadings {
    fn default() -> Self {
        let aim = Aim::default();
        Self {
            values: Default::default(),
            alarms: Default::default(),
            clogged: AtomicBool::new(false),
            pan: AtomicU8::new(aim.pan),
            tilt: AtomicU8::new(aim.tilt),
        }
    }
}

impl LiveReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, channel: Channel, value: f32) {
        self.values[channel.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn value(&self, channel: Channel) -> f32 {
        f32::from_bits(self.values[channel.index()].load(Ordering::Relaxed))
    }

    pub fn set_alarm(&self, channel: Channel, active: bool) {
        self.alarms[channel.index()].store(active, Ordering::Relaxed);
    }

    pub fn alarm(&self, channel: Channel) -> bool {
        self.alarms[channel.index()].load(Ordering::Relaxed)
    }

    pub fn set_clogged(&self, clogged: bool) {
        self.clogged.store(clogged, Ordering::Relaxed);
    }

    pub fn clogged(&self) -> bool {
        self.clogged.load(Ordering::Relaxed)
    }

    pub fn set_aim(&self, aim: Aim) {
        self.pan.store(aim.pan, Ordering::Relaxed);
        self.tilt.store(aim.tilt, Ordering::Relaxed);
    }

    pub fn aim(&self) -> Aim {
        Aim {
            pan: self.pan.load(Ordering::Relaxed),
            tilt: self.tilt.load(Ordering::Relaxed),
        }
    }

    /// True if any channel alarm or the clog condition is active.
    pub fn any_alarm(&self) -> bool {
        self.clogged() || Channel::ALL.iter().any(|&c| self.alarm(c))
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        let aim = self.aim();
        let mut alarms = heapless::Vec::new();
        for c in Channel::ALL {
            if self.alarm(c) {
                // Capacity equals the channel count.
                let _ = alarms.push(c.name());
            }
        }
        LiveSnapshot {
            lidar: self.value(Channel::Lidar),
            smoke: self.value(Channel::Smoke),
            eco2: self.value(Channel::Eco2),
            tvoc: self.value(Channel::Tvoc),
            pressure: self.value(Channel::Pressure),
            x: aim.pan,
            y: aim.tilt,
            clogged: self.clogged(),
            alarms,
        }
    }
}

/// Serializable view of [`LiveReadings`], field names as the UI expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub lidar: f32,
    pub smoke: f32,
    pub eco2: f32,
    pub tvoc: f32,
    pub pressure: f32,
    pub x: u8,
    pub y: u8,
    pub clogged: bool,
    /// Names of channels currently in alarm.
    pub alarms: heapless::Vec<&'static str, CHANNEL_COUNT>,
}
