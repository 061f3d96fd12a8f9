//! Simulated sensor source.
//!
//! Stand-in for hardware drivers that are not fitted (or for host runs).
//! Each channel has a baseline value with a slow deterministic wobble;
//! tests can queue exact results per channel, which are served first.

use std::collections::VecDeque;

use crate::app::ports::SensorSource;
use crate::error::SensorError;

use super::{CHANNEL_COUNT, Channel};

/// Deterministic simulated sensors.
pub struct SimulatedSensors {
    baseline: [f32; CHANNEL_COUNT],
    /// Peak deviation from the baseline, per channel.
    wobble: [f32; CHANNEL_COUNT],
    scripted: [VecDeque<Result<f32, SensorError>>; CHANNEL_COUNT],
    reads: [u32; CHANNEL_COUNT],
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensors {
    /// Quiet, in-policy baselines for every channel.
    pub fn new() -> Self {
        Self {
            baseline: [40.0, 650.0, 120.0, 15.0, 900.0],
            wobble: [0.0; CHANNEL_COUNT],
            scripted: Default::default(),
            reads: [0; CHANNEL_COUNT],
        }
    }

    /// Baselines with a small wobble so live views move.
    pub fn with_wobble() -> Self {
        let mut s = Self::new();
        s.wobble = [5.0, 40.0, 15.0, 3.0, 25.0];
        s
    }

    pub fn set_baseline(&mut self, channel: Channel, value: f32) {
        self.baseline[channel.index()] = value;
    }

    /// Queue an exact result for the next read of `channel`.
    pub fn push(&mut self, channel: Channel, result: Result<f32, SensorError>) {
        self.scripted[channel.index()].push_back(result);
    }

    /// Queue several successful values in order.
    pub fn push_values(&mut self, channel: Channel, values: &[f32]) {
        for &v in values {
            self.push(channel, Ok(v));
        }
    }

    /// Total reads served for `channel`.
    pub fn read_count(&self, channel: Channel) -> u32 {
        self.reads[channel.index()]
    }

    fn next(&mut self, channel: Channel) -> Result<f32, SensorError> {
        let idx = channel.index();
        self.reads[idx] = self.reads[idx].wrapping_add(1);
        if let Some(result) = self.scripted[idx].pop_front() {
            return result;
        }
        // Triangle wave over 16 reads.
        let phase = (self.reads[idx] % 16) as f32;
        let tri = if phase < 8.0 { phase / 8.0 } else { (16.0 - phase) / 8.0 };
        Ok(self.baseline[idx] + self.wobble[idx] * (tri * 2.0 - 1.0))
    }
}

impl SensorSource for SimulatedSensors {
    fn read(&mut self, channel: Channel) -> Result<f32, SensorError> {
        self.next(channel)
    }

    fn read_distance(&mut self, _timeout_ms: u32) -> Result<f32, SensorError> {
        self.next(Channel::Lidar)
    }
}
