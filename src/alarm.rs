//! Hysteretic alarm engine and clog detector.
//!
//! The engine runs once per channel per evaluation cycle and keeps one
//! `active` flag per channel.  It only reports *transitions*: a channel
//! that stays out of band (or in band) produces nothing after the edge.
//!
//! ## Guard bands
//!
//! Each threshold `[min, max]` is widened by 5 % to trigger and narrowed
//! by 5 % to clear.  The factor flips for negative limits so the band
//! always widens outward / narrows inward regardless of sign:
//!
//! ```text
//!   on_low   = min · (min < 0 ? 1.05 : 0.95)     on_high  = max · (max < 0 ? 0.95 : 1.05)
//!   off_low  = min · (min < 0 ? 0.95 : 1.05)     off_high = max · (max < 0 ? 1.05 : 0.95)
//!
//!   inactive ──(v < on_low  ∨ v > on_high)──▶ active
//!   active   ──(off_low < v < off_high)─────▶ inactive
//! ```
//!
//! NaN never satisfies either predicate, so a broken reading cannot flip
//! a channel in either direction.

use log::{info, warn};

use crate::config::Threshold;
use crate::sensors::{CHANNEL_COUNT, Channel};

/// Hysteresis margin applied to both edges of a threshold.
pub const HYSTERESIS: f32 = 0.05;

/// Trigger and clear limits derived from one [`Threshold`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardBands {
    pub on_low: f32,
    pub on_high: f32,
    pub off_low: f32,
    pub off_high: f32,
}

impl GuardBands {
    pub fn new(t: Threshold) -> Self {
        let wide = 1.0 + HYSTERESIS;
        let narrow = 1.0 - HYSTERESIS;
        Self {
            on_low: t.min * if t.min < 0.0 { wide } else { narrow },
            on_high: t.max * if t.max < 0.0 { narrow } else { wide },
            off_low: t.min * if t.min < 0.0 { narrow } else { wide },
            off_high: t.max * if t.max < 0.0 { wide } else { narrow },
        }
    }

    /// Value is far enough outside the threshold to raise an alarm.
    pub fn triggers(&self, value: f32) -> bool {
        value < self.on_low || value > self.on_high
    }

    /// Value is far enough inside the threshold to clear an alarm.
    pub fn clears(&self, value: f32) -> bool {
        self.off_low < value && value < self.off_high
    }
}

/// Direction of an alarm edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    Triggered,
    Cleared,
}

impl AlarmTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triggered => "alarm",
            Self::Cleared => "clear",
        }
    }
}

/// One alarm edge on one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmEvent {
    pub channel: Channel,
    pub transition: AlarmTransition,
    /// The smoothed value that caused the edge.
    pub value: f32,
    pub threshold: Threshold,
}

/// Per-channel alarm state machine.
///
/// Owned by the scan context; `evaluate` is the only mutator.
#[derive(Debug, Default)]
pub struct AlarmEngine {
    active: [bool; CHANNEL_COUNT],
}

impl AlarmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one channel.  Returns an event only when its state flips.
    pub fn evaluate(
        &mut self,
        channel: Channel,
        value: f32,
        threshold: Threshold,
    ) -> Option<AlarmEvent> {
        let idx = channel.index();
        let bands = GuardBands::new(threshold);
        let was_active = self.active[idx];

        let transition = if !was_active && bands.triggers(value) {
            warn!(
                "ALARM SET: {} = {:.1} outside [{:.1}, {:.1}]",
                channel, value, threshold.min, threshold.max
            );
            AlarmTransition::Triggered
        } else if was_active && bands.clears(value) {
            info!("ALARM CLEARED: {} = {:.1}", channel, value);
            AlarmTransition::Cleared
        } else {
            return None;
        };

        self.active[idx] = transition == AlarmTransition::Triggered;
        Some(AlarmEvent {
            channel,
            transition,
            value,
            threshold,
        })
    }

    pub fn is_active(&self, channel: Channel) -> bool {
        self.active[channel.index()]
    }

    /// True if **any** channel is in alarm.
    pub fn any_active(&self) -> bool {
        self.active.iter().any(|a| *a)
    }

    /// Copy of every channel's flag, indexed by [`Channel::index`].
    pub fn states(&self) -> [bool; CHANNEL_COUNT] {
        self.active
    }
}

/// A clog was confirmed: `consecutive` readings in a row were below
/// `clog_min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClogEvent {
    pub distance: f32,
    pub consecutive: u32,
    pub clog_min: f32,
}

/// Edge-triggered low-distance counter.
///
/// Emits exactly one [`ClogEvent`] when the run of low readings first
/// reaches the hold count, or on the next low reading if a policy change
/// drops the hold count below a run already in progress.  The clogged condition persists until a reading
/// at or above `clog_min`, which also resets the run.
#[derive(Debug, Clone)]
pub struct ClogDetector {
    consecutive: u32,
    hold: u32,
    clog_min: f32,
    clogged: bool,
}

impl ClogDetector {
    /// `hold` of zero is treated as one.
    pub fn new(clog_min: f32, hold: u32) -> Self {
        Self {
            consecutive: 0,
            hold: hold.max(1),
            clog_min,
            clogged: false,
        }
    }

    /// Change the policy between cycles.  The current run is kept.
    pub fn set_policy(&mut self, clog_min: f32, hold: u32) {
        self.clog_min = clog_min;
        self.hold = hold.max(1);
    }

    pub fn update(&mut self, distance: f32) -> Option<ClogEvent> {
        if distance < self.clog_min {
            self.consecutive = self.consecutive.saturating_add(1);
            if self.consecutive >= self.hold && !self.clogged {
                warn!(
                    "CLOG: {} consecutive readings below {:.0} (last {:.0})",
                    self.consecutive, self.clog_min, distance
                );
                self.clogged = true;
                return Some(ClogEvent {
                    distance,
                    consecutive: self.consecutive,
                    clog_min: self.clog_min,
                });
            }
        } else if distance >= self.clog_min {
            if self.clogged {
                info!("CLOG CLEARED: distance {:.0}", distance);
            }
            self.consecutive = 0;
            self.clogged = false;
        }
        // NaN matches neither branch and leaves the run untouched.
        None
    }

    pub fn is_clogged(&self) -> bool {
        self.clogged
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
