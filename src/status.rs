//! Visual status state machine.
//!
//! Three states, each rendered as a repeating on/off pattern on a single
//! indicator LED:
//!
//! | State  | Pattern                               | Meaning                 |
//! |--------|---------------------------------------|-------------------------|
//! | Normal | 100 ms on, 9900 ms off                | alive, nothing wrong    |
//! | Error  | 2 × (100 ms on, 100 ms off), 800 ms off | connectivity problem  |
//! | Alarm  | 500 ms on, 500 ms off                 | needs attention now     |
//!
//! Writers call [`StatusIndicator::set_state`] from any thread; the
//! renderer ([`crate::drivers::status_led`]) samples the state once at the
//! start of each cycle, so a change shows up at the next cycle boundary.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StatusState {
    #[default]
    Normal = 0,
    Error = 1,
    Alarm = 2,
}

impl StatusState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Error,
            2 => Self::Alarm,
            _ => Self::Normal,
        }
    }

    /// The blink pattern for this state.
    pub fn pattern(self) -> &'static [Step] {
        match self {
            Self::Normal => &NORMAL_PATTERN,
            Self::Error => &ERROR_PATTERN,
            Self::Alarm => &ALARM_PATTERN,
        }
    }

    /// Highest-priority state for the given conditions.
    ///
    /// Alarm (an out-of-policy channel or a clog) outranks a connectivity
    /// problem, which outranks normal operation.
    pub fn resolve(connected: bool, alarm: bool) -> Self {
        if alarm {
            Self::Alarm
        } else if !connected {
            Self::Error
        } else {
            Self::Normal
        }
    }
}

/// One segment of a blink pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub on: bool,
    pub ms: u32,
}

const fn on(ms: u32) -> Step {
    Step { on: true, ms }
}

const fn off(ms: u32) -> Step {
    Step { on: false, ms }
}

const NORMAL_PATTERN: [Step; 2] = [on(100), off(9900)];
const ERROR_PATTERN: [Step; 5] = [on(100), off(100), on(100), off(100), off(800)];
const ALARM_PATTERN: [Step; 2] = [on(500), off(500)];

/// Total duration of one pattern cycle.
pub fn cycle_ms(pattern: &[Step]) -> u32 {
    pattern.iter().map(|s| s.ms).sum()
}

/// Shared handle to the current indicator state.  Cheap to clone; every
/// clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct StatusIndicator {
    state: Arc<AtomicU8>,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: StatusState) {
        let prev = self.state.swap(state as u8, Ordering::AcqRel);
        if prev != state as u8 {
            log::info!(
                "Status: {:?} -> {:?}",
                StatusState::from_u8(prev),
                state
            );
        }
    }

    pub fn state(&self) -> StatusState {
        StatusState::from_u8(self.state.load(Ordering::Acquire))
    }
}
