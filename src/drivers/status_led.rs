//! Status LED renderer.
//!
//! Plays the [`StatusState`] blink pattern on a single indicator LED.  Runs
//! on its own thread; the state is sampled once at the start of every
//! cycle, so a change is visible within one cycle (at most 10 s in
//! `Normal`).
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal` [`OutputPin`] and [`DelayNs`]: on ESP-IDF a
//! `PinDriver` and `esp_idf_hal::delay::FreeRtos`; on host/test a recording
//! pin and a fake delay.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::status::{StatusIndicator, StatusState};

/// Longest single sleep, so a stop request is noticed promptly even in the
/// 9.9 s dark phase of the normal pattern.
const MAX_SLICE_MS: u32 = 250;

pub struct StatusLed<P, D> {
    pin: P,
    delay: D,
    indicator: StatusIndicator,
}

impl<P: OutputPin, D: DelayNs> StatusLed<P, D> {
    pub fn new(pin: P, delay: D, indicator: StatusIndicator) -> Self {
        Self {
            pin,
            delay,
            indicator,
        }
    }

    /// Play one full cycle of the current state's pattern.  Returns the
    /// state that was rendered.
    pub fn run_cycle(&mut self, stop: &AtomicBool) -> StatusState {
        let state = self.indicator.state();
        for step in state.pattern() {
            // A failing GPIO write is not worth aborting the indicator for.
            let _ = if step.on {
                self.pin.set_high()
            } else {
                self.pin.set_low()
            };
            let mut left = step.ms;
            while left > 0 {
                if stop.load(Ordering::Relaxed) {
                    return state;
                }
                let slice = left.min(MAX_SLICE_MS);
                self.delay.delay_ms(slice);
                left -= slice;
            }
        }
        state
    }

    /// Render until `stop` is raised, then leave the LED off.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.run_cycle(stop);
        }
        let _ = self.pin.set_low();
        log::info!("Status LED renderer stopped");
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}
