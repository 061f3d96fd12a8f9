//! Pan/tilt hobby-servo driver.
//!
//! Each axis is a standard 50 Hz servo: a 500 µs pulse is 0°, a 2500 µs
//! pulse is 180°, repeated every 20 ms.  The PWM channel is anything that
//! implements `embedded_hal` [`SetDutyCycle`] (an LEDC channel on ESP-IDF),
//! so the angle maps to a duty fraction of `pulse_us / 20000`.

use embedded_hal::pwm::SetDutyCycle;

use crate::aim::Aim;
use crate::app::ports::AimOutput;

/// Servo frame period.
pub const PERIOD_US: u16 = 20_000;
/// Pulse width at 0°.
pub const MIN_PULSE_US: u16 = 500;
/// Pulse width at 180°.
pub const MAX_PULSE_US: u16 = 2_500;

/// Pulse width for `degrees` (clamped to 0–180).
pub fn pulse_us(degrees: u8) -> u16 {
    let deg = u32::from(degrees.min(180));
    let span = u32::from(MAX_PULSE_US - MIN_PULSE_US);
    MIN_PULSE_US + (deg * span / 180) as u16
}

/// Two servos driven as one pan/tilt mount.
pub struct PanTiltServos<X, Y> {
    pan: X,
    tilt: Y,
    current: Option<Aim>,
}

impl<X: SetDutyCycle, Y: SetDutyCycle> PanTiltServos<X, Y> {
    pub fn new(pan: X, tilt: Y) -> Self {
        Self {
            pan,
            tilt,
            current: None,
        }
    }

    /// Last commanded aim, `None` before the first command.
    pub fn current(&self) -> Option<Aim> {
        self.current
    }
}

impl<X: SetDutyCycle, Y: SetDutyCycle> AimOutput for PanTiltServos<X, Y> {
    fn point(&mut self, aim: Aim) {
        if self
            .pan
            .set_duty_cycle_fraction(pulse_us(aim.pan), PERIOD_US)
            .is_err()
        {
            log::warn!("Servo: pan duty update failed");
        }
        if self
            .tilt
            .set_duty_cycle_fraction(pulse_us(aim.tilt), PERIOD_US)
            .is_err()
        {
            log::warn!("Servo: tilt duty update failed");
        }
        self.current = Some(aim);
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    /// 16-bit PWM channel that remembers its duty.
    struct FakePwm {
        duty: u16,
    }

    impl embedded_hal::pwm::ErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            u16::MAX
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn pulse_endpoints() {
        assert_eq!(pulse_us(0), 500);
        assert_eq!(pulse_us(90), 1500);
        assert_eq!(pulse_us(180), 2500);
        assert_eq!(pulse_us(255), 2500);
    }

    #[test]
    fn centre_is_seven_and_a_half_percent_duty() {
        let mut servos = PanTiltServos::new(FakePwm { duty: 0 }, FakePwm { duty: 0 });
        servos.point(Aim::default());
        // 1500 / 20000 of 65535
        let expected = (u32::from(u16::MAX) * 1500 / 20_000) as u16;
        assert_eq!(servos.pan.duty, expected);
        assert_eq!(servos.tilt.duty, expected);
        assert_eq!(servos.current(), Some(Aim::default()));
    }
}
