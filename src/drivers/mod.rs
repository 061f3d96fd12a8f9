//! Actuator drivers and thread helpers.

pub mod servo;
pub mod status_led;
pub mod task_pin;
pub mod watchdog;
