//! GPIO / peripheral pin assignments for the SiteWatch station board.
//!
//! Single source of truth.  Drivers take their pins from here instead of
//! hard-coding numbers.

// ---------------------------------------------------------------------------
// Status LED (single discrete LED, active HIGH)
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Pan/tilt mount (two hobby servos on LEDC)
// ---------------------------------------------------------------------------

pub const SERVO_PAN_GPIO: i32 = 4;
pub const SERVO_TILT_GPIO: i32 = 5;

/// Standard hobby-servo frame rate (20 ms period).
pub const SERVO_PWM_FREQ_HZ: u32 = 50;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// SPIFFS mount point for the delivery buffer and configuration.
pub const FS_BASE_PATH: &str = "/spiffs";
pub const CONFIG_FILE: &str = "/spiffs/station.json";
pub const BUFFER_FILE: &str = "/spiffs/buffer.log";
