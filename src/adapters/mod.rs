//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements | Connects to                       |
//! |---------------|------------|-----------------------------------|
//! | `config_file` | ConfigPort | JSON document on flash / host fs  |
//! | `file_log`    | LogStore   | Append-only line file             |
//! | `log_sink`    | EventSink  | Serial log output                 |
//! | `mqtt`        | Publisher  | ESP-IDF MQTT client (device only) |
//! | `sntp`        | -          | ESP-IDF SNTP client (device only) |
//! | `time`        | WallClock  | Monotonic clock, synced wall time |
//! | `wifi`        | -          | Station-mode reconnect supervisor |

pub mod config_file;
pub mod file_log;
pub mod log_sink;
#[cfg(feature = "espidf")]
pub mod mqtt;
#[cfg(feature = "espidf")]
pub mod sntp;
pub mod time;
pub mod wifi;
