//! SiteWatch firmware library.
//!
//! Supervisory core of a remote environmental-monitoring station: sample
//! filtering, hysteretic alarms, store-and-forward delivery, scan scheduling
//! and the status indicator.  Everything here builds and tests on the host;
//! ESP-IDF-specific code is guarded by `#[cfg(feature = "espidf")]` within
//! each module.

#![deny(unused_must_use)]

pub mod aim;
pub mod alarm;
pub mod app;
pub mod buffer;
pub mod config;
pub mod error;
pub mod filter;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod telemetry;
pub mod topics;
pub mod uplink;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;
