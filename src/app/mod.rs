//! Application core: pure station logic, zero I/O.
//!
//! This module contains the supervisory rules for the SiteWatch station:
//! cycle orchestration, alarm and clog evaluation, aim handling and
//! configuration staging.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
