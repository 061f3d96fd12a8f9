//! Inbound commands to the station service.
//!
//! These represent actions requested by the outside world (web UI, broker
//! callbacks, provisioning) that the
//! [`StationService`](super::service::StationService) interprets between
//! scan cycles.

use crate::aim::AimCommand;
use crate::config::StationConfig;

/// Commands that external adapters can send into the station core.
#[derive(Debug, Clone)]
pub enum StationCommand {
    /// Re-aim the distance sensor.  Arms a coalesced rescan.
    Aim(AimCommand),

    /// Replace the configuration snapshot.  Applied at the next cycle
    /// boundary, never mid-cycle.
    UpdateConfig(Box<StationConfig>),
}
