//! Pan/tilt aim state and the cross-thread command queue.
//!
//! Aim commands arrive from outside the scan thread (web UI, broker
//! callbacks).  They are queued as [`StationCommand`]s on a small bounded
//! channel and drained by the scan thread between cycles:
//!
//! ```text
//!   UI / broker ──try_send──▶ [ CommandQueue (depth 4) ] ──drain──▶ StationService
//! ```
//!
//! A full queue drops the newest command.  Aim changes are coalesced by the
//! scheduler anyway, so losing a burst of nudges costs nothing but latency.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::StationCommand;

/// Depth of the command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

/// Pan/tilt angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Aim {
    pub pan: u8,
    pub tilt: u8,
}

impl Default for Aim {
    fn default() -> Self {
        Self { pan: 90, tilt: 90 }
    }
}

/// Requested change of aim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AimCommand {
    /// Relative move in degrees.
    Nudge { dpan: i8, dtilt: i8 },
    /// Absolute position in degrees.  Out-of-range values are clamped.
    Absolute { pan: i16, tilt: i16 },
}

impl Aim {
    /// Apply `cmd` and clamp both axes to `[lo, hi]`.
    pub fn apply(self, cmd: AimCommand, lo: u8, hi: u8) -> Self {
        let (pan, tilt) = match cmd {
            AimCommand::Nudge { dpan, dtilt } => (
                i16::from(self.pan) + i16::from(dpan),
                i16::from(self.tilt) + i16::from(dtilt),
            ),
            AimCommand::Absolute { pan, tilt } => (pan, tilt),
        };
        Self {
            pan: clamp_axis(pan, lo, hi),
            tilt: clamp_axis(tilt, lo, hi),
        }
    }

    /// Clamp an existing aim into `[lo, hi]` (after a config change).
    pub fn clamped(self, lo: u8, hi: u8) -> Self {
        self.apply(
            AimCommand::Absolute {
                pan: self.pan.into(),
                tilt: self.tilt.into(),
            },
            lo,
            hi,
        )
    }
}

/// Wire form of an aim command, as posted by the web UI or published on
/// `site/<id>/cmd/aim`:
///
/// ```text
///   {"pan": 120, "tilt": 45}      absolute
///   {"dpan": -5}                  relative, missing axis = 0
/// ```
#[derive(Debug, serde::Deserialize)]
struct AimRequest {
    pan: Option<i16>,
    tilt: Option<i16>,
    dpan: Option<i8>,
    dtilt: Option<i8>,
}

impl AimCommand {
    /// Parse a JSON aim request.  Absolute needs both axes; a request with
    /// neither form is rejected.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let req: AimRequest = serde_json::from_slice(payload).ok()?;
        match (req.pan, req.tilt, req.dpan, req.dtilt) {
            (Some(pan), Some(tilt), None, None) => Some(Self::Absolute { pan, tilt }),
            (None, None, dpan, dtilt) if dpan.is_some() || dtilt.is_some() => Some(Self::Nudge {
                dpan: dpan.unwrap_or(0),
                dtilt: dtilt.unwrap_or(0),
            }),
            _ => None,
        }
    }
}

fn clamp_axis(v: i16, lo: u8, hi: u8) -> u8 {
    // Ordered here too: `clamp` panics when lo > hi.
    let (lo, hi) = (i16::from(lo.min(hi)), i16::from(hi.max(lo)));
    v.clamp(lo, hi) as u8
}

/// Bounded multi-producer command queue into the scan thread.
pub struct CommandQueue {
    channel: Channel<CriticalSectionRawMutex, StationCommand, COMMAND_QUEUE_DEPTH>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without blocking.  Returns `false` (and drops `cmd`) when
    /// the queue is full.
    pub fn try_send(&self, cmd: StationCommand) -> bool {
        match self.channel.try_send(cmd) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Command queue full, dropping newest command");
                false
            }
        }
    }

    /// Convenience for the common aim case.
    pub fn send_aim(&self, cmd: AimCommand) -> bool {
        self.try_send(StationCommand::Aim(cmd))
    }

    /// Take the next queued command, if any.
    pub fn try_recv(&self) -> Option<StationCommand> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}
