//! Scan scheduler.
//!
//! Decides, for a given monotonic time, which work the scan thread owes:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Trigger Sources                          │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ Slow      │  │ Distance  │  │ Aim       │  │Heartbeat │   │
//! │  │ period    │  │ period    │  │ change    │  │ period   │   │
//! │  │ (60 s)    │  │ (600 s)   │  │ (+settle) │  │ (300 s)  │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        │              └──────┬───────┘              │        │
//! │        │                     │ whichever first      │        │
//! │        ▼                     ▼                      ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                 ScanScheduler::poll(now)               │  │
//! │  │                    → ScanWork                          │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                   StationService.step()                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aim changes arm a single pending [`ScanRequest`].  Another aim change
//! before it is due pushes the due time out again, so a burst of nudges
//! produces exactly one re-read once the mount has settled.
//!
//! The scheduler holds no clock.  Callers pass monotonic milliseconds, which
//! keeps it deterministic under test.

use log::{debug, info};

use crate::config::StationConfig;

// ═══════════════════════════════════════════════════════════════
//  Work description
// ═══════════════════════════════════════════════════════════════

/// Why a distance read is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceTrigger {
    /// The routine distance period elapsed.
    Periodic,
    /// A pending aim-triggered request reached its due time.
    Requested,
}

/// Work owed at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanWork {
    /// Read, filter and evaluate the environmental channels.
    pub slow: bool,
    /// Read the distance sensor.
    pub distance: Option<DistanceTrigger>,
    /// Emit a heartbeat summary.
    pub heartbeat: bool,
}

impl ScanWork {
    pub fn is_idle(&self) -> bool {
        !self.slow && self.distance.is_none() && !self.heartbeat
    }
}

/// One-shot, coalesced demand for a distance re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub due_ms: u64,
}

/// State of the distance path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistancePhase {
    Idle,
    Reading,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ScanScheduler {
    slow_interval_ms: u64,
    distance_interval_ms: u64,
    heartbeat_interval_ms: u64,
    settle_ms: u64,

    next_slow_ms: u64,
    next_distance_ms: u64,
    next_heartbeat_ms: u64,
    pending: Option<ScanRequest>,
    phase: DistancePhase,
}

impl ScanScheduler {
    /// The first slow cycle and the first distance scan are due at
    /// `now_ms`; the first heartbeat one period later.
    pub fn new(config: &StationConfig, now_ms: u64) -> Self {
        let mut sched = Self {
            slow_interval_ms: 0,
            distance_interval_ms: 0,
            heartbeat_interval_ms: 0,
            settle_ms: 0,
            next_slow_ms: now_ms,
            next_distance_ms: now_ms,
            next_heartbeat_ms: 0,
            pending: None,
            phase: DistancePhase::Idle,
        };
        sched.set_timing(config);
        sched.next_heartbeat_ms = now_ms + sched.heartbeat_interval_ms;
        sched
    }

    /// Apply new intervals.  Deadlines further out than one new period are
    /// pulled in, so shortening an interval takes effect promptly.
    pub fn reconfigure(&mut self, config: &StationConfig, now_ms: u64) {
        self.set_timing(config);
        self.next_slow_ms = self.next_slow_ms.min(now_ms + self.slow_interval_ms);
        self.next_distance_ms = self
            .next_distance_ms
            .min(now_ms + self.distance_interval_ms);
        self.next_heartbeat_ms = self
            .next_heartbeat_ms
            .min(now_ms + self.heartbeat_interval_ms);
        info!(
            "Scheduler: slow {}s, distance {}s, heartbeat {}s, settle {}ms",
            config.slow_interval_secs,
            config.distance_interval_secs,
            config.heartbeat_interval_secs,
            config.settle_ms
        );
    }

    fn set_timing(&mut self, config: &StationConfig) {
        // Zero intervals are rejected by validation; clamp so a hand-built
        // config cannot spin the scan loop.
        self.slow_interval_ms = u64::from(config.slow_interval_secs.max(1)) * 1000;
        self.distance_interval_ms = u64::from(config.distance_interval_secs.max(1)) * 1000;
        self.heartbeat_interval_ms = u64::from(config.heartbeat_interval_secs.max(1)) * 1000;
        self.settle_ms = u64::from(config.settle_ms);
    }

    /// Arm (or re-arm) the pending distance request after an aim change.
    pub fn request_scan(&mut self, now_ms: u64) {
        let due_ms = now_ms + self.settle_ms;
        if self.pending.is_some() {
            debug!("Scheduler: rescan re-armed, due at {}ms", due_ms);
        } else {
            debug!("Scheduler: rescan armed, due at {}ms", due_ms);
        }
        self.pending = Some(ScanRequest { due_ms });
    }

    /// Work due at `now_ms`.
    ///
    /// A returned distance trigger moves the distance path to
    /// [`DistancePhase::Reading`], clears the pending request and restarts
    /// the routine period.  Call [`ScanScheduler::distance_done`] once the
    /// read has been handled.
    pub fn poll(&mut self, now_ms: u64) -> ScanWork {
        let mut work = ScanWork::default();

        if now_ms >= self.next_slow_ms {
            work.slow = true;
            self.next_slow_ms = now_ms + self.slow_interval_ms;
        }

        if self.phase == DistancePhase::Idle {
            let requested = self.pending.is_some_and(|r| now_ms >= r.due_ms);
            let periodic = now_ms >= self.next_distance_ms;
            if requested || periodic {
                work.distance = Some(if requested {
                    DistanceTrigger::Requested
                } else {
                    DistanceTrigger::Periodic
                });
                self.pending = None;
                self.next_distance_ms = now_ms + self.distance_interval_ms;
                self.phase = DistancePhase::Reading;
            }
        }

        if now_ms >= self.next_heartbeat_ms {
            work.heartbeat = true;
            self.next_heartbeat_ms = now_ms + self.heartbeat_interval_ms;
        }

        work
    }

    /// The distance read started by the last [`poll`](Self::poll) is
    /// finished (successfully or not).
    pub fn distance_done(&mut self) {
        self.phase = DistancePhase::Idle;
    }

    /// Earliest time at which [`poll`](Self::poll) may return new work.
    pub fn next_deadline_ms(&self) -> u64 {
        let mut next = self.next_slow_ms.min(self.next_heartbeat_ms);
        if self.phase == DistancePhase::Idle {
            next = next.min(self.next_distance_ms);
            if let Some(r) = self.pending {
                next = next.min(r.due_ms);
            }
        }
        next
    }

    pub fn pending(&self) -> Option<ScanRequest> {
        self.pending
    }

    pub fn phase(&self) -> DistancePhase {
        self.phase
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
