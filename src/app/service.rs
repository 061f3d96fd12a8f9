//! Station service, the hexagonal core.
//!
//! [`StationService`] owns everything the scan thread mutates: the
//! configuration snapshot, per-channel filters, the alarm engine, the clog
//! detector, the scan scheduler and the current aim.  All I/O flows
//! through port traits injected at call sites, so the whole service is
//! testable with mock adapters and a fake clock.
//!
//! ```text
//!  SensorSource ──▶ ┌───────────────────────────────┐ ──▶ EventSink
//!                   │        StationService         │
//!  CommandQueue ──▶ │ Filter · Alarm · Clog · Sched │ ──▶ AimOutput
//!                   └──────────────┬────────────────┘
//!                                  └──▶ LiveReadings (atomics)
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use crate::aim::{Aim, CommandQueue};
use crate::alarm::{AlarmEngine, ClogDetector};
use crate::config::StationConfig;
use crate::filter::{FilterKind, SampleFilter};
use crate::scheduler::{DistanceTrigger, ScanScheduler, ScanWork};
use crate::sensors::{Channel, Reading, SensorHub};
use crate::status::StatusState;
use crate::telemetry::LiveReadings;

use super::commands::StationCommand;
use super::events::{Heartbeat, StationEvent};
use super::ports::{AimOutput, EventSink, SensorSource};

/// What one [`StationService::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    pub work: ScanWork,
    /// Events emitted during the step.
    pub events: usize,
}

/// Counts events on their way to the real sink.
struct Counted<'a, E: EventSink> {
    sink: &'a mut E,
    count: usize,
}

impl<E: EventSink> Counted<'_, E> {
    fn emit(&mut self, event: StationEvent) {
        self.sink.emit(&event);
        self.count += 1;
    }
}

fn filter_kind(channel: Channel, config: &StationConfig) -> FilterKind {
    match channel {
        Channel::Pressure => FilterKind::MedianEma,
        _ => FilterKind::MovingAverage {
            capacity: usize::from(config.gas_window),
        },
    }
}

// ───────────────────────────────────────────────────────────────
// StationService
// ───────────────────────────────────────────────────────────────

pub struct StationService<S: SensorSource> {
    config: StationConfig,
    /// Accepted update, applied at the next cycle boundary.
    staged: Option<StationConfig>,
    sensors: SensorHub<S>,
    /// Indexed by [`Channel::index`]; the lidar slot is unused because
    /// distance readings are evaluated raw.
    filters: [SampleFilter; 5],
    alarms: AlarmEngine,
    clog: ClogDetector,
    scheduler: ScanScheduler,
    aim: Aim,
    live: Arc<LiveReadings>,
    boot_ms: u64,
}

impl<S: SensorSource> StationService<S> {
    /// Build the service.  The first slow cycle and distance scan are due
    /// at `now_ms`.
    pub fn new(config: StationConfig, sensors: S, now_ms: u64) -> Self {
        let filters = Channel::ALL.map(|c| SampleFilter::new(filter_kind(c, &config)));
        let clog = ClogDetector::new(config.clog_min, u32::from(config.clog_hold));
        let scheduler = ScanScheduler::new(&config, now_ms);
        let aim = Aim::default().clamped(config.aim_min, config.aim_max);
        let live = Arc::new(LiveReadings::new());
        live.set_aim(aim);
        Self {
            config,
            staged: None,
            sensors: SensorHub::new(sensors),
            filters,
            alarms: AlarmEngine::new(),
            clog,
            scheduler,
            aim,
            live,
            boot_ms: now_ms,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Park the mount at its initial aim and announce startup.
    pub fn start(&mut self, aim_out: &mut impl AimOutput, sink: &mut impl EventSink) {
        aim_out.point(self.aim);
        sink.emit(&StationEvent::Started(self.live.snapshot()));
        info!(
            "StationService started: site={} aim=({}, {})",
            self.config.site_id, self.aim.pan, self.aim.tilt
        );
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one external command.
    pub fn handle_command(
        &mut self,
        cmd: StationCommand,
        now_ms: u64,
        aim_out: &mut impl AimOutput,
    ) {
        match cmd {
            StationCommand::Aim(aim_cmd) => {
                let next = self
                    .aim
                    .apply(aim_cmd, self.config.aim_min, self.config.aim_max);
                if next == self.aim {
                    debug!("Aim unchanged at ({}, {})", next.pan, next.tilt);
                    return;
                }
                self.move_to(next, now_ms, aim_out);
            }
            StationCommand::UpdateConfig(new_config) => match new_config.validate() {
                Ok(()) => {
                    info!("Configuration staged for next cycle");
                    self.staged = Some(*new_config);
                }
                Err(e) => warn!("Configuration update rejected: {}", e),
            },
        }
    }

    /// Drain every queued command.  Returns how many were handled.
    pub fn drain_commands(
        &mut self,
        queue: &CommandQueue,
        now_ms: u64,
        aim_out: &mut impl AimOutput,
    ) -> usize {
        let mut n = 0;
        while let Some(cmd) = queue.try_recv() {
            self.handle_command(cmd, now_ms, aim_out);
            n += 1;
        }
        n
    }

    // ── Per-step orchestration ────────────────────────────────

    /// Run whatever work is due at `now_ms`.
    pub fn step(
        &mut self,
        now_ms: u64,
        aim_out: &mut impl AimOutput,
        sink: &mut impl EventSink,
    ) -> StepReport {
        let mut out = Counted { sink, count: 0 };

        if let Some(config) = self.staged.take() {
            self.apply_config(config, now_ms, aim_out, &mut out);
        }

        let work = self.scheduler.poll(now_ms);

        if work.slow {
            self.slow_cycle(now_ms, &mut out);
        }
        if let Some(trigger) = work.distance {
            self.distance_cycle(trigger, now_ms, &mut out);
            self.scheduler.distance_done();
        }
        if work.heartbeat {
            out.emit(StationEvent::Heartbeat(Heartbeat {
                uptime_s: now_ms.saturating_sub(self.boot_ms) / 1000,
                readings: self.live.snapshot(),
            }));
        }

        StepReport {
            work,
            events: out.count,
        }
    }

    /// Read, filter and evaluate every environmental channel.  A failing
    /// channel never stops the others.
    fn slow_cycle<E: EventSink>(&mut self, now_ms: u64, out: &mut Counted<'_, E>) {
        for channel in Channel::ENVIRONMENTAL {
            let value = match self.sensors.read(channel, now_ms) {
                Reading::Fresh(s) | Reading::Stale(s, _) => s.value,
                Reading::Missing(_) => continue,
            };
            let filter = &mut self.filters[channel.index()];
            filter.add(value);
            let smoothed = filter.average();
            self.live.set_value(channel, smoothed);

            let threshold = self.config.threshold(channel);
            if let Some(event) = self.alarms.evaluate(channel, smoothed, threshold) {
                self.live.set_alarm(channel, self.alarms.is_active(channel));
                out.emit(StationEvent::Alarm(event));
            }
        }
    }

    /// One distance read: clog detection plus alarm evaluation on the raw
    /// value.
    fn distance_cycle<E: EventSink>(
        &mut self,
        trigger: DistanceTrigger,
        now_ms: u64,
        out: &mut Counted<'_, E>,
    ) {
        let distance = match self
            .sensors
            .read_distance(self.config.distance_timeout_ms, now_ms)
        {
            Reading::Fresh(s) | Reading::Stale(s, _) => s.value,
            Reading::Missing(e) => {
                if self.config.debug_enable {
                    out.emit(StationEvent::Debug(format!("distance read failed: {e}")));
                }
                return;
            }
        };
        self.live.set_value(Channel::Lidar, distance);

        if let Some(event) = self.clog.update(distance) {
            out.emit(StationEvent::Clog(event));
        }
        self.live.set_clogged(self.clog.is_clogged());

        let threshold = self.config.threshold(Channel::Lidar);
        if let Some(event) = self.alarms.evaluate(Channel::Lidar, distance, threshold) {
            self.live.set_alarm(Channel::Lidar, self.alarms.is_active(Channel::Lidar));
            out.emit(StationEvent::Alarm(event));
        }

        if self.config.debug_enable {
            out.emit(StationEvent::Debug(format!(
                "distance {:?} {:.0}mm at ({}, {})",
                trigger, distance, self.aim.pan, self.aim.tilt
            )));
        }
    }

    fn apply_config<E: EventSink>(
        &mut self,
        config: StationConfig,
        now_ms: u64,
        aim_out: &mut impl AimOutput,
        out: &mut Counted<'_, E>,
    ) {
        if config.gas_window != self.config.gas_window {
            for channel in Channel::ENVIRONMENTAL {
                let kind = filter_kind(channel, &config);
                if self.filters[channel.index()].kind() != kind {
                    self.filters[channel.index()] = SampleFilter::new(kind);
                }
            }
        }
        self.clog
            .set_policy(config.clog_min, u32::from(config.clog_hold));
        self.scheduler.reconfigure(&config, now_ms);

        let clamped = self.aim.clamped(config.aim_min, config.aim_max);
        self.config = config;
        if clamped != self.aim {
            self.move_to(clamped, now_ms, aim_out);
        }

        out.emit(StationEvent::ConfigApplied(Box::new(self.config.clone())));
    }

    fn move_to(&mut self, aim: Aim, now_ms: u64, aim_out: &mut impl AimOutput) {
        debug!(
            "Aim ({}, {}) -> ({}, {})",
            self.aim.pan, self.aim.tilt, aim.pan, aim.tilt
        );
        self.aim = aim;
        aim_out.point(aim);
        self.live.set_aim(aim);
        self.scheduler.request_scan(now_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Indicator state for the current conditions.
    pub fn status(&self, connected: bool) -> StatusState {
        StatusState::resolve(
            connected,
            self.alarms.any_active() || self.clog.is_clogged(),
        )
    }

    /// Earliest time at which [`step`](Self::step) has work to do.
    pub fn next_deadline_ms(&self) -> u64 {
        if self.staged.is_some() {
            return 0;
        }
        self.scheduler.next_deadline_ms()
    }

    pub fn aim(&self) -> Aim {
        self.aim
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn is_alarm_active(&self, channel: Channel) -> bool {
        self.alarms.is_active(channel)
    }

    pub fn is_clogged(&self) -> bool {
        self.clog.is_clogged()
    }

    /// Shared handle for external readers.
    pub fn live(&self) -> Arc<LiveReadings> {
        Arc::clone(&self.live)
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        self.sensors.source_mut()
    }

    pub fn scheduler(&self) -> &ScanScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aim::AimCommand;
    use crate::sensors::simulated::SimulatedSensors;

    #[derive(Default)]
    struct Events(Vec<StationEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &StationEvent) {
            self.0.push(event.clone());
        }
    }

    #[derive(Default)]
    struct Mount(Vec<Aim>);

    impl AimOutput for Mount {
        fn point(&mut self, aim: Aim) {
            self.0.push(aim);
        }
    }

    #[test]
    fn first_step_runs_both_paths() {
        let mut svc = StationService::new(StationConfig::default(), SimulatedSensors::new(), 0);
        let report = svc.step(0, &mut Mount::default(), &mut Events::default());
        assert!(report.work.slow);
        assert_eq!(report.work.distance, Some(DistanceTrigger::Periodic));
        assert_eq!(report.events, 0);
        assert_eq!(svc.live().value(Channel::Lidar), 900.0);
        assert_eq!(svc.status(true), StatusState::Normal);
    }

    #[test]
    fn aim_command_moves_mount_and_arms_rescan() {
        let mut svc = StationService::new(StationConfig::default(), SimulatedSensors::new(), 0);
        let mut mount = Mount::default();
        svc.step(0, &mut mount, &mut Events::default());

        svc.handle_command(
            StationCommand::Aim(AimCommand::Nudge { dpan: 10, dtilt: -5 }),
            1_000,
            &mut mount,
        );
        assert_eq!(mount.0.last(), Some(&Aim { pan: 100, tilt: 85 }));
        assert_eq!(svc.next_deadline_ms(), 1_100);

        let report = svc.step(1_100, &mut mount, &mut Events::default());
        assert_eq!(report.work.distance, Some(DistanceTrigger::Requested));
    }

    #[test]
    fn invalid_update_is_ignored() {
        let mut svc = StationService::new(StationConfig::default(), SimulatedSensors::new(), 0);
        let mut bad = StationConfig::default();
        bad.clog_hold = 0;
        svc.handle_command(StationCommand::UpdateConfig(Box::new(bad)), 0, &mut Mount::default());
        assert_eq!(svc.next_deadline_ms(), 0);
        let mut events = Events::default();
        svc.step(0, &mut Mount::default(), &mut events);
        assert!(
            !events.0.iter().any(|e| matches!(e, StationEvent::ConfigApplied(_))),
            "rejected config must not be applied"
        );
        assert_eq!(svc.config().clog_hold, 2);
    }

    #[test]
    fn narrowed_aim_range_reclamps_mount() {
        let mut svc = StationService::new(StationConfig::default(), SimulatedSensors::new(), 0);
        let mut mount = Mount::default();
        svc.handle_command(
            StationCommand::Aim(AimCommand::Absolute { pan: 170, tilt: 10 }),
            0,
            &mut mount,
        );

        let mut cfg = StationConfig::default();
        cfg.aim_min = 30;
        cfg.aim_max = 150;
        svc.handle_command(StationCommand::UpdateConfig(Box::new(cfg)), 5, &mut mount);
        svc.step(10, &mut mount, &mut Events::default());
        assert_eq!(svc.aim(), Aim { pan: 150, tilt: 30 });
        assert_eq!(mount.0.last(), Some(&Aim { pan: 150, tilt: 30 }));
    }
}
