//! Integration tests for the StationService → alarm/clog → uplink pipeline.
//!
//! A simulated sensor source is scripted per channel and the service is
//! stepped with an explicit clock, so every cycle boundary is exact.

use std::sync::Arc;

use sitewatch::aim::{Aim, AimCommand, CommandQueue};
use sitewatch::alarm::AlarmTransition;
use sitewatch::app::commands::StationCommand;
use sitewatch::app::events::StationEvent;
use sitewatch::app::service::StationService;
use sitewatch::buffer::{DeliveryBuffer, FlushReport, MemoryLogStore};
use sitewatch::config::StationConfig;
use sitewatch::error::SensorError;
use sitewatch::scheduler::DistanceTrigger;
use sitewatch::sensors::Channel;
use sitewatch::sensors::simulated::SimulatedSensors;
use sitewatch::status::StatusState;
use sitewatch::uplink::{LinkMonitor, Uplink, UplinkSink};

use crate::mock_hw::{MockBroker, MockMount, RecordingSink};

const SLOW_MS: u64 = 60_000;

fn unsmoothed() -> StationConfig {
    let mut cfg = StationConfig::default();
    cfg.gas_window = 1;
    cfg
}

fn make_service(cfg: StationConfig) -> (StationService<SimulatedSensors>, MockMount, RecordingSink) {
    (
        StationService::new(cfg, SimulatedSensors::new(), 0),
        MockMount::default(),
        RecordingSink::default(),
    )
}

/// Nudge the mount back and forth so the aim always changes, then step
/// once the settle delay has passed.
fn rescan(
    svc: &mut StationService<SimulatedSensors>,
    mount: &mut MockMount,
    sink: &mut RecordingSink,
    at_ms: u64,
    n: u32,
) {
    let dpan = if n % 2 == 0 { 1 } else { -1 };
    svc.handle_command(
        StationCommand::Aim(AimCommand::Nudge { dpan, dtilt: 0 }),
        at_ms,
        mount,
    );
    let report = svc.step(at_ms + 100, mount, sink);
    assert_eq!(report.work.distance, Some(DistanceTrigger::Requested));
}

// ── Hysteresis ───────────────────────────────────────────────

#[test]
fn smoke_alarm_sets_and_clears_with_hysteresis() {
    let (mut svc, mut mount, mut sink) = make_service(unsmoothed());
    // Smoke band 0..400: trigger above 420, clear below 380.
    svc.sensors_mut()
        .push_values(Channel::Smoke, &[410.0, 430.0, 390.0, 379.0, 450.0]);

    for cycle in 0..5 {
        svc.step(cycle * SLOW_MS, &mut mount, &mut sink);
    }

    let transitions: Vec<_> = sink
        .alarms()
        .iter()
        .map(|a| (a.channel, a.transition, a.value))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (Channel::Smoke, AlarmTransition::Triggered, 430.0),
            (Channel::Smoke, AlarmTransition::Cleared, 379.0),
            (Channel::Smoke, AlarmTransition::Triggered, 450.0),
        ]
    );
    assert!(svc.is_alarm_active(Channel::Smoke));
    assert_eq!(svc.status(true), StatusState::Alarm);
}

#[test]
fn failed_gas_read_reuses_last_value_without_new_event() {
    let (mut svc, mut mount, mut sink) = make_service(unsmoothed());
    svc.sensors_mut().push(Channel::Smoke, Ok(900.0));
    svc.sensors_mut().push(Channel::Smoke, Err(SensorError::ReadFailed));
    svc.sensors_mut().push(Channel::Pressure, Err(SensorError::Timeout));

    svc.step(0, &mut mount, &mut sink);
    svc.step(SLOW_MS, &mut mount, &mut sink);

    assert_eq!(sink.alarms().len(), 1, "stale reuse must not re-trigger");
    assert!(svc.is_alarm_active(Channel::Smoke));
    assert_eq!(svc.live().value(Channel::Smoke), 900.0);
    // Other channels were still evaluated in the failing cycle.
    assert_eq!(svc.live().value(Channel::Eco2), 650.0);
    // Pressure recovered on the second cycle.
    assert_eq!(svc.live().value(Channel::Pressure), 15.0);
}

// ── Clog detection ───────────────────────────────────────────

#[test]
fn clog_fires_once_per_run() {
    let (mut svc, mut mount, mut sink) = make_service(StationConfig::default());
    // clog_min 400, hold 2.
    svc.sensors_mut().push_values(
        Channel::Lidar,
        &[300.0, 300.0, 300.0, 500.0, 300.0, 300.0],
    );

    svc.step(0, &mut mount, &mut sink);
    rescan(&mut svc, &mut mount, &mut sink, 1_000, 0);
    assert_eq!(sink.clogs(), 1);
    assert!(svc.is_clogged());

    rescan(&mut svc, &mut mount, &mut sink, 2_000, 1);
    assert_eq!(sink.clogs(), 1, "third low reading must not re-fire");

    rescan(&mut svc, &mut mount, &mut sink, 3_000, 2);
    assert!(!svc.is_clogged(), "a clear reading resets the run");

    rescan(&mut svc, &mut mount, &mut sink, 4_000, 3);
    rescan(&mut svc, &mut mount, &mut sink, 5_000, 4);
    assert_eq!(sink.clogs(), 2);
    assert_eq!(svc.status(true), StatusState::Alarm);
}

// ── Aim / rescan coalescing ──────────────────────────────────

#[test]
fn burst_of_aim_commands_yields_one_rescan() {
    let (mut svc, mut mount, mut sink) = make_service(StationConfig::default());
    let queue = CommandQueue::new();
    svc.step(0, &mut mount, &mut sink);
    assert_eq!(svc.sensors_mut().read_count(Channel::Lidar), 1);

    queue.send_aim(AimCommand::Nudge { dpan: 5, dtilt: 0 });
    queue.send_aim(AimCommand::Nudge { dpan: 5, dtilt: 0 });
    assert_eq!(svc.drain_commands(&queue, 1_000, &mut mount), 2);
    queue.send_aim(AimCommand::Absolute { pan: 120, tilt: 60 });
    svc.drain_commands(&queue, 1_090, &mut mount);

    // Re-armed by the last command: due at 1190, not 1100.
    assert!(svc.step(1_100, &mut mount, &mut sink).work.distance.is_none());
    let report = svc.step(1_190, &mut mount, &mut sink);
    assert_eq!(report.work.distance, Some(DistanceTrigger::Requested));
    svc.step(1_400, &mut mount, &mut sink);

    assert_eq!(svc.sensors_mut().read_count(Channel::Lidar), 2);
    assert_eq!(svc.aim(), Aim { pan: 120, tilt: 60 });
    assert_eq!(mount.moves.len(), 3);
}

#[test]
fn aim_to_current_position_does_not_rescan() {
    let (mut svc, mut mount, mut sink) = make_service(StationConfig::default());
    svc.step(0, &mut mount, &mut sink);
    svc.handle_command(
        StationCommand::Aim(AimCommand::Absolute { pan: 90, tilt: 90 }),
        1_000,
        &mut mount,
    );
    assert!(svc.scheduler().pending().is_none());
    assert!(mount.moves.is_empty());
}

// ── Uplink end-to-end ────────────────────────────────────────

#[test]
fn offline_alarm_is_buffered_and_flushed_on_reconnect() {
    let broker = Arc::new(MockBroker::new());
    let buffer = Arc::new(DeliveryBuffer::new(MemoryLogStore::new()));
    let uplink = Uplink::new(broker.clone(), buffer);
    let cfg = unsmoothed();

    let mut svc = StationService::new(cfg.clone(), SimulatedSensors::new(), 0);
    let mut mount = MockMount::default();
    let mut sink = (RecordingSink::default(), UplinkSink::new(uplink.clone(), &cfg));
    let mut monitor = LinkMonitor::new();

    svc.sensors_mut().push(Channel::Smoke, Ok(900.0));
    svc.step(0, &mut mount, &mut sink);
    assert_eq!(svc.status(uplink.is_connected()), StatusState::Alarm);
    assert_eq!(uplink.buffer().pending(), 1);
    assert!(broker.sent().is_empty());

    broker.set_connected(true);
    assert_eq!(
        uplink.poll_link(&mut monitor),
        Some(FlushReport::Drained { sent: 1 })
    );

    // Smoke is back to baseline by the heartbeat; the clear goes out live.
    svc.step(300_000, &mut mount, &mut sink);
    assert_eq!(
        broker.topics(),
        vec![
            "site/UNDEF/event/smoke".to_string(),
            "site/UNDEF/event/smoke".to_string(),
            "site/UNDEF/heartbeat".to_string(),
        ]
    );
    let sent = broker.sent();
    assert!(sent[0].1.contains("\"alarm\""));
    assert!(sent[1].1.contains("\"clear\""));
    assert_eq!(uplink.buffer().pending(), 0);
    assert_eq!(sink.0.heartbeats(), 1);
    assert_eq!(svc.status(true), StatusState::Normal);
}

#[test]
fn disconnected_without_alarm_shows_error() {
    let (mut svc, mut mount, mut sink) = make_service(StationConfig::default());
    svc.step(0, &mut mount, &mut sink);
    assert_eq!(svc.status(false), StatusState::Error);
    assert_eq!(svc.status(true), StatusState::Normal);
}

// ── Configuration updates ────────────────────────────────────

#[test]
fn staged_config_applies_at_step_boundary() {
    let broker = Arc::new(MockBroker::new());
    broker.set_connected(true);
    let uplink = Uplink::new(broker.clone(), Arc::new(DeliveryBuffer::new(MemoryLogStore::new())));
    let cfg = StationConfig::default();
    let mut svc = StationService::new(cfg.clone(), SimulatedSensors::new(), 0);
    let mut mount = MockMount::default();
    let mut sink = (RecordingSink::default(), UplinkSink::new(uplink, &cfg));

    svc.step(0, &mut mount, &mut sink);

    let mut next = unsmoothed();
    next.site_id.clear();
    next.site_id.push_str("pit-3").unwrap();
    svc.handle_command(StationCommand::UpdateConfig(Box::new(next)), 10, &mut mount);
    assert_eq!(svc.config().site_id.as_str(), "UNDEF", "not applied until the next step");

    svc.step(20, &mut mount, &mut sink);
    assert!(
        sink.0
            .events
            .iter()
            .any(|e| matches!(e, StationEvent::ConfigApplied(c) if c.site_id.as_str() == "pit-3"))
    );
    assert_eq!(svc.config().gas_window, 1);

    svc.sensors_mut().push(Channel::Smoke, Ok(900.0));
    svc.step(SLOW_MS, &mut mount, &mut sink);
    assert_eq!(broker.topics(), vec!["site/pit-3/event/smoke".to_string()]);
}
