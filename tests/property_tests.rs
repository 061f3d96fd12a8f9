//! Property tests for the core decision and delivery structures.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.

#![cfg(not(target_os = "espidf"))]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use sitewatch::alarm::{AlarmEngine, AlarmTransition, ClogDetector, GuardBands};
use sitewatch::app::ports::Publisher;
use sitewatch::buffer::{BufferedMessage, DeliveryBuffer, FlushReport, MemoryLogStore};
use sitewatch::config::{Qos, StationConfig, Threshold};
use sitewatch::filter::MovingAverage;
use sitewatch::scheduler::{DistanceTrigger, ScanScheduler};
use sitewatch::sensors::Channel;

// ── Alarm hysteresis ─────────────────────────────────────────

fn arb_threshold() -> impl Strategy<Value = Threshold> {
    (-1000.0f32..1000.0, 1.0f32..1000.0).prop_map(|(min, span)| Threshold::new(min, min + span))
}

proptest! {
    /// Edges strictly alternate, starting with a trigger, and each edge is
    /// justified by its guard band.
    #[test]
    fn alarm_edges_alternate(
        t in arb_threshold(),
        values in proptest::collection::vec(-2500.0f32..2500.0, 1..60),
    ) {
        let bands = GuardBands::new(t);
        let mut engine = AlarmEngine::new();
        let mut expect = AlarmTransition::Triggered;
        for v in values {
            if let Some(e) = engine.evaluate(Channel::Smoke, v, t) {
                prop_assert_eq!(e.transition, expect);
                match e.transition {
                    AlarmTransition::Triggered => prop_assert!(bands.triggers(v)),
                    AlarmTransition::Cleared => prop_assert!(bands.clears(v)),
                }
                expect = match expect {
                    AlarmTransition::Triggered => AlarmTransition::Cleared,
                    AlarmTransition::Cleared => AlarmTransition::Triggered,
                };
            }
            prop_assert_eq!(
                engine.is_active(Channel::Smoke),
                expect == AlarmTransition::Cleared
            );
        }
    }

    /// Values oscillating inside the hysteresis zone around `max` never
    /// produce an edge, whichever state the channel is in.
    #[test]
    fn no_chatter_inside_guard_zone(
        max in 10.0f32..1000.0,
        start_active in any::<bool>(),
        fractions in proptest::collection::vec(0.01f32..0.99, 1..60),
    ) {
        let t = Threshold::new(0.0, max);
        let bands = GuardBands::new(t);
        let mut engine = AlarmEngine::new();
        if start_active {
            prop_assert!(engine.evaluate(Channel::Tvoc, max * 2.0, t).is_some());
        }
        for f in fractions {
            let v = bands.off_high + (bands.on_high - bands.off_high) * f;
            prop_assert!(engine.evaluate(Channel::Tvoc, v, t).is_none());
        }
        prop_assert_eq!(engine.is_active(Channel::Tvoc), start_active);
    }
}

// ── Clog detection ───────────────────────────────────────────

/// Runs of consecutive below-threshold readings at least `hold` long.
fn qualifying_runs(readings: &[f32], clog_min: f32, hold: u32) -> usize {
    let mut runs = 0;
    let mut n = 0u32;
    for &r in readings {
        if r < clog_min {
            n += 1;
            if n == hold {
                runs += 1;
            }
        } else {
            n = 0;
        }
    }
    runs
}

proptest! {
    #[test]
    fn clog_fires_once_per_qualifying_run(
        hold in 1u32..6,
        readings in proptest::collection::vec(prop_oneof![Just(300.0f32), Just(500.0f32)], 0..80),
    ) {
        let mut det = ClogDetector::new(400.0, hold);
        let fired = readings.iter().filter(|&&r| det.update(r).is_some()).count();
        prop_assert_eq!(fired, qualifying_runs(&readings, 400.0, hold));
        let tail_low = readings.iter().rev().take_while(|&&r| r < 400.0).count() as u32;
        prop_assert_eq!(det.is_clogged(), tail_low >= hold);
    }
}

// ── Moving average ───────────────────────────────────────────

proptest! {
    #[test]
    fn moving_average_is_mean_of_window(
        cap in 1usize..=16,
        values in proptest::collection::vec(-1000.0f32..1000.0, 1..50),
    ) {
        let mut f = MovingAverage::new(cap);
        for &v in &values {
            f.add(v);
        }
        let tail = &values[values.len().saturating_sub(cap)..];
        let mean = tail.iter().sum::<f32>() / tail.len() as f32;
        prop_assert!((f.average() - mean).abs() < 0.05, "{} vs {}", f.average(), mean);
        prop_assert_eq!(f.len(), tail.len());
    }
}

// ── Delivery buffer ──────────────────────────────────────────

/// Accepts `budget` publishes, then refuses everything.
struct Budgeted {
    budget: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl Publisher for Budgeted {
    fn publish(&self, _topic: &str, payload: &str, _qos: Qos, _retain: bool) -> bool {
        if self.budget.load(Ordering::SeqCst) == 0 {
            return false;
        }
        self.budget.fetch_sub(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(payload.to_owned());
        true
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn arb_topic() -> impl Strategy<Value = String> {
    "[a-z0-9/_-]{1,40}"
}

fn arb_payload() -> impl Strategy<Value = String> {
    "[ -~]{0,80}"
}

proptest! {
    /// A stored record reads back exactly, whatever the payload contains
    /// (including further separators).
    #[test]
    fn record_line_round_trips(topic in arb_topic(), payload in arb_payload()) {
        let line = BufferedMessage::encode(&topic, &payload).unwrap();
        let msg = BufferedMessage::parse(&line).unwrap();
        prop_assert_eq!(msg.topic, topic);
        prop_assert_eq!(msg.payload, payload);
    }

    /// Flush publishes a FIFO prefix and keeps exactly the rest, failed
    /// record first.
    #[test]
    fn flush_stops_at_first_failure(
        payloads in proptest::collection::vec(arb_payload(), 1..20),
        budget in 0usize..25,
    ) {
        let buffer = DeliveryBuffer::new(MemoryLogStore::new());
        for p in &payloads {
            prop_assert!(buffer.enqueue("site/A/event/smoke", p));
        }
        let publisher = Budgeted {
            budget: AtomicUsize::new(budget),
            sent: Mutex::new(Vec::new()),
        };

        let report = buffer.flush(&publisher, Qos::AtMostOnce);
        let sent = budget.min(payloads.len());
        if sent == payloads.len() {
            prop_assert_eq!(report, FlushReport::Drained { sent });
        } else {
            prop_assert_eq!(report, FlushReport::Partial { sent, remaining: payloads.len() - sent });
        }
        prop_assert_eq!(&*publisher.sent.lock().unwrap(), &payloads[..sent]);
        let left: Vec<String> = buffer.snapshot().into_iter().map(|m| m.payload).collect();
        prop_assert_eq!(&left[..], &payloads[sent..]);
    }
}

// ── Scan scheduling ──────────────────────────────────────────

proptest! {
    /// Any burst of aim changes yields exactly one requested read, due one
    /// settle delay after the last change.
    #[test]
    fn rescans_coalesce(gaps in proptest::collection::vec(0u64..90, 1..10)) {
        let cfg = StationConfig::default();
        let settle = u64::from(cfg.settle_ms);
        let mut sched = ScanScheduler::new(&cfg, 0);
        sched.poll(0);
        sched.distance_done();

        let mut t = 1_000;
        for g in &gaps {
            t += g;
            sched.request_scan(t);
        }
        let last = t;

        let mut requested = 0;
        let mut fired_at = None;
        for now in (1_000..=last + settle + 500).step_by(5) {
            let work = sched.poll(now);
            if work.distance == Some(DistanceTrigger::Requested) {
                requested += 1;
                fired_at.get_or_insert(now);
                sched.distance_done();
            }
        }
        prop_assert_eq!(requested, 1);
        let fired_at = fired_at.unwrap();
        prop_assert!(fired_at >= last + settle && fired_at < last + settle + 5);
    }
}
