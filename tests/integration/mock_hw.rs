//! Mock adapters for integration tests.
//!
//! Record every outbound call so tests can assert on the full history
//! without a broker, servos or flash.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sitewatch::aim::Aim;
use sitewatch::app::events::StationEvent;
use sitewatch::app::ports::{AimOutput, EventSink, Publisher};
use sitewatch::config::Qos;

// ── MockBroker ────────────────────────────────────────────────

/// Publisher with a switchable link and an optional publish budget.
pub struct MockBroker {
    connected: AtomicBool,
    /// Publishes accepted before the broker starts refusing.  `usize::MAX`
    /// (set by `new`) means unlimited.
    budget: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            budget: AtomicUsize::new(usize::MAX),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }

    /// Accept `n` more publishes, then refuse.
    pub fn refuse_after(&self, n: usize) {
        self.budget.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.sent().into_iter().map(|(t, _)| t).collect()
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for MockBroker {
    fn publish(&self, topic: &str, payload: &str, _qos: Qos, _retain: bool) -> bool {
        if !self.is_connected() {
            return false;
        }
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return false;
        }
        if left != usize::MAX {
            self.budget.store(left - 1, Ordering::SeqCst);
        }
        self.sent
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ── MockMount ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockMount {
    pub moves: Vec<Aim>,
}

impl AimOutput for MockMount {
    fn point(&mut self, aim: Aim) {
        self.moves.push(aim);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<StationEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn alarms(&self) -> Vec<sitewatch::alarm::AlarmEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StationEvent::Alarm(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn clogs(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StationEvent::Clog(_)))
            .count()
    }

    pub fn heartbeats(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StationEvent::Heartbeat(_)))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &StationEvent) {
        self.events.push(event.clone());
    }
}
