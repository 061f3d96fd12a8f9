//! Uplink: publish-or-buffer, reconnect detection and the event encoder.
//!
//! ```text
//!   StationEvent ──▶ UplinkSink ──encode──▶ Uplink::send ──▶ Publisher
//!                                                │ refused / offline / backlog
//!                                                ▼
//!                                          DeliveryBuffer
//!
//!   network loop: LinkMonitor(false → true) ──▶ DeliveryBuffer::flush
//!                 backlog while connected   ──▶ DeliveryBuffer::flush
//! ```
//!
//! Alarm and clog events are durable: if they cannot be published they are
//! buffered.  Heartbeats and debug lines are volatile and simply dropped
//! while offline, since a stale one is worthless on arrival.
//!
//! While the buffer holds a backlog, durable messages queue behind it
//! instead of going out live, so the broker sees them in enqueue order.
//! A publish refused on a connected link leaves a backlog that the next
//! network-loop tick retries.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;

use crate::alarm::{AlarmEvent, ClogEvent};
use crate::app::events::{Heartbeat, StationEvent};
use crate::app::ports::{EventSink, LogStore, Publisher, WallClock};
use crate::buffer::{DeliveryBuffer, FlushReport};
use crate::config::{Qos, SITE_ID_MAX, StationConfig};
use crate::error::{CommsError, Result};
use crate::topics;

// ═══════════════════════════════════════════════════════════════
//  Publish-or-buffer
// ═══════════════════════════════════════════════════════════════

/// What happened to one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Published,
    Buffered,
    Dropped,
}

/// Publisher plus the buffer that catches what it refuses.  Cheap to clone;
/// clones share the publisher, the buffer, the backlog flag and the flush
/// QoS.
pub struct Uplink<S: LogStore> {
    publisher: Arc<dyn Publisher>,
    buffer: Arc<DeliveryBuffer<S>>,
    /// `true` while the buffer holds records a flush still owes the broker.
    /// Held across the live-or-buffer decision in [`Uplink::send`].
    backlog: Arc<Mutex<bool>>,
    /// QoS level used for flushes; follows the applied configuration.
    flush_qos: Arc<AtomicU8>,
}

impl<S: LogStore> Clone for Uplink<S> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
            buffer: Arc::clone(&self.buffer),
            backlog: Arc::clone(&self.backlog),
            flush_qos: Arc::clone(&self.flush_qos),
        }
    }
}

impl<S: LogStore> Uplink<S> {
    /// Records already in `buffer` (left over from before a reboot) count
    /// as backlog.
    pub fn new(publisher: Arc<dyn Publisher>, buffer: Arc<DeliveryBuffer<S>>) -> Self {
        let backlog = buffer.pending() > 0;
        Self {
            publisher,
            buffer,
            backlog: Arc::new(Mutex::new(backlog)),
            flush_qos: Arc::new(AtomicU8::new(Qos::default().level())),
        }
    }

    fn lock_backlog(&self) -> MutexGuard<'_, bool> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish directly.
    pub fn try_publish(&self, topic: &str, payload: &str, qos: Qos, retain: bool) -> Result<()> {
        if !self.publisher.is_connected() {
            return Err(CommsError::NotConnected.into());
        }
        if !self.publisher.publish(topic, payload, qos, retain) {
            return Err(CommsError::PublishFailed.into());
        }
        Ok(())
    }

    /// Publish, falling back to the delivery buffer.  Queues behind an
    /// existing backlog instead of overtaking it.
    pub fn send(&self, topic: &str, payload: &str, qos: Qos) -> SendOutcome {
        let mut backlog = self.lock_backlog();
        if *backlog {
            debug!("Uplink: backlog pending, queueing '{}'", topic);
            return self.buffer_locked(&mut backlog, topic, payload);
        }
        match self.try_publish(topic, payload, qos, false) {
            Ok(()) => SendOutcome::Published,
            Err(e) => {
                debug!("Uplink: {} for '{}', buffering", e, topic);
                self.buffer_locked(&mut backlog, topic, payload)
            }
        }
    }

    fn buffer_locked(&self, backlog: &mut bool, topic: &str, payload: &str) -> SendOutcome {
        if self.buffer.enqueue(topic, payload) {
            *backlog = true;
            SendOutcome::Buffered
        } else {
            SendOutcome::Dropped
        }
    }

    /// Publish if possible, otherwise drop.
    pub fn send_volatile(&self, topic: &str, payload: &str, qos: Qos) -> SendOutcome {
        match self.try_publish(topic, payload, qos, false) {
            Ok(()) => SendOutcome::Published,
            Err(_) => SendOutcome::Dropped,
        }
    }

    /// Feed the current link state to `monitor` and flush when a flush is
    /// owed: once on every reconnect edge, and on any tick where the link
    /// is up and a backlog remains (a publish was refused while connected,
    /// or the last flush stopped short).
    pub fn poll_link(&self, monitor: &mut LinkMonitor) -> Option<FlushReport> {
        let connected = self.publisher.is_connected();
        let edge = monitor.observe(connected);
        match edge {
            LinkEdge::Up => {
                info!("Uplink: link up, flushing {} buffered record(s)", self.buffer.pending());
            }
            LinkEdge::Down => {
                warn!("Uplink: link down, buffering");
                return None;
            }
            LinkEdge::None => {
                if !connected || !self.has_backlog() {
                    return None;
                }
                debug!("Uplink: retrying backlog on a connected link");
            }
        }

        let report = self.buffer.flush(self.publisher.as_ref(), self.flush_qos());
        let mut backlog = self.lock_backlog();
        *backlog = self.buffer.pending() > 0;
        Some(report)
    }

    /// QoS for subsequent flushes.
    pub fn set_flush_qos(&self, qos: Qos) {
        self.flush_qos.store(qos.level(), Ordering::Relaxed);
    }

    pub fn flush_qos(&self) -> Qos {
        Qos::from_level(self.flush_qos.load(Ordering::Relaxed))
    }

    /// Buffered records are waiting to be flushed.
    pub fn has_backlog(&self) -> bool {
        *self.lock_backlog()
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    pub fn buffer(&self) -> &DeliveryBuffer<S> {
        &self.buffer
    }
}

// ═══════════════════════════════════════════════════════════════
//  Link edge detection
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEdge {
    None,
    Up,
    Down,
}

/// Turns sampled connectivity into edges.  Starts disconnected, so a link
/// that is already up at the first observation counts as a reconnect.
#[derive(Debug, Default)]
pub struct LinkMonitor {
    connected: bool,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, connected: bool) -> LinkEdge {
        let edge = match (self.connected, connected) {
            (false, true) => LinkEdge::Up,
            (true, false) => LinkEdge::Down,
            _ => LinkEdge::None,
        };
        self.connected = connected;
        edge
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

// ═══════════════════════════════════════════════════════════════
//  Event encoder
// ═══════════════════════════════════════════════════════════════

/// Epoch seconds at encode time, omitted until the wall clock is synced.
type Stamp = Option<u64>;

#[derive(Serialize)]
struct AlarmPayload {
    state: &'static str,
    value: f32,
    min: f32,
    max: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Stamp,
}

impl AlarmPayload {
    fn new(e: &AlarmEvent, ts: Stamp) -> Self {
        Self {
            state: e.transition.as_str(),
            value: e.value,
            min: e.threshold.min,
            max: e.threshold.max,
            ts,
        }
    }
}

#[derive(Serialize)]
struct ClogPayload {
    state: &'static str,
    distance: f32,
    consecutive: u32,
    clog_min: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Stamp,
}

impl ClogPayload {
    fn new(e: &ClogEvent, ts: Stamp) -> Self {
        Self {
            state: "clog",
            distance: e.distance,
            consecutive: e.consecutive,
            clog_min: e.clog_min,
            ts,
        }
    }
}

#[derive(Serialize)]
struct HeartbeatPayload<'a> {
    #[serde(flatten)]
    heartbeat: &'a Heartbeat,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Stamp,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|_| CommsError::EncodeFailed.into())
}

/// [`EventSink`] that encodes station events and sends them upstream.
///
/// Tracks the parts of the configuration it needs (site id, QoS, debug
/// flag) through [`StationEvent::ConfigApplied`], and hands the QoS on to
/// the uplink so reconnect flushes follow it too.
pub struct UplinkSink<S: LogStore> {
    uplink: Uplink<S>,
    site_id: heapless::String<SITE_ID_MAX>,
    qos: Qos,
    debug_enable: bool,
    wall_clock: Option<Arc<dyn WallClock>>,
}

impl<S: LogStore> UplinkSink<S> {
    pub fn new(uplink: Uplink<S>, config: &StationConfig) -> Self {
        let mut sink = Self {
            uplink,
            site_id: heapless::String::new(),
            qos: Qos::default(),
            debug_enable: false,
            wall_clock: None,
        };
        sink.apply_config(config);
        sink
    }

    /// Stamp payloads with calendar time from `clock` once it is synced.
    pub fn with_wall_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = Some(clock);
        self
    }

    fn apply_config(&mut self, config: &StationConfig) {
        self.site_id.clone_from(&config.site_id);
        self.qos = config.qos;
        self.debug_enable = config.debug_enable;
        self.uplink.set_flush_qos(config.qos);
    }

    fn stamp(&self) -> Stamp {
        self.wall_clock.as_ref().and_then(|c| c.now_epoch_secs())
    }

    /// Encode and send one event.  `Ok(None)` if the event is not published.
    pub fn deliver(&mut self, event: &StationEvent) -> Result<Option<SendOutcome>> {
        let site = self.site_id.as_str();
        let outcome = match event {
            StationEvent::Alarm(e) => {
                let topic = topics::event(site, e.channel)?;
                let payload = to_json(&AlarmPayload::new(e, self.stamp()))?;
                self.uplink.send(&topic, &payload, self.qos)
            }
            StationEvent::Clog(e) => {
                let topic = topics::clog(site)?;
                let payload = to_json(&ClogPayload::new(e, self.stamp()))?;
                self.uplink.send(&topic, &payload, self.qos)
            }
            StationEvent::Heartbeat(hb) => {
                let topic = topics::heartbeat(site)?;
                let payload = to_json(&HeartbeatPayload {
                    heartbeat: hb,
                    ts: self.stamp(),
                })?;
                self.uplink.send_volatile(&topic, &payload, self.qos)
            }
            StationEvent::Debug(msg) => {
                if !self.debug_enable {
                    return Ok(None);
                }
                let topic = topics::debug(site)?;
                self.uplink.send_volatile(&topic, msg, self.qos)
            }
            StationEvent::ConfigApplied(config) => {
                self.apply_config(config);
                return Ok(None);
            }
            StationEvent::Started(_) => return Ok(None),
        };
        Ok(Some(outcome))
    }
}

impl<S: LogStore> EventSink for UplinkSink<S> {
    fn emit(&mut self, event: &StationEvent) {
        if let Err(e) = self.deliver(event) {
            warn!("Uplink: cannot deliver event ({})", e);
        }
    }
}
