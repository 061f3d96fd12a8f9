//! Thread bodies for the scan and network activities.
//!
//! ```text
//!   scan thread      drain commands → step → status → sleep to deadline
//!   network loop     WiFi poll → LinkMonitor → flush on reconnect or backlog → sleep
//!   status thread    drivers::status_led::StatusLed::run
//! ```
//!
//! Both loops sleep in bounded slices so aim commands and the stop flag are
//! noticed promptly.  Neither ever blocks indefinitely.

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::info;

use crate::adapters::time::MonotonicClock;
use crate::adapters::wifi::{WifiLink, WifiSupervisor};
use crate::aim::CommandQueue;
use crate::app::ports::{AimOutput, EventSink, LogStore, SensorSource};
use crate::app::service::StationService;
use crate::drivers::watchdog::Watchdog;
use crate::status::StatusIndicator;
use crate::uplink::{LinkMonitor, Uplink};

/// Longest scan-thread sleep; bounds aim command latency.
pub const SCAN_SLICE_MS: u64 = 50;
/// Network loop polling period.
pub const LINK_POLL_MS: u64 = 500;

/// One scan-thread iteration.  Returns how long to sleep.
pub fn scan_iteration<S, A, E>(
    service: &mut StationService<S>,
    commands: &CommandQueue,
    aim_out: &mut A,
    sink: &mut E,
    indicator: &StatusIndicator,
    connected: bool,
    now_ms: u64,
) -> Duration
where
    S: SensorSource,
    A: AimOutput,
    E: EventSink,
{
    service.drain_commands(commands, now_ms, aim_out);
    service.step(now_ms, aim_out, sink);
    indicator.set_state(service.status(connected));

    let until_due = service.next_deadline_ms().saturating_sub(now_ms);
    Duration::from_millis(until_due.min(SCAN_SLICE_MS))
}

/// Scan thread body.  Runs until `stop` is raised.
#[allow(clippy::too_many_arguments)]
pub fn run_scan<S, A, E, L>(
    mut service: StationService<S>,
    commands: &CommandQueue,
    mut aim_out: A,
    mut sink: E,
    indicator: &StatusIndicator,
    uplink: &Uplink<L>,
    clock: &MonotonicClock,
    stop: &AtomicBool,
) where
    S: SensorSource,
    A: AimOutput,
    E: EventSink,
    L: LogStore,
{
    let watchdog = Watchdog::subscribe("scan");
    service.start(&mut aim_out, &mut sink);
    while !stop.load(Ordering::Relaxed) {
        watchdog.feed();
        let sleep = scan_iteration(
            &mut service,
            commands,
            &mut aim_out,
            &mut sink,
            indicator,
            uplink.is_connected(),
            clock.now_ms(),
        );
        std::thread::sleep(sleep);
    }
    info!("Scan loop stopped");
}

/// Network loop body: keep WiFi up and flush the delivery buffer on each
/// reconnect edge, or while a backlog remains on a live link.  Flushes use
/// the QoS of the currently applied configuration.
pub fn run_network<L: LogStore, W: WifiLink>(
    uplink: &Uplink<L>,
    wifi: &mut WifiSupervisor<W>,
    clock: &MonotonicClock,
    stop: &AtomicBool,
) {
    let watchdog = Watchdog::subscribe("network");
    let mut monitor = LinkMonitor::new();
    while !stop.load(Ordering::Relaxed) {
        watchdog.feed();
        wifi.poll(clock.now_ms());
        if let Some(report) = uplink.poll_link(&mut monitor) {
            info!("Buffer flush: {:?}", report);
        }
        std::thread::sleep(Duration::from_millis(LINK_POLL_MS));
    }
}
