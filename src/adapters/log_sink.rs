//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every station event as a one-line
//! structured record to the logger (UART / USB-CDC in production).  Runs
//! alongside the [`UplinkSink`](crate::uplink::UplinkSink) so the serial
//! console shows everything the broker would have seen.

use log::{debug, info, warn};

use crate::alarm::AlarmTransition;
use crate::app::events::StationEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`StationEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &StationEvent) {
        match event {
            StationEvent::Alarm(e) => {
                let line = format!(
                    "ALARM | {} | {} | value={:.1} | limits=[{:.1}, {:.1}]",
                    e.channel,
                    e.transition.as_str(),
                    e.value,
                    e.threshold.min,
                    e.threshold.max,
                );
                if e.transition == AlarmTransition::Triggered {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
            StationEvent::Clog(e) => {
                warn!(
                    "CLOG | distance={:.0}mm | {} consecutive below {:.0}mm",
                    e.distance, e.consecutive, e.clog_min
                );
            }
            StationEvent::Heartbeat(hb) => {
                let r = &hb.readings;
                info!(
                    "HEARTBEAT | up={}s | lidar={:.0}mm smoke={:.0} eco2={:.0}ppm \
                     tvoc={:.0}ppb dp={:.1}Pa | aim=({}, {}) | clogged={} alarms={:?}",
                    hb.uptime_s,
                    r.lidar,
                    r.smoke,
                    r.eco2,
                    r.tvoc,
                    r.pressure,
                    r.x,
                    r.y,
                    r.clogged,
                    r.alarms.as_slice(),
                );
            }
            StationEvent::Debug(msg) => {
                debug!("DEBUG | {}", msg);
            }
            StationEvent::ConfigApplied(c) => {
                info!(
                    "CONFIG | site={} qos={} debug={} clog<{:.0}mm x{}",
                    c.site_id,
                    c.qos.level(),
                    c.debug_enable,
                    c.clog_min,
                    c.clog_hold
                );
            }
            StationEvent::Started(s) => {
                info!("START | aim=({}, {})", s.x, s.y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmEvent, ClogEvent};
    use crate::app::events::Heartbeat;
    use crate::config::{StationConfig, Threshold};
    use crate::sensors::Channel;
    use crate::telemetry::LiveReadings;

    #[test]
    fn every_event_kind_formats() {
        let mut sink = LogEventSink::new();
        let live = LiveReadings::new();
        let events = [
            StationEvent::Started(live.snapshot()),
            StationEvent::Alarm(AlarmEvent {
                channel: Channel::Smoke,
                transition: AlarmTransition::Triggered,
                value: 900.0,
                threshold: Threshold::new(0.0, 400.0),
            }),
            StationEvent::Clog(ClogEvent {
                distance: 300.0,
                consecutive: 2,
                clog_min: 400.0,
            }),
            StationEvent::Heartbeat(Heartbeat {
                uptime_s: 300,
                readings: live.snapshot(),
            }),
            StationEvent::Debug("scan done".into()),
            StationEvent::ConfigApplied(Box::new(StationConfig::default())),
        ];
        for e in &events {
            sink.emit(e);
        }
    }
}
