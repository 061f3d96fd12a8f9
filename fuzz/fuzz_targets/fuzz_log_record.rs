//! Fuzz target: delivery-log record codec and flush
//!
//! Treats the input as raw log contents (as if read back from flash after
//! a power cut) and verifies:
//! - `BufferedMessage::parse` never panics on arbitrary lines
//! - any parsed record re-encodes to the line it came from
//! - a flush against a refusing broker keeps every line, in order
//!
//! cargo fuzz run fuzz_log_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitewatch::app::ports::{LogStore, Publisher};
use sitewatch::buffer::{BufferedMessage, DeliveryBuffer, FlushReport, MemoryLogStore};
use sitewatch::config::Qos;

struct Refusing;

impl Publisher for Refusing {
    fn publish(&self, _topic: &str, _payload: &str, _qos: Qos, _retain: bool) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let lines: Vec<String> = text
        .split('\n')
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();

    for line in &lines {
        if let Some(msg) = BufferedMessage::parse(line) {
            assert_eq!(
                BufferedMessage::encode(&msg.topic, &msg.payload).as_deref(),
                Some(line.as_str())
            );
        }
    }

    let mut store = MemoryLogStore::new();
    if store.replace(&lines).is_err() {
        return;
    }
    let buffer = DeliveryBuffer::new(store);
    let report = buffer.flush(&Refusing, Qos::AtMostOnce);
    if lines.is_empty() {
        assert_eq!(report, FlushReport::Empty);
        return;
    }

    // Malformed lines before the first good record are dropped; from the
    // first refused record on, the log must be unchanged.
    let first_good = lines.iter().position(|l| BufferedMessage::parse(l).is_some());
    let kept = buffer.with_store(|s| s.lines().map(<[String]>::to_vec));
    match first_good {
        Some(i) => assert_eq!(kept.as_deref(), Some(&lines[i..])),
        None => assert!(kept.is_none(), "all-malformed log is removed"),
    }
});
