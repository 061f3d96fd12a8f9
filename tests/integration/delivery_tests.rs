//! Integration tests for the durable delivery path: Uplink → DeliveryBuffer
//! → FileLogStore on a real filesystem.

use std::fs;
use std::sync::Arc;

use sitewatch::adapters::file_log::FileLogStore;
use sitewatch::buffer::{DeliveryBuffer, FlushReport};
use sitewatch::config::Qos;
use sitewatch::uplink::{LinkMonitor, SendOutcome, Uplink};

use crate::mock_hw::MockBroker;

fn file_uplink(path: &std::path::Path, broker: &Arc<MockBroker>) -> Uplink<FileLogStore> {
    let buffer = Arc::new(DeliveryBuffer::new(FileLogStore::new(path)));
    Uplink::new(broker.clone(), buffer)
}

#[test]
fn buffered_records_survive_restart_and_flush_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());

    {
        let uplink = file_uplink(&path, &broker);
        for i in 0..3 {
            let outcome = uplink.send("site/A/event/smoke", &format!("{{\"n\":{i}}}"), Qos::AtMostOnce);
            assert_eq!(outcome, SendOutcome::Buffered);
        }
    }
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);

    // "Reboot": a fresh buffer over the same file.
    let uplink = file_uplink(&path, &broker);
    assert_eq!(uplink.buffer().pending(), 3);

    broker.set_connected(true);
    let mut monitor = LinkMonitor::new();
    assert_eq!(
        uplink.poll_link(&mut monitor),
        Some(FlushReport::Drained { sent: 3 })
    );
    let payloads: Vec<_> = broker.sent().into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, ["{\"n\":0}", "{\"n\":1}", "{\"n\":2}"]);
    assert!(!path.exists(), "a drained log is removed");
}

#[test]
fn publish_failure_keeps_failed_record_and_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    let uplink = file_uplink(&path, &broker);

    for t in ["site/A/event/smoke", "site/A/event/eco2", "site/A/event/tvoc", "site/A/clog"] {
        uplink.send(t, "{}", Qos::AtMostOnce);
    }

    broker.set_connected(true);
    broker.refuse_after(1);
    assert_eq!(
        uplink.buffer().flush(broker.as_ref(), Qos::AtMostOnce),
        FlushReport::Partial { sent: 1, remaining: 3 }
    );
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "site/A/event/eco2|{}\nsite/A/event/tvoc|{}\nsite/A/clog|{}\n"
    );
    // No temp file is left behind by the rewrite.
    assert!(!dir.path().join("buffer.log.tmp").exists());

    broker.refuse_after(usize::MAX);
    assert_eq!(
        uplink.buffer().flush(broker.as_ref(), Qos::AtMostOnce),
        FlushReport::Drained { sent: 3 }
    );
    assert_eq!(
        broker.topics(),
        ["site/A/event/smoke", "site/A/event/eco2", "site/A/event/tvoc", "site/A/clog"]
    );
}

#[test]
fn live_publish_skips_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    broker.set_connected(true);
    let uplink = file_uplink(&path, &broker);

    assert_eq!(
        uplink.send("site/A/heartbeat", "{}", Qos::AtLeastOnce),
        SendOutcome::Published
    );
    assert!(!path.exists());
}

#[test]
fn refused_publish_while_connected_is_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    broker.set_connected(true);
    broker.refuse_after(0);
    let uplink = file_uplink(&path, &broker);

    assert_eq!(
        uplink.send("site/A/event/tvoc", "{\"state\":\"alarm\"}", Qos::AtMostOnce),
        SendOutcome::Buffered
    );
    assert_eq!(uplink.buffer().pending(), 1);
}

#[test]
fn unwritable_log_drops_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directory does not exist, so every append fails to open.
    let path = dir.path().join("missing").join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    let uplink = file_uplink(&path, &broker);

    assert_eq!(
        uplink.send("site/A/event/smoke", "{}", Qos::AtMostOnce),
        SendOutcome::Dropped
    );
    assert_eq!(uplink.buffer().pending(), 0);
}

#[test]
fn live_sends_queue_behind_pending_backlog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    let uplink = file_uplink(&path, &broker);

    uplink.send("site/A/event/smoke", "{\"n\":0}", Qos::AtMostOnce);
    uplink.send("site/A/event/eco2", "{\"n\":1}", Qos::AtMostOnce);

    // Link is back but the network loop has not flushed yet.
    broker.set_connected(true);
    assert_eq!(
        uplink.send("site/A/clog", "{\"n\":2}", Qos::AtMostOnce),
        SendOutcome::Buffered
    );
    assert!(broker.sent().is_empty());

    let mut monitor = LinkMonitor::new();
    assert_eq!(
        uplink.poll_link(&mut monitor),
        Some(FlushReport::Drained { sent: 3 })
    );
    assert_eq!(
        uplink.send("site/A/event/tvoc", "{\"n\":3}", Qos::AtMostOnce),
        SendOutcome::Published
    );

    assert_eq!(
        broker.topics(),
        ["site/A/event/smoke", "site/A/event/eco2", "site/A/clog", "site/A/event/tvoc"]
    );
    assert!(!path.exists());
}

#[test]
fn refusal_on_live_link_is_flushed_on_next_tick_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buffer.log");
    let broker = Arc::new(MockBroker::new());
    broker.set_connected(true);
    let uplink = file_uplink(&path, &broker);
    let mut monitor = LinkMonitor::new();
    assert_eq!(uplink.poll_link(&mut monitor), Some(FlushReport::Empty));

    broker.refuse_after(0);
    assert_eq!(uplink.send("site/A/event/smoke", "A", Qos::AtMostOnce), SendOutcome::Buffered);
    broker.refuse_after(usize::MAX);
    assert_eq!(uplink.send("site/A/event/smoke", "B", Qos::AtMostOnce), SendOutcome::Buffered);

    // No link edge happened; the backlog alone triggers the flush.
    assert_eq!(
        uplink.poll_link(&mut monitor),
        Some(FlushReport::Drained { sent: 2 })
    );
    let payloads: Vec<_> = broker.sent().into_iter().map(|(_, p)| p).collect();
    assert_eq!(payloads, ["A", "B"]);
    assert_eq!(uplink.poll_link(&mut monitor), None);
}
