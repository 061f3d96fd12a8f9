//! Store-and-forward delivery buffer.
//!
//! Messages that could not be published are appended to a durable log, one
//! record per line:
//!
//! ```text
//!   site/pit-3/event/smoke|{"state":"alarm","value":512.0,...}\n
//!   └──────── topic ─────┘ └──────────── payload ─────────────┘
//! ```
//!
//! The log is the single source of truth; nothing is cached in RAM.  On a
//! reconnect edge the network loop calls [`DeliveryBuffer::flush`]:
//!
//! 1. snapshot every record,
//! 2. publish them in order, stopping at the first failure,
//! 3. rewrite the log as `unsent remainder ++ records appended meanwhile`
//!    (write-new-then-replace), or remove it if nothing is left.
//!
//! If the rewrite fails the original log is untouched, so records may be
//! delivered twice but are never lost.  Delivery is at-least-once.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::app::ports::{LogStore, Publisher};
use crate::config::Qos;
use crate::error::StorageError;

/// Field separator between topic and payload.
pub const SEPARATOR: char = '|';

/// One buffered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedMessage {
    pub topic: String,
    pub payload: String,
}

impl BufferedMessage {
    /// Parse a stored line.  The first `|` separates topic from payload, so
    /// payloads may contain `|` themselves.
    pub fn parse(line: &str) -> Option<Self> {
        let (topic, payload) = line.split_once(SEPARATOR)?;
        if topic.is_empty() {
            return None;
        }
        Some(Self {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
        })
    }

    /// The stored line, without trailing newline.  `None` if the record
    /// cannot be represented losslessly.
    pub fn encode(topic: &str, payload: &str) -> Option<String> {
        if topic.is_empty()
            || topic.contains(SEPARATOR)
            || topic.contains('\n')
            || payload.contains('\n')
        {
            return None;
        }
        let mut line = String::with_capacity(topic.len() + 1 + payload.len());
        line.push_str(topic);
        line.push(SEPARATOR);
        line.push_str(payload);
        Some(line)
    }
}

/// Outcome of one [`DeliveryBuffer::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReport {
    /// The log was empty or absent.
    Empty,
    /// Every snapshotted record was published.
    Drained { sent: usize },
    /// Publishing stopped at the first failure.
    Partial { sent: usize, remaining: usize },
    /// Another flush is running; nothing was done.
    Busy,
    /// The log could not be read or rewritten.  `sent` records were
    /// published and may be delivered again.
    StorageFailed { sent: usize, error: StorageError },
}

/// Durable FIFO of unsent messages.
///
/// Appends may come from any thread.  Only one flush runs at a time; a
/// second concurrent caller gets [`FlushReport::Busy`].
pub struct DeliveryBuffer<S: LogStore> {
    store: Mutex<S>,
    flush_gate: Mutex<()>,
}

impl<S: LogStore> DeliveryBuffer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            flush_gate: Mutex::new(()),
        }
    }

    /// A panic elsewhere must not disable buffering; the store itself is
    /// always in a consistent state between calls.
    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one message.  Returns `false` if it was rejected or the
    /// append failed; the failure is logged and otherwise swallowed.
    pub fn enqueue(&self, topic: &str, payload: &str) -> bool {
        let Some(line) = BufferedMessage::encode(topic, payload) else {
            warn!("Buffer: rejecting record for '{}' (separator or newline)", topic);
            return false;
        };
        match self.lock_store().append_line(&line) {
            Ok(()) => true,
            Err(e) => {
                warn!("Buffer: append failed ({}), message for '{}' dropped", e, topic);
                false
            }
        }
    }

    /// Publish buffered records in FIFO order, stop at the first failure and
    /// persist whatever is left.
    pub fn flush(&self, publisher: &dyn Publisher, qos: Qos) -> FlushReport {
        let Ok(_gate) = self.flush_gate.try_lock() else {
            return FlushReport::Busy;
        };

        let snapshot = match self.lock_store().read_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Buffer: cannot read log ({})", e);
                return FlushReport::StorageFailed { sent: 0, error: e };
            }
        };
        if snapshot.is_empty() {
            return FlushReport::Empty;
        }

        // Publish without holding the store lock so appends are not blocked
        // behind a slow broker.
        let mut sent = 0;
        let mut stopped_at = None;
        for (i, line) in snapshot.iter().enumerate() {
            let Some(msg) = BufferedMessage::parse(line) else {
                warn!("Buffer: dropping malformed record {}", i);
                continue;
            };
            if publisher.publish(&msg.topic, &msg.payload, qos, false) {
                sent += 1;
            } else {
                stopped_at = Some(i);
                break;
            }
        }

        let mut store = self.lock_store();
        let current = match store.read_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Buffer: cannot re-read log after publishing ({})", e);
                return FlushReport::StorageFailed { sent, error: e };
            }
        };

        // Records appended while we were publishing sit after the snapshot.
        let appended = current.get(snapshot.len()..).unwrap_or_default();
        let mut keep: Vec<String> = match stopped_at {
            Some(i) => snapshot[i..].to_vec(),
            None => Vec::new(),
        };
        keep.extend_from_slice(appended);

        let result = if keep.is_empty() {
            store.remove()
        } else {
            store.replace(&keep)
        };
        drop(store);

        if let Err(e) = result {
            warn!("Buffer: rewrite failed ({}), original log kept", e);
            return FlushReport::StorageFailed { sent, error: e };
        }

        match stopped_at {
            None => {
                info!("Buffer: drained {} record(s)", sent);
                if appended.is_empty() {
                    FlushReport::Drained { sent }
                } else {
                    FlushReport::Partial {
                        sent,
                        remaining: appended.len(),
                    }
                }
            }
            Some(_) => {
                info!(
                    "Buffer: sent {} record(s), {} left after publish failure",
                    sent,
                    keep.len()
                );
                FlushReport::Partial {
                    sent,
                    remaining: keep.len(),
                }
            }
        }
    }

    /// Number of well-formed records waiting.  `0` if the log is unreadable.
    pub fn pending(&self) -> usize {
        self.snapshot().len()
    }

    /// Current contents in FIFO order.  Malformed lines are skipped.
    pub fn snapshot(&self) -> Vec<BufferedMessage> {
        match self.lock_store().read_lines() {
            Ok(lines) => lines.iter().filter_map(|l| BufferedMessage::parse(l)).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Run `f` against the backing store (diagnostics, tests).
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock_store())
    }
}

// ═══════════════════════════════════════════════════════════════
//  In-memory store
// ═══════════════════════════════════════════════════════════════

/// RAM-backed [`LogStore`] for host runs and tests.  Individual operations
/// can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    lines: Option<Vec<String>>,
    pub fail_append: bool,
    pub fail_read: bool,
    pub fail_replace: bool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lines, including malformed ones.  `None` if the log does not
    /// exist.
    pub fn lines(&self) -> Option<&[String]> {
        self.lines.as_deref()
    }
}

impl LogStore for MemoryLogStore {
    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        if self.fail_append {
            return Err(StorageError::WriteFailed);
        }
        self.lines.get_or_insert_with(Vec::new).push(line.to_owned());
        Ok(())
    }

    fn read_lines(&mut self) -> Result<Vec<String>, StorageError> {
        if self.fail_read {
            return Err(StorageError::ReadFailed);
        }
        Ok(self.lines.clone().unwrap_or_default())
    }

    fn replace(&mut self, lines: &[String]) -> Result<(), StorageError> {
        if self.fail_replace {
            return Err(StorageError::ReplaceFailed);
        }
        self.lines = Some(lines.to_vec());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.lines = None;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
