//! Append-only operator log.
//!
//! Every pipeline stage records its lifecycle milestones through
//! [`EventLog::append`].  Entries are never removed, reordered, or
//! deduplicated; the timestamp is assigned at append time.
//!
//! The log is shared: clone it cheaply and all clones see the same entries.
//! Presentation layers can either poll [`EventLog::entries`] or stream new
//! entries as they arrive via [`EventLog::subscribe`], which is backed by a
//! [`tokio::sync::broadcast`] channel.  Each entry is also mirrored to
//! `tracing` so it shows up in structured process logs.

use std::sync::{Arc, Mutex, PoisonError};

use physician_types::{LogEntry, LogLevel};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Default number of entries buffered for slow live subscribers.
const DEFAULT_CAPACITY: usize = 256;

/// Shared append-only sequence of [`LogEntry`] records.
#[derive(Clone, Debug)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    sender: broadcast::Sender<LogEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventLog {
    /// Create an empty log whose live channel buffers `capacity` entries
    /// (at least one).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }

    /// Record `message` at `level` and return the stored entry.
    pub fn append(&self, message: impl Into<String>, level: LogLevel) -> LogEntry {
        // Stamp and broadcast under the lock so live order, storage order and
        // timestamp order all agree.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Info => info!(target: "physician::log", "{}", entry.message),
            LogLevel::Warn => warn!(target: "physician::log", "{}", entry.message),
            LogLevel::Crit => error!(target: "physician::log", "{}", entry.message),
            LogLevel::Sys => debug!(target: "physician::log", "{}", entry.message),
        }
        entries.push(entry.clone());
        // No subscribers is a normal condition.
        let _ = self.sender.send(entry.clone());
        entry
    }

    /// Snapshot of every entry in insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries recorded at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    /// Receive every entry appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}
