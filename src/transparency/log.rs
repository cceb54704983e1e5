//! Rolling in-memory debug log.
//!
//! Every reading a sensor publishes and every dispatch failure is written
//! here, so a user can see what left the device. The log holds a bounded
//! number of lines, newest first; the oldest line is evicted once the
//! capacity is reached.

use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Most lines the log ever holds.
pub const MAX_DEBUG_LINES: usize = 100;

/// A display that mirrors the log, e.g. a console pane.
pub trait DebugSink: Send + Sync {
    /// Called with each newly logged line.
    fn show(&self, line: &str);
}

/// Bounded, newest-first debug log.
pub struct DebugLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    /// Held weakly so the log never keeps a closed display alive
    sink: Mutex<Option<Weak<dyn DebugSink>>>,
}

impl DebugLog {
    /// Create a log holding [`MAX_DEBUG_LINES`] lines.
    pub fn new() -> Self {
        Self::with_capacity(MAX_DEBUG_LINES)
    }

    /// Create a log holding at most `capacity` lines, clamped to
    /// `1..=MAX_DEBUG_LINES`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_DEBUG_LINES);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sink: Mutex::new(None),
        }
    }

    /// Append a line. Embedded newlines in `message` are removed.
    pub fn log(&self, tag: &str, message: &str) {
        let message: String = message.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let line = format!("[{}] {}: {}", Local::now().format("%H:%M:%S"), tag, message);

        tracing::debug!(target: "sensorium::debug_log", "{}: {}", tag, message);

        {
            let mut lines = self.lines();
            if lines.len() >= self.capacity {
                lines.pop_back();
            }
            lines.push_front(line.clone());
        }

        if let Some(sink) = self.current_sink() {
            sink.show(&line);
        }
    }

    /// Attach a display. Replaces any previous one.
    pub fn set_sink(&self, sink: &Arc<dyn DebugSink>) {
        *self.sink_slot() = Some(Arc::downgrade(sink));
    }

    /// Detach the display.
    pub fn clear_sink(&self) {
        *self.sink_slot() = None;
    }

    /// Snapshot of the buffered lines, newest first.
    pub fn lines_snapshot(&self) -> Vec<String> {
        self.lines().iter().cloned().collect()
    }

    /// The buffered lines joined with newlines, newest first.
    pub fn render(&self) -> String {
        self.lines_snapshot().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all buffered lines.
    pub fn clear(&self) {
        self.lines().clear();
    }

    fn lines(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink_slot(&self) -> MutexGuard<'_, Option<Weak<dyn DebugSink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_sink(&self) -> Option<Arc<dyn DebugSink>> {
        let mut slot = self.sink_slot();
        let sink = slot.as_ref().and_then(Weak::upgrade);
        if sink.is_none() {
            // The display went away; forget it.
            *slot = None;
        }
        sink
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DebugLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugLog")
            .field("lines", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Thread-safe shared debug log.
pub type SharedDebugLog = Arc<DebugLog>;

/// Create a new shared debug log with the default capacity.
pub fn create_shared_log() -> SharedDebugLog {
    Arc::new(DebugLog::new())
}

/// Create a new shared debug log with a custom capacity.
pub fn create_shared_log_with_capacity(capacity: usize) -> SharedDebugLog {
    Arc::new(DebugLog::with_capacity(capacity))
}
