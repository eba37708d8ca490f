use crate::diff::{DEFAULT_MAX_DEPTH, DiffError, StateDiff, diff_values};
use crate::level::Severity;
use rollback_common::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub level: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<StateDiff>,
}

/// Append-only state journal with a minimum severity.
///
/// Accepted entries are kept in memory for observability consumers and
/// mirrored to `tracing` at the same level.
#[derive(Debug, Clone)]
pub struct StateLogger {
    min_level: Severity,
    max_depth: usize,
    entries: Vec<LogEntry>,
}

impl StateLogger {
    /// Create a logger recording `min_level` and above.
    pub fn new(min_level: Severity) -> Self {
        Self {
            min_level,
            max_depth: DEFAULT_MAX_DEPTH,
            entries: Vec::new(),
        }
    }

    /// Bound diff recursion at `max_depth` levels.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn min_level(&self) -> Severity {
        self.min_level
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether an entry at `level` would be recorded.
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.min_level
    }

    /// Record a message. Returns `false` when `level` is filtered out.
    pub fn log(&mut self, message: impl Into<String>, data: Option<Value>, level: Severity) -> bool {
        self.record(level, message.into(), data, None)
    }

    pub fn debug(&mut self, message: impl Into<String>) -> bool {
        self.log(message, None, Severity::Debug)
    }

    pub fn info(&mut self, message: impl Into<String>) -> bool {
        self.log(message, None, Severity::Info)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> bool {
        self.log(message, None, Severity::Warn)
    }

    pub fn error(&mut self, message: impl Into<String>) -> bool {
        self.log(message, None, Severity::Error)
    }

    /// Diff two serializable values and journal the result under `label`.
    ///
    /// Empty diffs are journaled at `debug`, non-empty ones at `info`. The
    /// diff is returned even when the journal filters it out.
    pub fn diff<A, B>(&mut self, old: &A, new: &B, label: &str) -> Result<StateDiff, DiffError>
    where
        A: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let old = serde_json::to_value(old)
            .map_err(|source| DiffError::Projection { side: "old", source })?;
        let new = serde_json::to_value(new)
            .map_err(|source| DiffError::Projection { side: "new", source })?;
        let diff = diff_values(&old, &new, self.max_depth);

        let (level, message) = if diff.is_empty() {
            (Severity::Debug, format!("{label}: no changes"))
        } else {
            (Severity::Info, format!("{label}: {} change(s)", diff.len()))
        };
        if self.enabled(level) {
            self.record(level, message, None, Some(diff.clone()));
        }
        Ok(diff)
    }

    /// Every recorded entry, oldest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Recorded entries at exactly `level`.
    pub fn entries_at(&self, level: Severity) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.level == level)
    }

    /// Take all recorded entries, leaving the journal empty.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(
        &mut self,
        level: Severity,
        message: String,
        data: Option<Value>,
        diff: Option<StateDiff>,
    ) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let changes = diff.as_ref().map_or(0, StateDiff::len);
        let detail = data.as_ref().map(Value::to_string).unwrap_or_default();
        match level {
            Severity::Debug => tracing::debug!(changes, detail = %detail, "{message}"),
            Severity::Info => tracing::info!(changes, detail = %detail, "{message}"),
            Severity::Warn => tracing::warn!(changes, detail = %detail, "{message}"),
            Severity::Error => tracing::error!(changes, detail = %detail, "{message}"),
        }
        self.entries.push(LogEntry {
            timestamp: Timestamp::now(),
            level,
            message,
            data,
            diff,
        });
        true
    }
}

impl Default for StateLogger {
    fn default() -> Self {
        Self::new(Severity::default())
    }
}
