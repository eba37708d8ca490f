//! State logging: a severity-filtered journal plus structural diffs between state values.
//!
//! # Invariants
//! - The journal is append-only; entries below the minimum severity are never recorded.
//! - `diff(a, a)` is empty.
//! - Diff recursion is bounded by depth; deeper differences are reported as
//!   truncated paths.

pub mod diff;
pub mod level;
pub mod logger;

pub use diff::{Change, DiffError, StateDiff, diff_values};
pub use level::{ParseSeverityError, Severity};
pub use logger::{LogEntry, StateLogger};
