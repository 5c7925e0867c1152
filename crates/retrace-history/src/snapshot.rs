#![forbid(unsafe_code)]

//! Read-only projections of history state for observers.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// What the history manager is doing right now.
///
/// Every busy activity is entered only from [`Activity::Idle`] and always
/// returns to it, whether the command body succeeds or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "snake_case"))]
pub enum Activity {
    /// No top-level operation in flight.
    #[default]
    Idle,
    /// Running a command's `execute`.
    Executing,
    /// Running a command's `undo`.
    Undoing,
    /// Running a command's `redo`.
    Redoing,
    /// Undoing the buffer of an open transaction.
    RollingBack,
}

impl Activity {
    /// Whether a top-level operation is in flight.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Stable lowercase name, used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Executing => "executing",
            Self::Undoing => "undoing",
            Self::Redoing => "redoing",
            Self::RollingBack => "rolling back",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a [`HistoryManager`](crate::HistoryManager).
///
/// Published through the change hook after every mutating transition, and
/// available on demand via [`HistoryManager::snapshot`](crate::HistoryManager::snapshot).
/// Typical use is enabling or disabling undo/redo affordances in a UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HistorySnapshot {
    /// Entries on the undo stack.
    pub undo_count: usize,
    /// Entries on the redo stack.
    pub redo_count: usize,
    /// `undo_count > 0`.
    pub can_undo: bool,
    /// `redo_count > 0`.
    pub can_redo: bool,
    /// A top-level operation is in flight.
    pub busy: bool,
    /// A command body is currently running.
    pub applying: bool,
    /// The in-flight activity ([`Activity::Idle`] when not busy).
    pub activity: Activity,
    /// Name of the open transaction, if any.
    pub transaction_name: Option<String>,
    /// Message of the most recent failure, cleared when the next operation starts.
    pub last_error: Option<String>,
}

/// Subscriber invoked with a fresh snapshot after each mutating transition.
pub type ChangeHook = Box<dyn Fn(&HistorySnapshot) + Send + Sync>;
