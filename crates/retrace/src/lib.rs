#![forbid(unsafe_code)]

//! Retrace public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports the history types from `retrace-history`, adds
//! [`EditSession`] to tie a history to the collaborators its commands need,
//! and offers a lightweight prelude for day-to-day usage.

pub mod session;

#[cfg(feature = "logging")]
pub mod logging;

// --- History re-exports ----------------------------------------------------

pub use retrace_history::{
    Activity, ChangeHook, Command, CommandError, CommandInfo, CommandMetadata, CommandResult,
    CompositeCommand, DEFAULT_TRANSACTION_NAME, FailurePolicy, FnCommand, HistoryConfig,
    HistoryError, HistoryManager, HistoryResult, HistorySnapshot, SetValueCmd, async_trait,
};

pub use session::EditSession;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Command, CommandError, CommandMetadata, CommandResult, CompositeCommand, EditSession,
        FnCommand, HistoryConfig, HistoryError, HistoryManager, HistoryResult, HistorySnapshot,
        SetValueCmd, async_trait,
    };

    pub use crate::history;
}

pub use retrace_history as history;
