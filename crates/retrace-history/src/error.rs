#![forbid(unsafe_code)]

//! Error types for commands and the history manager.
//!
//! Two layers exist:
//!
//! - [`CommandError`] is raised by command bodies. The manager never
//!   inspects or suppresses it; it is handed back to the caller verbatim
//!   inside [`HistoryError::Command`].
//! - [`HistoryError`] is raised by [`HistoryManager`](crate::HistoryManager)
//!   itself. `Busy` and `TransactionAlreadyOpen` are expected, recoverable
//!   conditions; callers can avoid them by checking a
//!   [`HistorySnapshot`](crate::HistorySnapshot) first.

use std::error::Error as StdError;

use thiserror::Error;

use crate::snapshot::Activity;

/// Result of running a command body.
pub type CommandResult = Result<(), CommandError>;

/// Result of a history manager operation.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised while executing, undoing, or redoing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command did not override a required operation.
    ///
    /// Indicates a programming defect in a concrete command.
    #[error("`{operation}` is not implemented for command '{command}'")]
    NotImplemented {
        /// Description of the offending command.
        command: String,
        /// Name of the missing operation.
        operation: &'static str,
    },
    /// The command cannot run against the current external state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Generic failure with a message.
    #[error("{0}")]
    Other(String),
    /// Opaque failure from the command's own domain.
    #[error(transparent)]
    Source(#[from] Box<dyn StdError + Send + Sync>),
}

impl CommandError {
    /// Build a [`CommandError::NotImplemented`] for `operation` on `command`.
    #[must_use]
    pub fn not_implemented(command: impl Into<String>, operation: &'static str) -> Self {
        Self::NotImplemented {
            command: command.into(),
            operation,
        }
    }

    /// Wrap any error type as an opaque [`CommandError::Source`].
    pub fn source<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }

    /// Whether this is the [`CommandError::NotImplemented`] kind.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

/// Errors raised by the history manager.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// A top-level operation was attempted while another was in flight.
    #[error("history is busy ({0})")]
    Busy(Activity),
    /// `begin_transaction` was called while a transaction was open.
    #[error("transaction '{name}' is already open")]
    TransactionAlreadyOpen {
        /// Name of the transaction that is still open.
        name: String,
    },
    /// The command body failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl HistoryError {
    /// Whether this is the [`HistoryError::Busy`] kind.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// The command error carried by this error, if any.
    #[must_use]
    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(err) => Some(err),
            _ => None,
        }
    }
}
