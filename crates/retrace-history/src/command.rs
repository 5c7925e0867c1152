#![forbid(unsafe_code)]

//! The reversible command contract.
//!
//! A [`Command`] is the unit of work recorded by the
//! [`HistoryManager`](crate::HistoryManager). Concrete commands live outside
//! this crate (geometry edits, document mutations, ...); the manager only
//! relies on the operations defined here.
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores the prior external state
//! - `undo()` followed by `redo()` restores the executed state
//! - the manager calls `execute()` at most once per submission; any later
//!   re-application goes through `redo()`
//!
//! # Failure Modes
//!
//! - **Missing override**: the default `execute`/`undo` bodies fail with
//!   [`CommandError::NotImplemented`]
//! - **Partial mutation**: a body that fails halfway leaves external state
//!   changed with no history entry to reverse it. The manager does not
//!   protect against this.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use web_time::Instant;

use crate::error::{CommandError, CommandResult};

/// Identity metadata carried by every command.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Semantic category tag (e.g. "extrude", "rename").
    pub kind: String,
    /// Human-readable label for UI (e.g. "Extrude face").
    pub description: String,
    /// When the command was created.
    pub created_at: Instant,
    /// Hint that applying the command may suspend.
    pub is_async: bool,
}

impl CommandMetadata {
    /// Create metadata for a synchronous command.
    #[must_use]
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            created_at: Instant::now(),
            is_async: false,
        }
    }

    /// Mark whether applying the command may suspend.
    #[must_use]
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }
}

/// A reversible operation.
///
/// Implementors must override [`execute`](Command::execute) and
/// [`undo`](Command::undo). [`redo`](Command::redo) defaults to a fresh
/// `execute` and may be overridden when re-applying differs, for example
/// when restoring cached state is cheaper than recomputing it.
#[async_trait]
pub trait Command: Send + Sync {
    /// Identity metadata.
    fn metadata(&self) -> &CommandMetadata;

    /// Semantic category tag.
    fn kind(&self) -> &str {
        &self.metadata().kind
    }

    /// Human-readable description for UI display.
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Whether applying this command may suspend.
    fn is_async(&self) -> bool {
        self.metadata().is_async
    }

    /// Perform the action.
    async fn execute(&mut self) -> CommandResult {
        Err(CommandError::not_implemented(self.description(), "execute"))
    }

    /// Reverse the most recent `execute`/`redo`.
    async fn undo(&mut self) -> CommandResult {
        Err(CommandError::not_implemented(self.description(), "undo"))
    }

    /// Re-apply after an undo.
    async fn redo(&mut self) -> CommandResult {
        self.execute().await
    }

    /// Whether `other` could be absorbed into this command.
    fn can_merge_with(&self, _other: &dyn Command) -> bool {
        false
    }

    /// Absorb `other`, turning `self` into the merged replacement.
    ///
    /// Hands `other` back untouched when the merge is refused.
    fn merge_with(&mut self, other: Box<dyn Command>) -> Result<(), Box<dyn Command>> {
        Err(other)
    }

    /// Downcast hook for merge implementations.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.kind())
            .field("description", &self.description())
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Owned summary of a command that stays inside the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Semantic category tag.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// When the command was created.
    pub created_at: Instant,
    /// Whether applying the command may suspend.
    pub is_async: bool,
}

impl CommandInfo {
    /// Summarize `command`.
    #[must_use]
    pub fn of(command: &dyn Command) -> Self {
        Self {
            kind: command.kind().to_owned(),
            description: command.description().to_owned(),
            created_at: command.metadata().created_at,
            is_async: command.is_async(),
        }
    }
}
