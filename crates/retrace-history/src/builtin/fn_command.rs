#![forbid(unsafe_code)]

//! Closure-backed commands.

use std::fmt;

use async_trait::async_trait;

use crate::command::{Command, CommandMetadata};
use crate::error::{CommandError, CommandResult};

/// Callback type for one direction of a [`FnCommand`].
pub type StepFn = Box<dyn FnMut() -> CommandResult + Send + Sync>;

/// A command whose effect is supplied as closures.
///
/// Commands cannot borrow the state they mutate, so the closures capture
/// whatever handle the caller owns (an `Arc<Mutex<_>>`, a channel, ...).
/// A missing execute or undo closure surfaces as
/// [`CommandError::NotImplemented`].
pub struct FnCommand {
    metadata: CommandMetadata,
    execute: Option<StepFn>,
    undo: Option<StepFn>,
    redo: Option<StepFn>,
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("metadata", &self.metadata)
            .field("has_execute", &self.execute.is_some())
            .field("has_undo", &self.undo.is_some())
            .field("has_redo", &self.redo.is_some())
            .finish()
    }
}

impl FnCommand {
    /// Create a command with no callbacks attached.
    #[must_use]
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            metadata: CommandMetadata::new(kind, description),
            execute: None,
            undo: None,
            redo: None,
        }
    }

    /// Set the execute callback.
    #[must_use]
    pub fn with_execute<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CommandResult + Send + Sync + 'static,
    {
        self.execute = Some(Box::new(f));
        self
    }

    /// Set the undo callback.
    #[must_use]
    pub fn with_undo<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CommandResult + Send + Sync + 'static,
    {
        self.undo = Some(Box::new(f));
        self
    }

    /// Set a redo callback distinct from execute.
    #[must_use]
    pub fn with_redo<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CommandResult + Send + Sync + 'static,
    {
        self.redo = Some(Box::new(f));
        self
    }

    fn missing(&self, operation: &'static str) -> CommandError {
        CommandError::not_implemented(self.metadata.description.clone(), operation)
    }
}

#[async_trait]
impl Command for FnCommand {
    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    async fn execute(&mut self) -> CommandResult {
        match self.execute.as_mut() {
            Some(f) => f(),
            None => Err(self.missing("execute")),
        }
    }

    async fn undo(&mut self) -> CommandResult {
        match self.undo.as_mut() {
            Some(f) => f(),
            None => Err(self.missing("undo")),
        }
    }

    async fn redo(&mut self) -> CommandResult {
        match self.redo.as_mut() {
            Some(f) => f(),
            None => self.execute().await,
        }
    }
}
