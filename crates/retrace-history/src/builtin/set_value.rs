#![forbid(unsafe_code)]

//! Reversible assignment to a shared value.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{Command, CommandMetadata};
use crate::error::{CommandError, CommandResult};

/// Sets a shared value and restores the previous one on undo.
///
/// The target is handed in explicitly rather than looked up, so several
/// editing sessions can run side by side. With a merge window set,
/// consecutive assignments to the same target (e.g. dragging a slider)
/// coalesce into one history entry that undoes back to the value held
/// before the first of them.
pub struct SetValueCmd<T> {
    metadata: CommandMetadata,
    target: Arc<Mutex<T>>,
    value: T,
    previous: Option<T>,
    merge_window: Option<Duration>,
}

impl<T: fmt::Debug> fmt::Debug for SetValueCmd<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetValueCmd")
            .field("metadata", &self.metadata)
            .field("value", &self.value)
            .field("previous", &self.previous)
            .field("merge_window", &self.merge_window)
            .finish()
    }
}

impl<T> SetValueCmd<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Assign `value` to `target` when executed.
    #[must_use]
    pub fn new(description: impl Into<String>, target: Arc<Mutex<T>>, value: T) -> Self {
        Self {
            metadata: CommandMetadata::new("set-value", description),
            target,
            value,
            previous: None,
            merge_window: None,
        }
    }

    /// Allow merging with a later assignment created within `window`.
    #[must_use]
    pub fn with_merge_window(mut self, window: Duration) -> Self {
        self.merge_window = Some(window);
        self
    }

    /// The value this command assigns.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The value captured on the last execute, if any.
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    fn lock_target(&self) -> Result<MutexGuard<'_, T>, CommandError> {
        self.target
            .lock()
            .map_err(|_| CommandError::InvalidState("set-value target lock poisoned".into()))
    }
}

#[async_trait]
impl<T> Command for SetValueCmd<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    async fn execute(&mut self) -> CommandResult {
        let previous = {
            let mut slot = self.lock_target()?;
            std::mem::replace(&mut *slot, self.value.clone())
        };
        self.previous = Some(previous);
        Ok(())
    }

    async fn undo(&mut self) -> CommandResult {
        let Some(previous) = self.previous.clone() else {
            return Err(CommandError::InvalidState(format!(
                "'{}' was never executed",
                self.metadata.description
            )));
        };
        *self.lock_target()? = previous;
        Ok(())
    }

    fn can_merge_with(&self, other: &dyn Command) -> bool {
        let Some(window) = self.merge_window else {
            return false;
        };
        let Some(other) = other.as_any().and_then(|a| a.downcast_ref::<Self>()) else {
            return false;
        };
        if !Arc::ptr_eq(&self.target, &other.target) {
            return false;
        }
        other
            .metadata
            .created_at
            .duration_since(self.metadata.created_at)
            <= window
    }

    fn merge_with(&mut self, other: Box<dyn Command>) -> Result<(), Box<dyn Command>> {
        if !self.can_merge_with(other.as_ref()) {
            return Err(other);
        }
        let Some(later) = other.as_any().and_then(|a| a.downcast_ref::<Self>()) else {
            return Err(other);
        };
        // Keep our `previous`: undo must land before the first assignment.
        self.value = later.value.clone();
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
