#![forbid(unsafe_code)]

//! Editing sessions.
//!
//! An [`EditSession`] owns the undo history for one document together with
//! the shared context its commands work against (a scene, a geometric
//! identity resolver, ...). Commands receive that context explicitly when
//! they are built, so two sessions never share state through globals.

use std::fmt;
use std::sync::Arc;

use retrace_history::{Command, HistoryConfig, HistoryManager, HistoryResult};

/// History plus the context its commands operate on.
pub struct EditSession<C> {
    history: HistoryManager,
    context: Arc<C>,
}

impl<C> fmt::Debug for EditSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl<C> EditSession<C> {
    /// Create a session with the default history configuration.
    #[must_use]
    pub fn new(context: C) -> Self {
        Self::with_history(context, HistoryManager::default())
    }

    /// Create a session with a custom history configuration.
    #[must_use]
    pub fn with_config(context: C, config: HistoryConfig) -> Self {
        Self::with_history(context, HistoryManager::new(config))
    }

    /// Create a session around an existing history manager.
    #[must_use]
    pub fn with_history(context: C, history: HistoryManager) -> Self {
        Self {
            history,
            context: Arc::new(context),
        }
    }

    /// The session's history.
    #[must_use]
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Mutable access, e.g. to attach a change hook.
    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    /// The shared context handed to commands.
    #[must_use]
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Build a command against the session context and execute it.
    ///
    /// # Errors
    ///
    /// Whatever [`HistoryManager::execute`] returns.
    pub async fn apply<F, K>(&self, build: F) -> HistoryResult<()>
    where
        F: FnOnce(Arc<C>) -> K,
        K: Command + 'static,
    {
        let cmd = build(Arc::clone(&self.context));
        tracing::debug!(
            target: "retrace.session",
            command = %cmd.description(),
            "applying command"
        );
        self.history.execute(Box::new(cmd)).await
    }
}
