#![forbid(unsafe_code)]

//! History manager for undo/redo operations.
//!
//! [`HistoryManager`] owns two bounded stacks, at most one open
//! transaction, a busy guard, and an optional change hook. It is the only
//! entry point callers use to execute, undo, redo, and group commands.
//!
//! # Invariants
//!
//! 1. `undo_stack.len() <= config.max_size`; the oldest entries are evicted
//!    first and are gone for good
//! 2. Recording a command outside a transaction clears the redo stack
//! 3. At most one transaction is open at a time
//! 4. While a top-level execute/undo/redo/rollback is in flight, any other
//!    top-level call fails with [`HistoryError::Busy`] and mutates nothing
//! 5. Commands recorded inside a transaction reach the undo stack only
//!    through [`commit_transaction`](HistoryManager::commit_transaction), as
//!    a single composite entry
//! 6. A successful undo/redo moves exactly one entry between the stacks
//!
//! # Concurrency Model
//!
//! All state sits behind one [`Mutex`]. The lock is held only for
//! bookkeeping, never across an `.await` and never while the change hook
//! runs, so the hook may query the manager. Command bodies run with the
//! command moved out of the stacks; the busy guard keeps every other
//! top-level call out until the body settles. The guard is a fail-fast
//! flag, not a queue.
//!
//! The synchronous calls (`capture`, `begin_transaction`,
//! `commit_transaction`, `clear`) are not turned away while busy. Each
//! recording or clear starts a new branch; an undo or redo that settles
//! after the branch moved on drops its entry instead of putting it back on
//! top of newer history. A transaction being rolled back stays open (and
//! keeps its name) until the rollback settles.
//!
//! ```text
//! execute(c4)                      undo() x2
//! ┌─────────────────────────┐      ┌─────────────────────────┐
//! │ Undo: [c1, c2, c3, c4]  │ ──►  │ Undo: [c1, c2]          │
//! │ Redo: []                │      │ Redo: [c4, c3]          │
//! └─────────────────────────┘      └─────────────────────────┘
//!
//! begin_transaction("Bevel"); execute(c5); execute(c6); commit_transaction()
//! ┌──────────────────────────────────────┐
//! │ Undo: [c1, c2, Bevel{c5, c6}]         │
//! │ Redo: []   <-- new branch, cleared    │
//! └──────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::Instrument;

use crate::command::{Command, CommandInfo};
use crate::composite::CompositeCommand;
use crate::error::{CommandError, HistoryError, HistoryResult};
use crate::snapshot::{Activity, ChangeHook, HistorySnapshot};

/// Name given to transactions opened without a more specific label.
pub const DEFAULT_TRANSACTION_NAME: &str = "Transaction";

const LOG_TARGET: &str = "retrace.history";

/// Configuration for the history manager.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct HistoryConfig {
    /// Maximum number of entries kept on each stack.
    pub max_size: usize,
    /// Try to merge a newly recorded command into the top undo entry.
    pub coalesce: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            coalesce: true,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with a custom capacity.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    /// Enable or disable command coalescing.
    #[must_use]
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Create an unbounded configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }
}

/// Everything guarded by the manager's lock.
#[derive(Default)]
struct HistoryState {
    /// Commands available for undo (newest at back).
    undo_stack: VecDeque<Box<dyn Command>>,
    /// Commands available for redo (newest at back).
    redo_stack: VecDeque<Box<dyn Command>>,
    /// Buffer of the open transaction.
    transaction: Option<CompositeCommand>,
    activity: Activity,
    applying: bool,
    last_error: Option<String>,
    /// Bumped on every recording outside a transaction and on clear.
    branch: u64,
    /// The open transaction is being rolled back.
    rolling_back: bool,
}

impl HistoryState {
    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            can_undo: !self.undo_stack.is_empty(),
            can_redo: !self.redo_stack.is_empty(),
            busy: self.activity.is_busy(),
            applying: self.applying,
            activity: self.activity,
            transaction_name: self
                .transaction
                .as_ref()
                .map(|tx| tx.description().to_owned()),
            last_error: self.last_error.clone(),
        }
    }

    /// File an applied command: into the open transaction, or onto the undo stack.
    fn place(&mut self, cmd: Box<dyn Command>, config: &HistoryConfig) {
        match self.transaction.as_mut() {
            Some(tx) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    transaction = %tx.description(),
                    command = %cmd.description(),
                    "buffered command in transaction"
                );
                tx.add_command(cmd);
            }
            None => self.record(cmd, config),
        }
    }

    /// New branch: clear redo, coalesce with the top if allowed, push, evict.
    fn record(&mut self, cmd: Box<dyn Command>, config: &HistoryConfig) {
        self.branch = self.branch.wrapping_add(1);
        if !self.redo_stack.is_empty() {
            tracing::debug!(
                target: LOG_TARGET,
                discarded = self.redo_stack.len(),
                "new branch discarded redo history"
            );
            self.redo_stack.clear();
        }

        let cmd = if config.coalesce {
            match self.try_merge(cmd) {
                Ok(()) => return,
                Err(cmd) => cmd,
            }
        } else {
            cmd
        };

        self.push_undo(cmd, config);
    }

    /// Append to the undo stack and evict the oldest beyond capacity.
    fn push_undo(&mut self, cmd: Box<dyn Command>, config: &HistoryConfig) {
        self.undo_stack.push_back(cmd);
        while self.undo_stack.len() > config.max_size {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::debug!(
                    target: LOG_TARGET,
                    command = %evicted.description(),
                    max_size = config.max_size,
                    "evicted oldest undo entry"
                );
            }
        }
    }

    /// Append to the redo stack, sharing the undo stack's capacity.
    ///
    /// Undo and redo together never exceed `max_size` while the branch is
    /// unchanged, so the cap only guards against misuse.
    fn push_redo(&mut self, cmd: Box<dyn Command>, config: &HistoryConfig) {
        self.redo_stack.push_back(cmd);
        while self.redo_stack.len() > config.max_size {
            self.redo_stack.pop_front();
        }
    }

    /// Put a failed undo/redo entry back, unless history branched meanwhile.
    fn restore(
        &mut self,
        branch: u64,
        cmd: Box<dyn Command>,
        activity: Activity,
        config: &HistoryConfig,
    ) {
        if self.branch != branch {
            tracing::warn!(
                target: LOG_TARGET,
                activity = %activity,
                command = %cmd.description(),
                "dropped failed entry; history branched while it ran"
            );
            return;
        }
        match activity {
            Activity::Redoing => self.push_redo(cmd, config),
            _ => self.push_undo(cmd, config),
        }
    }

    /// Close the transaction that was just rolled back.
    fn finish_rollback(&mut self) {
        if !self.rolling_back {
            return;
        }
        self.rolling_back = false;
        if let Some(late) = self.transaction.take().filter(|tx| !tx.is_empty()) {
            tracing::warn!(
                target: LOG_TARGET,
                transaction = %late.description(),
                commands = late.len(),
                "discarded commands captured during rollback"
            );
        }
    }

    /// Try to merge a command into the top of the undo stack.
    ///
    /// Returns `Ok(())` if merged, `Err(cmd)` if not merged.
    fn try_merge(&mut self, cmd: Box<dyn Command>) -> Result<(), Box<dyn Command>> {
        let Some(last) = self.undo_stack.back_mut() else {
            return Err(cmd);
        };
        if !last.can_merge_with(cmd.as_ref()) {
            return Err(cmd);
        }
        last.merge_with(cmd)?;
        tracing::debug!(
            target: LOG_TARGET,
            command = %last.description(),
            "coalesced command into top undo entry"
        );
        Ok(())
    }
}

/// Clears the busy state when dropped, so a failing or abandoned command
/// body never leaves the manager stuck.
struct BusyGuard<'a> {
    manager: &'a HistoryManager,
    /// Branch seen when the entry was taken.
    branch: u64,
}

impl BusyGuard<'_> {
    /// Record `err` as the last error; the drop that follows settles the state.
    fn fail(self, activity: Activity, err: &CommandError) {
        tracing::warn!(
            target: LOG_TARGET,
            activity = %activity,
            error = %err,
            "command body failed"
        );
        self.manager.lock().last_error = Some(err.to_string());
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let snapshot = {
            let mut state = self.manager.lock();
            state.activity = Activity::Idle;
            state.applying = false;
            state.finish_rollback();
            state.snapshot()
        };
        self.manager.publish(&snapshot);
    }
}

/// Manager for undo/redo history.
///
/// Shared by reference: every operation takes `&self`, so concurrent
/// callers are possible and are turned away with [`HistoryError::Busy`]
/// while a command body is in flight.
pub struct HistoryManager {
    state: Mutex<HistoryState>,
    config: HistoryConfig,
    on_change: Option<ChangeHook>,
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("HistoryManager")
            .field("undo_depth", &state.undo_stack.len())
            .field("redo_depth", &state.redo_stack.len())
            .field("activity", &state.activity)
            .field(
                "transaction",
                &state.transaction.as_ref().map(|tx| tx.description()),
            )
            .field("config", &self.config)
            .field("has_on_change", &self.on_change.is_some())
            .finish()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryManager {
    /// Create a new history manager with the given configuration.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            state: Mutex::new(HistoryState::default()),
            config,
            on_change: None,
        }
    }

    /// Attach a subscriber invoked with a snapshot after every mutating transition.
    #[must_use]
    pub fn with_on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HistorySnapshot) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(hook));
        self
    }

    /// Replace (or remove) the change subscriber.
    pub fn set_on_change(&mut self, hook: Option<ChangeHook>) {
        self.on_change = hook;
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Run `cmd` and record it.
    ///
    /// Inside a transaction the command is appended to the transaction
    /// buffer; otherwise it is recorded onto the undo stack, clearing redo.
    /// On failure neither stack is touched and the command is dropped.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Busy`] if another top-level call is in flight, or
    /// [`HistoryError::Command`] with the command's own error.
    pub async fn execute(&self, mut cmd: Box<dyn Command>) -> HistoryResult<()> {
        let Some((guard, ())) = self.enter(Activity::Executing, |_| Some(()))? else {
            return Ok(());
        };

        let span = tracing::debug_span!(
            "history.execute",
            command = %cmd.description(),
            kind = %cmd.kind(),
            is_async = cmd.is_async(),
        );
        match cmd.execute().instrument(span).await {
            Ok(()) => {
                self.lock().place(cmd, &self.config);
                drop(guard);
                Ok(())
            }
            Err(err) => {
                guard.fail(Activity::Executing, &err);
                Err(err.into())
            }
        }
    }

    /// Record a command whose effect the caller already applied.
    ///
    /// Same placement as [`execute`](Self::execute), but the command body is
    /// not run, nothing is awaited, and the busy guard is not consulted.
    pub fn capture(&self, cmd: Box<dyn Command>) {
        let snapshot = {
            let mut state = self.lock();
            state.place(cmd, &self.config);
            state.snapshot()
        };
        self.publish(&snapshot);
    }

    /// Undo the most recent entry.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(info))` if the entry was undone and moved to the redo stack
    /// - `Ok(None)` if there is nothing to undo (no state change)
    /// - `Err(_)` if busy, or if the undo body failed (the entry stays on
    ///   the undo stack, unless a recording started a new branch meanwhile)
    pub async fn undo(&self) -> HistoryResult<Option<CommandInfo>> {
        let Some((guard, mut cmd)) =
            self.enter(Activity::Undoing, |state| state.undo_stack.pop_back())?
        else {
            return Ok(None);
        };

        let info = CommandInfo::of(cmd.as_ref());
        let span = tracing::debug_span!("history.undo", command = %info.description);
        match cmd.undo().instrument(span).await {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    if state.branch == guard.branch {
                        state.push_redo(cmd, &self.config);
                    } else {
                        tracing::debug!(
                            target: LOG_TARGET,
                            command = %info.description,
                            "new branch discarded undone entry"
                        );
                    }
                }
                drop(guard);
                Ok(Some(info))
            }
            Err(err) => {
                self.lock()
                    .restore(guard.branch, cmd, Activity::Undoing, &self.config);
                guard.fail(Activity::Undoing, &err);
                Err(err.into())
            }
        }
    }

    /// Redo the most recently undone entry.
    ///
    /// The entry goes back onto the undo stack under the same capacity rule
    /// as [`execute`](Self::execute); remaining redo entries are kept.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(info))` if the entry was redone
    /// - `Ok(None)` if there is nothing to redo (no state change)
    /// - `Err(_)` if busy, or if the redo body failed (the entry stays on
    ///   the redo stack, unless a recording started a new branch meanwhile)
    pub async fn redo(&self) -> HistoryResult<Option<CommandInfo>> {
        let Some((guard, mut cmd)) =
            self.enter(Activity::Redoing, |state| state.redo_stack.pop_back())?
        else {
            return Ok(None);
        };

        let info = CommandInfo::of(cmd.as_ref());
        let span = tracing::debug_span!("history.redo", command = %info.description);
        match cmd.redo().instrument(span).await {
            Ok(()) => {
                self.lock().push_undo(cmd, &self.config);
                drop(guard);
                Ok(Some(info))
            }
            Err(err) => {
                self.lock()
                    .restore(guard.branch, cmd, Activity::Redoing, &self.config);
                guard.fail(Activity::Redoing, &err);
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Open a transaction named `name`.
    ///
    /// Until it is committed or rolled back, executed and captured commands
    /// are buffered instead of recorded.
    ///
    /// # Errors
    ///
    /// [`HistoryError::TransactionAlreadyOpen`] if one is already open; the
    /// open transaction is left untouched.
    pub fn begin_transaction(&self, name: impl Into<String>) -> HistoryResult<()> {
        let snapshot = {
            let mut state = self.lock();
            if let Some(open) = state.transaction.as_ref() {
                let name = open.description().to_owned();
                tracing::warn!(
                    target: LOG_TARGET,
                    transaction = %name,
                    "rejected nested transaction"
                );
                return Err(HistoryError::TransactionAlreadyOpen { name });
            }
            let tx = CompositeCommand::empty(name);
            tracing::debug!(
                target: LOG_TARGET,
                transaction = %tx.description(),
                "opened transaction"
            );
            state.transaction = Some(tx);
            state.snapshot()
        };
        self.publish(&snapshot);
        Ok(())
    }

    /// Close the open transaction, recording it as one undo entry.
    ///
    /// An empty transaction is discarded. No-op without an open transaction.
    pub fn commit_transaction(&self) {
        let snapshot = {
            let mut state = self.lock();
            if state.rolling_back {
                tracing::warn!(
                    target: LOG_TARGET,
                    "ignored commit of a transaction being rolled back"
                );
                return;
            }
            let Some(tx) = state.transaction.take() else {
                return;
            };
            if tx.is_empty() {
                tracing::debug!(
                    target: LOG_TARGET,
                    transaction = %tx.description(),
                    "discarded empty transaction"
                );
            } else {
                tracing::debug!(
                    target: LOG_TARGET,
                    transaction = %tx.description(),
                    commands = tx.len(),
                    "committed transaction"
                );
                state.record(Box::new(tx), &self.config);
            }
            state.snapshot()
        };
        self.publish(&snapshot);
    }

    /// Undo everything buffered in the open transaction and discard it.
    ///
    /// Neither stack is touched. No-op without an open transaction. The
    /// transaction stays open under its name until the undo settles, so a
    /// concurrent `begin_transaction` is rejected and a concurrent
    /// `commit_transaction` is ignored. Commands captured meanwhile are
    /// discarded with it. The buffer is discarded even when its undo fails.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Busy`] if another top-level call is in flight, or
    /// [`HistoryError::Command`] if a buffered command failed to undo.
    pub async fn rollback_transaction(&self) -> HistoryResult<()> {
        let Some((guard, mut tx)) = self.enter(Activity::RollingBack, |state| {
            let open = state.transaction.as_mut()?;
            let name = open.description().to_owned();
            state.rolling_back = true;
            Some(std::mem::replace(open, CompositeCommand::empty(name)))
        })?
        else {
            return Ok(());
        };

        let span = tracing::debug_span!(
            "history.rollback",
            transaction = %tx.description(),
            commands = tx.len(),
        );
        match tx.undo().instrument(span).await {
            Ok(()) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    transaction = %tx.description(),
                    "rolled back transaction"
                );
                drop(guard);
                Ok(())
            }
            Err(err) => {
                guard.fail(Activity::RollingBack, &err);
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop all history and any open transaction without undoing anything.
    pub fn clear(&self) {
        let snapshot = {
            let mut state = self.lock();
            state.undo_stack.clear();
            state.redo_stack.clear();
            state.transaction = None;
            state.rolling_back = false;
            state.last_error = None;
            state.branch = state.branch.wrapping_add(1);
            state.snapshot()
        };
        tracing::debug!(target: LOG_TARGET, "cleared history");
        self.publish(&snapshot);
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.lock().undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.lock().redo_stack.is_empty()
    }

    /// Current state as seen by observers.
    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        self.lock().snapshot()
    }

    /// Get the undo stack depth.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.lock().undo_stack.len()
    }

    /// Get the redo stack depth.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.lock().redo_stack.len()
    }

    /// Get descriptions for undo entries (most recent first).
    pub fn undo_descriptions(&self, limit: usize) -> Vec<String> {
        Self::describe(&self.lock().undo_stack, limit)
    }

    /// Get descriptions for redo entries (most recent first).
    pub fn redo_descriptions(&self, limit: usize) -> Vec<String> {
        Self::describe(&self.lock().redo_stack, limit)
    }

    /// Get the description of the next undo entry.
    #[must_use]
    pub fn next_undo_description(&self) -> Option<String> {
        self.lock()
            .undo_stack
            .back()
            .map(|c| c.description().to_owned())
    }

    /// Get the description of the next redo entry.
    #[must_use]
    pub fn next_redo_description(&self) -> Option<String> {
        self.lock()
            .redo_stack
            .back()
            .map(|c| c.description().to_owned())
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.lock().transaction.is_some()
    }

    /// Number of commands buffered in the open transaction.
    #[must_use]
    pub fn transaction_len(&self) -> Option<usize> {
        self.lock().transaction.as_ref().map(CompositeCommand::len)
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        // Bookkeeping never panics mid-update, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: &HistorySnapshot) {
        if let Some(hook) = &self.on_change {
            hook(snapshot);
        }
    }

    fn describe(stack: &VecDeque<Box<dyn Command>>, limit: usize) -> Vec<String> {
        stack
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description().to_owned())
            .collect()
    }

    /// Enter a busy activity.
    ///
    /// `take` runs under the lock once the manager is known to be idle; if
    /// it yields nothing the call is a no-op and the manager stays idle.
    fn enter<T>(
        &self,
        activity: Activity,
        take: impl FnOnce(&mut HistoryState) -> Option<T>,
    ) -> HistoryResult<Option<(BusyGuard<'_>, T)>> {
        let (guard, taken, snapshot) = {
            let mut state = self.lock();
            if state.activity.is_busy() {
                tracing::warn!(
                    target: LOG_TARGET,
                    requested = %activity,
                    in_flight = %state.activity,
                    "rejected call while busy"
                );
                return Err(HistoryError::Busy(state.activity));
            }
            let Some(taken) = take(&mut state) else {
                return Ok(None);
            };
            state.activity = activity;
            state.applying = true;
            state.last_error = None;
            let guard = BusyGuard {
                manager: self,
                branch: state.branch,
            };
            (guard, taken, state.snapshot())
        };
        self.publish(&snapshot);
        Ok(Some((guard, taken)))
    }
}

// ============================================================================
// Tests
// ============================================================================
