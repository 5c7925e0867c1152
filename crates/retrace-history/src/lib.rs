#![forbid(unsafe_code)]

//! Transactional undo/redo command history.
//!
//! This crate implements the Command Pattern for interactive editors:
//!
//! - **Reversibility**: every [`Command`] can be undone and redone
//! - **Transactions**: several commands group into one atomic undo entry
//! - **Bounded history**: the oldest entries are evicted past `max_size`
//! - **Busy guard**: overlapping top-level calls fail fast instead of
//!   interleaving asynchronous command bodies
//! - **Observers**: a change hook receives a [`HistorySnapshot`] after every
//!   mutating transition
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       HistoryManager                          │
//! │  ┌──────────────┐   undo()   ┌──────────────┐                │
//! │  │  Undo Stack  │ ─────────► │  Redo Stack  │                │
//! │  │  (bounded)   │ ◄───────── │  (bounded)   │                │
//! │  └──────────────┘   redo()   └──────────────┘                │
//! │          ▲                                                    │
//! │          │ commit_transaction()                               │
//! │  ┌───────┴──────────┐   rollback_transaction() undoes and     │
//! │  │ CompositeCommand │   discards the buffer                   │
//! │  │ (open tx buffer) │                                         │
//! │  └──────────────────┘                                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use retrace_history::{FnCommand, HistoryConfig, HistoryManager};
//!
//! let history = HistoryManager::new(HistoryConfig::new(100));
//!
//! history
//!     .execute(Box::new(
//!         FnCommand::new("rename", "Rename layer")
//!             .with_execute(|| Ok(()))
//!             .with_undo(|| Ok(())),
//!     ))
//!     .await?;
//!
//! history.begin_transaction("Align selection")?;
//! // ... execute or capture several commands ...
//! history.commit_transaction();
//!
//! history.undo().await?; // undoes the whole alignment
//! ```
//!
//! # Module Structure
//!
//! - [`command`]: the `Command` trait and its metadata
//! - [`composite`]: `CompositeCommand`, the grouping primitive
//! - [`history`]: `HistoryManager` and its configuration
//! - [`snapshot`]: observer-facing state projections
//! - [`builtin`]: closure-backed and value-swapping commands
//! - [`error`]: command and manager error kinds

pub mod builtin;
pub mod command;
pub mod composite;
pub mod error;
pub mod history;
pub mod snapshot;

// Re-export commonly used types
pub use async_trait::async_trait;
pub use builtin::{FnCommand, SetValueCmd};
pub use command::{Command, CommandInfo, CommandMetadata};
pub use composite::{CompositeCommand, FailurePolicy};
pub use error::{CommandError, CommandResult, HistoryError, HistoryResult};
pub use history::{DEFAULT_TRANSACTION_NAME, HistoryConfig, HistoryManager};
pub use snapshot::{Activity, ChangeHook, HistorySnapshot};
