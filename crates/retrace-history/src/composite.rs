#![forbid(unsafe_code)]

//! Ordered aggregates of commands that behave as one command.
//!
//! [`CompositeCommand`] is both a general grouping primitive and the buffer
//! behind an open transaction. Members execute in insertion order and undo
//! in exact reverse order.
//!
//! # Partial Failure
//!
//! What happens when a member fails mid-sequence is governed by
//! [`FailurePolicy`]. The default, [`FailurePolicy::Halt`], stops at the
//! failing member and leaves earlier members applied (or undone).
//! [`FailurePolicy::Compensate`] walks back over the members already
//! touched before reporting the original error.

use std::fmt;

use async_trait::async_trait;

use crate::command::{Command, CommandMetadata};
use crate::error::CommandResult;

/// Kind tag reported by every composite.
pub const COMPOSITE_KIND: &str = "composite";

/// How a composite reacts to a member failing mid-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the failing member; earlier members keep their new state.
    #[default]
    Halt,
    /// Reverse the members already touched, then report the failure.
    Compensate,
}

/// A sequence of commands applied and reversed as a unit.
pub struct CompositeCommand {
    /// Members in execution order.
    commands: Vec<Box<dyn Command>>,
    metadata: CommandMetadata,
    policy: FailurePolicy,
}

impl fmt::Debug for CompositeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCommand")
            .field("commands_count", &self.commands.len())
            .field("metadata", &self.metadata)
            .field("policy", &self.policy)
            .finish()
    }
}

impl CompositeCommand {
    /// Create a composite from an initial, possibly empty, list of members.
    #[must_use]
    pub fn new(description: impl Into<String>, commands: Vec<Box<dyn Command>>) -> Self {
        let mut composite = Self {
            commands,
            metadata: CommandMetadata::new(COMPOSITE_KIND, description),
            policy: FailurePolicy::default(),
        };
        composite.refresh_async();
        composite
    }

    /// Create an empty composite.
    #[must_use]
    pub fn empty(description: impl Into<String>) -> Self {
        Self::new(description, Vec::new())
    }

    /// Set the partial-failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append a member.
    pub fn add_command(&mut self, cmd: Box<dyn Command>) {
        self.commands.push(cmd);
        self.refresh_async();
    }

    /// The partial-failure policy in effect.
    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the composite has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Member descriptions in execution order.
    pub fn descriptions(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.description()).collect()
    }

    fn refresh_async(&mut self) {
        self.metadata.is_async = self.commands.iter().any(|c| c.is_async());
    }

    /// Apply members `0..n` in order, via `redo` when `replay` is set.
    async fn apply_forward(&mut self, replay: bool) -> CommandResult {
        for i in 0..self.commands.len() {
            let step = if replay {
                self.commands[i].redo().await
            } else {
                self.commands[i].execute().await
            };
            if let Err(err) = step {
                if self.policy == FailurePolicy::Compensate {
                    for j in (0..i).rev() {
                        if let Err(comp) = self.commands[j].undo().await {
                            tracing::warn!(
                                target: "retrace.composite",
                                composite = %self.metadata.description,
                                member = %self.commands[j].description(),
                                error = %comp,
                                "compensating undo failed"
                            );
                        }
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Command for CompositeCommand {
    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    async fn execute(&mut self) -> CommandResult {
        self.apply_forward(false).await
    }

    async fn undo(&mut self) -> CommandResult {
        let count = self.commands.len();
        for i in (0..count).rev() {
            if let Err(err) = self.commands[i].undo().await {
                if self.policy == FailurePolicy::Compensate {
                    for j in i + 1..count {
                        if let Err(comp) = self.commands[j].redo().await {
                            tracing::warn!(
                                target: "retrace.composite",
                                composite = %self.metadata.description,
                                member = %self.commands[j].description(),
                                error = %comp,
                                "compensating redo failed"
                            );
                        }
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    async fn redo(&mut self) -> CommandResult {
        self.apply_forward(true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Member that journals every call and can be told to fail.
    struct Step {
        metadata: CommandMetadata,
        journal: Journal,
        fail_execute: bool,
        fail_undo: bool,
    }

    impl Step {
        fn boxed(name: &str, journal: &Journal) -> Box<dyn Command> {
            Box::new(Self::new(name, journal))
        }

        fn new(name: &str, journal: &Journal) -> Self {
            Self {
                metadata: CommandMetadata::new("step", name),
                journal: journal.clone(),
                fail_execute: false,
                fail_undo: false,
            }
        }

        fn log(&self, op: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{op} {}", self.metadata.description));
        }
    }

    #[async_trait]
    impl Command for Step {
        fn metadata(&self) -> &CommandMetadata {
            &self.metadata
        }

        async fn execute(&mut self) -> CommandResult {
            if self.fail_execute {
                return Err(CommandError::Other(format!(
                    "{} refused",
                    self.metadata.description
                )));
            }
            self.log("execute");
            Ok(())
        }

        async fn undo(&mut self) -> CommandResult {
            if self.fail_undo {
                return Err(CommandError::Other("stuck".into()));
            }
            self.log("undo");
            Ok(())
        }

        async fn redo(&mut self) -> CommandResult {
            self.log("redo");
            Ok(())
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn executes_in_order_and_undoes_in_reverse() {
        let journal = Journal::default();
        let mut composite = CompositeCommand::new(
            "Move and rename",
            vec![Step::boxed("a", &journal), Step::boxed("b", &journal)],
        );
        composite.add_command(Step::boxed("c", &journal));

        composite.execute().await.unwrap();
        composite.undo().await.unwrap();

        assert_eq!(
            entries(&journal),
            ["execute a", "execute b", "execute c", "undo c", "undo b", "undo a"]
        );
    }

    #[tokio::test]
    async fn redo_replays_member_redo() {
        let journal = Journal::default();
        let mut composite = CompositeCommand::new(
            "Pair",
            vec![Step::boxed("a", &journal), Step::boxed("b", &journal)],
        );
        composite.redo().await.unwrap();
        assert_eq!(entries(&journal), ["redo a", "redo b"]);
    }

    #[tokio::test]
    async fn halt_leaves_earlier_members_applied() {
        let journal = Journal::default();
        let mut failing = Step::new("b", &journal);
        failing.fail_execute = true;
        let mut composite = CompositeCommand::new(
            "Halting",
            vec![
                Step::boxed("a", &journal),
                Box::new(failing),
                Step::boxed("c", &journal),
            ],
        );

        let err = composite.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "b refused");
        assert_eq!(entries(&journal), ["execute a"]);
    }

    #[tokio::test]
    async fn compensate_reverses_applied_members() {
        let journal = Journal::default();
        let mut failing = Step::new("c", &journal);
        failing.fail_execute = true;
        let mut composite = CompositeCommand::new(
            "Compensating",
            vec![
                Step::boxed("a", &journal),
                Step::boxed("b", &journal),
                Box::new(failing),
            ],
        )
        .with_policy(FailurePolicy::Compensate);

        assert!(composite.execute().await.is_err());
        assert_eq!(
            entries(&journal),
            ["execute a", "execute b", "undo b", "undo a"]
        );
    }

    #[tokio::test]
    async fn compensate_redoes_members_already_undone() {
        let journal = Journal::default();
        let mut stuck = Step::new("a", &journal);
        stuck.fail_undo = true;
        let mut composite = CompositeCommand::new(
            "Compensating undo",
            vec![
                Box::new(stuck),
                Step::boxed("b", &journal),
                Step::boxed("c", &journal),
            ],
        )
        .with_policy(FailurePolicy::Compensate);

        assert!(composite.undo().await.is_err());
        assert_eq!(entries(&journal), ["undo c", "undo b", "redo b", "redo c"]);
    }

    #[test]
    fn is_async_is_or_of_members() {
        let journal = Journal::default();
        let mut composite = CompositeCommand::new("Mixed", vec![Step::boxed("a", &journal)]);
        assert!(!composite.is_async());

        let mut slow = Step::new("upload", &journal);
        slow.metadata = slow.metadata.with_async(true);
        composite.add_command(Box::new(slow));
        assert!(composite.is_async());
        assert_eq!(composite.len(), 2);
        assert_eq!(composite.descriptions(), ["a", "upload"]);
    }

    #[test]
    fn empty_composite_reports_kind_and_policy() {
        let composite = CompositeCommand::empty("Transaction");
        assert!(composite.is_empty());
        assert_eq!(composite.kind(), COMPOSITE_KIND);
        assert_eq!(composite.policy(), FailurePolicy::Halt);
    }
}
