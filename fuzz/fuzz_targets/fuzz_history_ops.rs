#![no_main]

use std::sync::{Arc, Mutex};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use retrace_history::{
    Command, CommandError, CommandMetadata, CommandResult, CompositeCommand, FailurePolicy,
    HistoryConfig, HistoryManager, async_trait,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Execute { amount: i8, fail: bool },
    Capture { amount: i8 },
    Group { amounts: Vec<i8>, fail_last: bool },
    Undo,
    Redo,
    Begin,
    Commit,
    Rollback,
    Clear,
}

#[derive(Debug, Arbitrary)]
struct Input {
    max_size: u8,
    compensate: bool,
    ops: Vec<Op>,
}

struct Add {
    metadata: CommandMetadata,
    total: Arc<Mutex<i64>>,
    amount: i64,
    fail: bool,
}

#[async_trait]
impl Command for Add {
    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    async fn execute(&mut self) -> CommandResult {
        if self.fail {
            return Err(CommandError::Other("refused".into()));
        }
        *self.total.lock().unwrap() += self.amount;
        Ok(())
    }

    async fn undo(&mut self) -> CommandResult {
        *self.total.lock().unwrap() -= self.amount;
        Ok(())
    }
}

fuzz_target!(|input: Input| {
    let max_size = usize::from(input.max_size % 16);
    let total = Arc::new(Mutex::new(0i64));
    let mgr = HistoryManager::new(HistoryConfig::new(max_size));
    let policy = if input.compensate {
        FailurePolicy::Compensate
    } else {
        FailurePolicy::Halt
    };

    for op in input.ops {
        let add = |amount: i8, fail: bool| -> Box<dyn Command> {
            Box::new(Add {
                metadata: CommandMetadata::new("add", "add"),
                total: total.clone(),
                amount: i64::from(amount),
                fail,
            })
        };
        pollster::block_on(async {
            match op {
                Op::Execute { amount, fail } => {
                    let result = mgr.execute(add(amount, fail)).await;
                    assert_eq!(result.is_err(), fail);
                }
                Op::Group { amounts, fail_last } => {
                    let before = *total.lock().unwrap();
                    let mut members: Vec<Box<dyn Command>> =
                        amounts.iter().map(|&a| add(a, false)).collect();
                    if fail_last {
                        members.push(add(0, true));
                    }
                    let group = CompositeCommand::new("group", members).with_policy(policy);
                    let result = mgr.execute(Box::new(group)).await;
                    assert_eq!(result.is_err(), fail_last);
                    if fail_last && policy == FailurePolicy::Compensate {
                        assert_eq!(*total.lock().unwrap(), before, "compensation left residue");
                    }
                }
                Op::Capture { amount } => {
                    *total.lock().unwrap() += i64::from(amount);
                    mgr.capture(add(amount, false));
                }
                Op::Undo => {
                    mgr.undo().await.unwrap();
                }
                Op::Redo => {
                    mgr.redo().await.unwrap();
                }
                Op::Begin => {
                    let _ = mgr.begin_transaction("fuzz");
                }
                Op::Commit => mgr.commit_transaction(),
                Op::Rollback => mgr.rollback_transaction().await.unwrap(),
                Op::Clear => mgr.clear(),
            }
        });

        // Post-conditions that must always hold between calls:
        let snap = mgr.snapshot();
        assert!(snap.undo_count <= max_size, "undo stack over capacity");
        assert!(snap.redo_count <= max_size, "redo stack over capacity");
        assert!(snap.undo_count + snap.redo_count <= max_size);
        assert!(!snap.busy && !snap.applying, "busy leaked past a call");
        assert_eq!(snap.can_undo, snap.undo_count > 0);
        assert_eq!(snap.can_redo, snap.redo_count > 0);
    }
});
