#![forbid(unsafe_code)]

//! Ready-made commands.
//!
//! Domain commands usually implement [`Command`](crate::Command) directly.
//! These cover the common cases where the reversible effect is a pair of
//! closures or a swap of a shared value.

mod fn_command;
mod set_value;

pub use fn_command::{FnCommand, StepFn};
pub use set_value::SetValueCmd;
