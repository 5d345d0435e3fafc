//! Interpreter evaluation state and the return-options state machine that
//! carries structured failure information across calls and between
//! interpreters.

pub mod interp;
pub mod return_options;

pub use interp::{CompletionCode, Flags, Interp, SavedState};
pub use return_options::{get_return_options, merge_return_options, process_return, transfer_result, unwind_one_level, ReturnOptionsError};
