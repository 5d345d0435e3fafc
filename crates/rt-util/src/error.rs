//! Error taxonomy shared across `dynrt` crates (spec §7).
//!
//! Argument violations, resource exhaustion and script-level errors are
//! ordinary `Result` values; invariant violations are not representable
//! here — they abort the process (see [`fatal`]).

use thiserror::Error;

/// Catch-all error for the parts of the runtime that don't need a crate of
/// their own error enum.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Abort the process with a diagnostic. Used for the spec's "invariant
/// violation" error class: corrupt allocator headers, malformed chains,
/// use of a destroyed table. These indicate memory corruption, so recovery
/// is not attempted.
#[cold]
#[track_caller]
pub fn fatal(msg: &str) -> ! {
    log::error!("fatal invariant violation: {msg}");
    panic!("dynrt: fatal invariant violation: {msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_error_formats_its_message() {
        let err = RtError::Argument("wrong number of arguments".to_string());
        assert_eq!(err.to_string(), "argument error: wrong number of arguments");
    }

    #[test]
    fn resource_exhausted_formats_its_message() {
        let err = RtError::ResourceExhausted("list length exceeded".to_string());
        assert_eq!(err.to_string(), "resource exhausted: list length exceeded");
    }

    #[test]
    #[should_panic(expected = "fatal invariant violation: corrupt header")]
    fn fatal_aborts_with_the_diagnostic() {
        fatal("corrupt header");
    }
}
