//! Error Module - Allocator Error Types
//!
//! Defines the fallible surface of the bucket allocator (spec §7: resource
//! exhaustion and argument-violation classes). Corrupted block headers are
//! invariant violations and abort through `rt_util::error::fatal` rather than
//! flowing through here.

use thiserror::Error;

/// Main error type for allocator operations.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bounds check failed: bucket {index} out of bounds for {len} buckets")]
    BoundsCheckFailed { index: usize, len: usize },
}

/// Result type alias for allocator operations.
pub type Result<T> = std::result::Result<T, AllocError>;

/// Ensure condition is true, otherwise return error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
