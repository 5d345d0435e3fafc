//! Shared utilities for the `dynrt` workspace.
//!
//! Currently just the error taxonomy (§7) and the `fatal` abort path every
//! other crate reaches for when it hits an invariant violation.

pub mod error;

pub use error::RtError;
