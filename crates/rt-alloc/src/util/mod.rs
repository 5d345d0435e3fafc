//! Util Module - Shared Utilities
//!
//! Small helpers used throughout the allocator.

pub mod alignment;

pub use alignment::Alignment;
