//! Subcommand implementations for `dynrtctl`.
//!
//! Each subcommand lives in its own file following the same pattern: an
//! `Args` struct, a `Command` impl for dispatch uniformity, and a plain
//! `run_*` function `main.rs` calls directly.

pub mod traits;

pub mod alloc_stress;
pub mod brodnik_demo;
pub mod hamt_demo;
pub mod library;

pub use alloc_stress::{run_alloc_stress, AllocStressArgs};
pub use brodnik_demo::{run_brodnik_demo, BrodnikDemoArgs};
pub use hamt_demo::{run_hamt_demo, HamtDemoArgs};
pub use library::{run_load, LoadArgs};
