//! The facade that wires the core subsystems together into the external
//! interfaces the design calls out: a `Value` object API (re-exported
//! directly from `rt-value`, since its method names already match the
//! contract), an interpreter API layered over `rt-interp::Interp`, and the
//! library loader. This crate has no behavior of its own beyond that
//! wiring — each subsystem's logic lives in its own crate.

pub use rt_alloc;
pub use rt_bigint;
pub use rt_collections;
pub use rt_interp;
pub use rt_loader;
pub use rt_preserve;
pub use rt_value;

pub use rt_interp::{CompletionCode, Flags, Interp, ReturnOptionsError, SavedState};
pub use rt_loader::{InterpId, LibraryRegistry, LoaderError, LoadOutcome};
pub use rt_value::{Dict, List, Value};

mod facade;

pub use facade::Runtime;
