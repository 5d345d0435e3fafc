//! The dynamic-library loader: resolves a `load` request against the
//! process-wide record list, dlopens and binds new libraries, and
//! reference-counts bindings for `unload`.

pub mod error;
pub mod prefix;
pub mod registry;

pub use error::LoaderError;
pub use prefix::derive_prefix;
pub use registry::{InitFn, InterpId, LoadOutcome, LibraryRegistry, UnloadFn};
