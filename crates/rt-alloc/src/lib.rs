//! # rt-alloc
//!
//! A thread-caching slab/bucket allocator: each thread keeps a small cache
//! of free blocks per geometric size class, spilling into a shared cache
//! under a per-bucket lock when its own cache overflows, and pulling from
//! that shared cache before falling back to the system allocator. Requests
//! bigger than the largest bucket always go straight to the system
//! allocator.
//!
//! ```rust
//! let ptr = rt_alloc::alloc(128).unwrap();
//! unsafe {
//!     ptr.as_ptr().write_bytes(0, 128);
//!     rt_alloc::free(ptr);
//! }
//! ```
//!
//! Set `RT_ALLOC_PURIFY=1` (or call [`configure`] with
//! `AllocConfig { purify_mode: true, .. }` before the first allocation) to
//! bypass the bucket cache and route every request to the system allocator,
//! which is useful when running under a memory sanitizer.

pub mod allocator;
pub mod config;
pub mod error;
pub mod util;

pub use allocator::{alloc, configure, free, max_bucketed_size, realloc, stats, AllocStats};
pub use config::AllocConfig;
pub use error::{AllocError, Result};
