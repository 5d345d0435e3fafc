//! Persistent and resizable collection primitives shared by the rest of
//! the runtime: a HAMT for persistent values, a Brodnik array for the
//! runtime's own growth-by-doubling containers, and a separate-chaining
//! hash table for symbol/command lookup tables.

pub mod brodnik;
pub mod hamt;
pub mod hash_table;

pub use brodnik::BrodnikArray;
pub use hamt::Hamt;
pub use hash_table::{HashTable, IndexStrategy};
