//! The polymorphic, reference-counted value object, its list
//! representation, and the abstract-list adapters that present a
//! list-shaped view without materializing an element array.

pub mod abstract_list;
pub mod list;
pub mod value;

pub use abstract_list::{AbstractList, ArithmeticProgression, HexIndex, Repeated};
pub use list::{List, ListError};
pub use value::{Dict, ExternalType, InternalRep, Value};
