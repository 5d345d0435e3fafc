//! `Value` — the universal, reference-counted, polymorphic scripted value.
//!
//! A `Value` is an `Arc<Inner>`. That single indirection carries both
//! lifecycle contracts the design calls for: the refcount the spec wants
//! callers to `incr`/`decr` explicitly *is* `Arc`'s strong count, and the
//! "must duplicate before mutating a shared value" discipline *is*
//! `Arc::make_mut` — Rust's standard copy-on-write idiom already has the
//! shape this design asks for, so mutators lean on it instead of hand
//! rolling a second refcount.
//!
//! One deliberate gap from the source text: a brand new `Arc` always
//! starts at strong count 1 (the binding returned by `new()` is itself a
//! reference), so there is no literal Rust analogue of "a fresh object at
//! refcount 0" — `refcount()` on a freshly created `Value` reports 1, not
//! 0. See `DESIGN.md`.

use crate::abstract_list::AbstractList;
use crate::list::List;
use rt_bigint::BigInt;
use std::sync::Arc;

/// A user-supplied internal-type descriptor, for internal reps this crate
/// does not know about at compile time — the open-ended "extension"
/// variant the design notes ask for in place of a void-pointer vtable.
pub trait ExternalType: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn duplicate(&self) -> Box<dyn ExternalType>;
    fn serialize(&self) -> String;
}

/// An ordered, insertion-preserving association list. Keys compare by
/// their string representation, matching the classic dict/list key
/// comparison rule; lookup is linear, which is adequate for the sizes
/// this runtime's core exercises (commands/namespaces use `HashTable`
/// instead, see `rt-collections`).
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == &key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// The typed, structured form a `Value` may hold. The "core" variants
/// enumerated by the design, plus an open-ended extension slot.
pub enum InternalRep {
    Str(Arc<str>),
    List(List),
    Dict(Dict),
    BigInteger(BigInt),
    ByteArray(Vec<u8>),
    AbstractList(Box<dyn AbstractList>),
    Extension(Box<dyn ExternalType>),
}

impl InternalRep {
    fn duplicate(&self) -> InternalRep {
        match self {
            InternalRep::Str(s) => InternalRep::Str(s.clone()),
            InternalRep::List(l) => InternalRep::List(l.clone()),
            InternalRep::Dict(d) => InternalRep::Dict(d.clone()),
            InternalRep::BigInteger(b) => InternalRep::BigInteger(b.clone()),
            InternalRep::ByteArray(b) => InternalRep::ByteArray(b.clone()),
            InternalRep::AbstractList(a) => InternalRep::AbstractList(a.duplicate()),
            InternalRep::Extension(e) => InternalRep::Extension(e.duplicate()),
        }
    }

    fn serialize(&self) -> Arc<str> {
        match self {
            InternalRep::Str(s) => s.clone(),
            InternalRep::List(l) => {
                let parts: Vec<String> = l.iter().map(|v| v.get_string().to_string()).collect();
                Arc::from(parts.join(" "))
            }
            InternalRep::Dict(d) => {
                let parts: Vec<String> = d
                    .iter()
                    .flat_map(|(k, v)| [k.get_string().to_string(), v.get_string().to_string()])
                    .collect();
                Arc::from(parts.join(" "))
            }
            InternalRep::BigInteger(b) => Arc::from(b.to_string()),
            InternalRep::ByteArray(bytes) => Arc::from(String::from_utf8_lossy(bytes).into_owned()),
            InternalRep::AbstractList(a) => {
                let parts: Vec<String> = a.get_all_elements().iter().map(|v| v.get_string().to_string()).collect();
                Arc::from(parts.join(" "))
            }
            InternalRep::Extension(e) => Arc::from(e.serialize()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            InternalRep::Str(_) => "string",
            InternalRep::List(_) => "list",
            InternalRep::Dict(_) => "dict",
            InternalRep::BigInteger(_) => "bigint",
            InternalRep::ByteArray(_) => "bytearray",
            InternalRep::AbstractList(a) => a.type_name(),
            InternalRep::Extension(e) => e.type_name(),
        }
    }
}

impl Clone for InternalRep {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

struct Inner {
    string_rep: Option<Arc<str>>,
    internal: Option<InternalRep>,
}

impl Clone for Inner {
    fn clone(&self) -> Self {
        Inner {
            string_rep: self.string_rep.clone(),
            internal: self.internal.clone(),
        }
    }
}

/// The universal reference-counted scripted value.
#[derive(Clone)]
pub struct Value(Arc<Inner>);

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Value").field(&self.get_string()).finish()
    }
}

impl std::fmt::Debug for Dict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Value {
    /// `newObj()`: a fresh value with an empty string rep and no internal
    /// rep.
    pub fn new() -> Self {
        Value(Arc::new(Inner {
            string_rep: Some(Arc::from("")),
            internal: None,
        }))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Value(Arc::new(Inner {
            string_rep: Some(Arc::from(s.into())),
            internal: None,
        }))
    }

    pub fn from_bigint(b: BigInt) -> Self {
        Value(Arc::new(Inner {
            string_rep: None,
            internal: Some(InternalRep::BigInteger(b)),
        }))
    }

    pub fn from_list(l: List) -> Self {
        Value(Arc::new(Inner {
            string_rep: None,
            internal: Some(InternalRep::List(l)),
        }))
    }

    pub fn from_dict(d: Dict) -> Self {
        Value(Arc::new(Inner {
            string_rep: None,
            internal: Some(InternalRep::Dict(d)),
        }))
    }

    /// `reference`: bump the refcount. Backed by `Arc::clone`.
    pub fn incr(&self) -> Self {
        self.clone()
    }

    /// `unreference`: drop this handle. When it was the last one, `Inner`
    /// (and whatever internal rep it owned) drops with it.
    pub fn decr(self) {
        drop(self)
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn is_shared(&self) -> bool {
        self.refcount() > 1
    }

    /// Regenerates the string rep from the internal rep's serializer if
    /// none is cached; never mutates `self`.
    pub fn get_string(&self) -> Arc<str> {
        match &self.0.string_rep {
            Some(s) => s.clone(),
            None => match &self.0.internal {
                Some(rep) => rep.serialize(),
                None => Arc::from(""),
            },
        }
    }

    /// Invalidates the internal rep.
    pub fn set_string(&mut self, s: impl Into<String>) {
        let inner = Arc::make_mut(&mut self.0);
        inner.string_rep = Some(Arc::from(s.into()));
        inner.internal = None;
    }

    pub fn get_internal_rep(&self) -> Option<&InternalRep> {
        self.0.internal.as_ref()
    }

    /// Invalidates the string rep.
    pub fn set_internal_rep(&mut self, rep: InternalRep) {
        let inner = Arc::make_mut(&mut self.0);
        inner.internal = Some(rep);
        inner.string_rep = None;
    }

    pub fn type_name(&self) -> &'static str {
        self.0.internal.as_ref().map(InternalRep::type_name).unwrap_or("string")
    }

    /// A true independent copy: a fresh `Arc` with refcount 1, sharing no
    /// storage with `self`.
    pub fn duplicate(&self) -> Value {
        Value(Arc::new((*self.0).clone()))
    }

    /// Returns a mutable handle to this value's list rep, copy-on-write.
    /// Materializes an abstract-list rep (or starts an empty list, if
    /// there was no list-shaped rep at all) on first use.
    pub fn as_list_mut(&mut self) -> &mut List {
        let needs_materialize = !matches!(self.0.internal, Some(InternalRep::List(_)));
        if needs_materialize {
            let list = match &self.0.internal {
                Some(InternalRep::AbstractList(adapter)) => adapter.materialize(),
                _ => List::new(),
            };
            log::trace!("materializing {} into a concrete list", self.type_name());
            let inner = Arc::make_mut(&mut self.0);
            inner.internal = Some(InternalRep::List(list));
            inner.string_rep = None;
        }
        let inner = Arc::make_mut(&mut self.0);
        match &mut inner.internal {
            Some(InternalRep::List(l)) => l,
            _ => unreachable!("just installed a List rep"),
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.0.internal {
            Some(InternalRep::List(l)) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match &self.0.internal {
            Some(InternalRep::Dict(d)) => Some(d),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::new()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.get_string() == other.get_string()
    }
}
impl Eq for Value {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_decr_round_trips_refcount_and_content() {
        let v = Value::from_string("hello");
        let before = v.refcount();
        let v2 = v.incr();
        assert_eq!(v.refcount(), before + 1);
        v2.decr();
        assert_eq!(v.refcount(), before);
        assert_eq!(v.get_string().as_ref(), "hello");
        assert_eq!(v.type_name(), "string");
    }

    #[test]
    fn set_string_invalidates_internal_rep() {
        let mut v = Value::from_bigint(BigInt::from_i64(42));
        assert_eq!(v.type_name(), "bigint");
        v.set_string("not a number anymore");
        assert!(v.get_internal_rep().is_none());
        assert_eq!(v.get_string().as_ref(), "not a number anymore");
    }

    #[test]
    fn set_internal_rep_invalidates_string_rep_and_regenerates_lazily() {
        let mut v = Value::from_string("123");
        v.set_internal_rep(InternalRep::BigInteger(BigInt::from_i64(123)));
        // string_rep was cleared; get_string regenerates via serialize().
        assert_eq!(v.get_string().as_ref(), "123");
    }

    #[test]
    fn mutating_a_shared_value_does_not_disturb_the_original() {
        let mut v = Value::from_list(List::new());
        v.as_list_mut().append_element(Value::from_string("1")).unwrap();
        v.as_list_mut().append_element(Value::from_string("2")).unwrap();
        v.as_list_mut().append_element(Value::from_string("3")).unwrap();

        let original = v.incr();
        assert!(v.is_shared());

        v.as_list_mut().append_element(Value::from_string("4")).unwrap();

        assert_eq!(original.as_list().unwrap().len(), 3);
        assert_eq!(v.as_list().unwrap().len(), 4);
    }

    #[test]
    fn duplicate_is_independent_and_unshared() {
        let v = Value::from_string("a");
        let shared = v.incr();
        assert!(v.is_shared());
        let dup = v.duplicate();
        assert!(!dup.is_shared());
        assert_eq!(dup.get_string(), v.get_string());
        shared.decr();
    }

    #[test]
    fn round_trip_set_then_get_string() {
        let mut v = Value::new();
        v.set_string("round trip");
        assert_eq!(v.get_string().as_ref(), "round trip");
    }
}
