//! Abstract lists — internal reps that present a list-shaped interface
//! without materializing an element array.
//!
//! Per the open question on inconsistent adapters: `length` is always
//! treated as authoritative and every index/slice request clamps to it,
//! rather than trusting whatever `get_all_elements` happens to produce.

use crate::list::List;
use crate::value::Value;
use rt_bigint::BigInt;
use std::sync::Arc;

pub trait AbstractList: Send + Sync {
    fn length(&self) -> usize;
    fn index(&self, i: usize) -> Option<Value>;
    fn slice(&self, start: usize, end: usize) -> Box<dyn AbstractList>;
    fn reverse(&self) -> Box<dyn AbstractList>;
    fn duplicate(&self) -> Box<dyn AbstractList>;
    fn type_name(&self) -> &'static str;

    /// Clamped default: every element in `0..length()`, via `index`.
    fn get_all_elements(&self) -> Vec<Value> {
        (0..self.length()).filter_map(|i| self.index(i)).collect()
    }

    /// Fall back used whenever a caller wants to mutate an abstract list:
    /// build a real [`List`] holding the same (clamped) elements.
    fn materialize(&self) -> List {
        List::from_values(self.get_all_elements())
    }
}

fn clamp_range(start: usize, end: usize, length: usize) -> (usize, usize) {
    let start = start.min(length);
    let end = end.min(length).max(start);
    (start, end)
}

/// `(start, step, length)` — produces `start + step*i` on index `i`.
#[derive(Clone, Debug)]
pub struct ArithmeticProgression {
    pub start: i64,
    pub step: i64,
    pub length: usize,
}

impl AbstractList for ArithmeticProgression {
    fn length(&self) -> usize {
        self.length
    }

    fn index(&self, i: usize) -> Option<Value> {
        if i >= self.length {
            return None;
        }
        let n = self.start.wrapping_add(self.step.wrapping_mul(i as i64));
        Some(Value::from_bigint(BigInt::from_i64(n)))
    }

    fn slice(&self, start: usize, end: usize) -> Box<dyn AbstractList> {
        let (start, end) = clamp_range(start, end, self.length);
        Box::new(ArithmeticProgression {
            start: self.start.wrapping_add(self.step.wrapping_mul(start as i64)),
            step: self.step,
            length: end - start,
        })
    }

    fn reverse(&self) -> Box<dyn AbstractList> {
        let last_index = self.length.saturating_sub(1);
        let new_start = self.start.wrapping_add(self.step.wrapping_mul(last_index as i64));
        Box::new(ArithmeticProgression {
            start: new_start,
            step: self.step.wrapping_neg(),
            length: self.length,
        })
    }

    fn duplicate(&self) -> Box<dyn AbstractList> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        "abstractlist:arithseries"
    }
}

/// A generic materialized view, used as the fallback target for `slice`
/// and `reverse` on adapters without a closed-form transform.
#[derive(Clone)]
struct MaterializedList(List);

impl AbstractList for MaterializedList {
    fn length(&self) -> usize {
        self.0.len()
    }

    fn index(&self, i: usize) -> Option<Value> {
        self.0.get(i).cloned()
    }

    fn slice(&self, start: usize, end: usize) -> Box<dyn AbstractList> {
        let (start, end) = clamp_range(start, end, self.length());
        Box::new(MaterializedList(self.0.range(start, end)))
    }

    fn reverse(&self) -> Box<dyn AbstractList> {
        let mut elements = self.0.get_elements();
        elements.reverse();
        Box::new(MaterializedList(List::from_values(elements)))
    }

    fn duplicate(&self) -> Box<dyn AbstractList> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        "abstractlist:materialized"
    }
}

/// `(inner, repetitions)` — produces `inner[i % inner.len()]`.
#[derive(Clone)]
pub struct Repeated {
    pub inner: Arc<List>,
    pub repetitions: usize,
}

impl AbstractList for Repeated {
    fn length(&self) -> usize {
        self.inner.len() * self.repetitions
    }

    fn index(&self, i: usize) -> Option<Value> {
        if i >= self.length() || self.inner.is_empty() {
            return None;
        }
        self.inner.get(i % self.inner.len()).cloned()
    }

    fn slice(&self, start: usize, end: usize) -> Box<dyn AbstractList> {
        let (start, end) = clamp_range(start, end, self.length());
        MaterializedList(self.materialize()).slice(start, end)
    }

    fn reverse(&self) -> Box<dyn AbstractList> {
        MaterializedList(self.materialize()).reverse()
    }

    fn duplicate(&self) -> Box<dyn AbstractList> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        "abstractlist:repeated"
    }
}

/// Produces the lowercase hex string of the index itself.
#[derive(Clone, Copy, Debug)]
pub struct HexIndex {
    pub length: usize,
}

impl AbstractList for HexIndex {
    fn length(&self) -> usize {
        self.length
    }

    fn index(&self, i: usize) -> Option<Value> {
        if i >= self.length {
            return None;
        }
        Some(Value::from_string(format!("{i:x}")))
    }

    fn slice(&self, start: usize, end: usize) -> Box<dyn AbstractList> {
        let (start, end) = clamp_range(start, end, self.length);
        MaterializedList(self.materialize()).slice(start, end)
    }

    fn reverse(&self) -> Box<dyn AbstractList> {
        MaterializedList(self.materialize()).reverse()
    }

    fn duplicate(&self) -> Box<dyn AbstractList> {
        Box::new(*self)
    }

    fn type_name(&self) -> &'static str {
        "abstractlist:indexhex"
    }
}
