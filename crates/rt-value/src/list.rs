//! `List` — a compact, cheap-to-slice list built from a two-level span
//! structure: a directory of [`Span`]s, each span a refcounted contiguous
//! run of elements. Range operations alias the directory and trim the
//! endpoint spans rather than copying elements; appends mutate the tail
//! span in place whenever this `List` holds the only reference to both the
//! directory and that span.

use crate::value::Value;
use std::sync::Arc;

/// A span's backing buffer is never grown past this many elements; once
/// full, a new span is appended instead of reallocating in place.
const MAX_SPAN_CAPACITY: usize = 1024;

/// Directory growth ceiling — mirrors the source's own "list length
/// exceeded" resource limit. Never reached by any realistic workload.
const MAX_SPAN_DIRECTORY: usize = 1 << 24;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("list length exceeded the maximum span-directory capacity")]
    LengthExceeded,
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Clone)]
struct Span {
    data: Arc<Vec<Value>>,
    first: usize,
    last: usize,
}

impl Span {
    fn singleton(value: Value) -> Self {
        Span {
            data: Arc::new(vec![value]),
            first: 0,
            last: 1,
        }
    }

    fn len(&self) -> usize {
        self.last - self.first
    }

    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    fn at_capacity(&self) -> bool {
        self.data.len() >= MAX_SPAN_CAPACITY
    }

    fn get(&self, i: usize) -> Option<&Value> {
        if i >= self.len() {
            return None;
        }
        self.data.get(self.first + i)
    }

    fn push_in_place(&mut self, value: Value) {
        Arc::get_mut(&mut self.data)
            .expect("push_in_place requires an exclusively held span")
            .push(value);
        self.last += 1;
    }
}

/// A list value: reference-counted (via the owning [`crate::Value`]),
/// copy-on-write, O(1) range slicing.
#[derive(Clone, Default)]
pub struct List {
    spans: Arc<Vec<Span>>,
    first: usize,
    last: usize,
    len_cache: usize,
}

impl List {
    pub fn new() -> Self {
        List::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut list = List::new();
        for v in values {
            list.append_element(v)
                .expect("a freshly built list never exceeds the span-directory cap");
        }
        list
    }

    pub fn len(&self) -> usize {
        self.len_cache
    }

    pub fn is_empty(&self) -> bool {
        self.len_cache == 0
    }

    fn window(&self) -> &[Span] {
        &self.spans[self.first..self.last]
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        if index >= self.len_cache {
            return None;
        }
        let mut remaining = index;
        for span in self.window() {
            let l = span.len();
            if remaining < l {
                return span.get(remaining);
            }
            remaining -= l;
        }
        None
    }

    pub fn get_elements(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            list: self,
            span_idx: self.first,
            elem_idx: 0,
        }
    }

    /// Append protocol: reuse the tail span in place when this `List`
    /// exclusively owns both the span directory and that span and it has
    /// headroom; otherwise attach a fresh span (growing the directory
    /// first if its own backing storage is full).
    pub fn append_element(&mut self, value: Value) -> Result<(), ListError> {
        let directory_shared = Arc::strong_count(&self.spans) > 1;
        let tail_reusable = !directory_shared
            && self.last > self.first
            && {
                let tail = &self.spans[self.last - 1];
                !tail.is_shared() && !tail.at_capacity()
            };

        if tail_reusable {
            let spans = Arc::get_mut(&mut self.spans).expect("checked exclusive above");
            spans[self.last - 1].push_in_place(value);
        } else {
            self.push_new_span(Span::singleton(value))?;
        }
        self.len_cache += 1;
        Ok(())
    }

    fn push_new_span(&mut self, span: Span) -> Result<(), ListError> {
        if self.last >= MAX_SPAN_DIRECTORY {
            return Err(ListError::LengthExceeded);
        }
        let directory_shared = Arc::strong_count(&self.spans) > 1;
        if directory_shared || self.last == self.spans.len() {
            // Either shared (copy the live window into a private vec) or
            // this list's tail has no free directory slot of its own.
            let mut new_spans: Vec<Span> = self.window().to_vec();
            new_spans.push(span);
            self.last = new_spans.len();
            self.first = 0;
            self.spans = Arc::new(new_spans);
        } else {
            let spans = Arc::get_mut(&mut self.spans).expect("checked exclusive above");
            spans[self.last] = span;
            self.last += 1;
        }
        Ok(())
    }

    pub fn append_list(&mut self, other: &List) -> Result<(), ListError> {
        for v in other.iter() {
            self.append_element(v.clone())?;
        }
        Ok(())
    }

    /// A shared sub-range `[start, end)`: aliases the same backing spans,
    /// trimming only the endpoint spans.
    pub fn range(&self, start: usize, end: usize) -> List {
        let start = start.min(self.len_cache);
        let end = end.min(self.len_cache).max(start);
        if start == end {
            return List::new();
        }

        let window = self.window();
        let mut prefix = 0usize;
        let mut first_span = 0usize;
        let mut first_offset = 0usize;
        let mut last_span = 0usize;
        let mut last_offset = 0usize;
        for (i, span) in window.iter().enumerate() {
            let l = span.len();
            if start >= prefix && start < prefix + l {
                first_span = i;
                first_offset = start - prefix;
            }
            if end > prefix && end <= prefix + l {
                last_span = i;
                last_offset = end - prefix;
            }
            prefix += l;
        }

        let mut spans: Vec<Span> = window[first_span..=last_span].to_vec();
        let last_idx = spans.len() - 1;
        if last_idx == 0 {
            let base = spans[0].first;
            spans[0].last = base + last_offset;
            spans[0].first = base + first_offset;
        } else {
            spans[0].first += first_offset;
            spans[last_idx].last = spans[last_idx].first + last_offset;
        }

        List {
            len_cache: end - start,
            last: spans.len(),
            spans: Arc::new(spans),
            first: 0,
        }
    }

    pub fn set_element(&mut self, index: usize, value: Value) -> Result<(), ListError> {
        if index >= self.len_cache {
            return Err(ListError::IndexOutOfRange { index, len: self.len_cache });
        }

        let mut prefix = 0usize;
        let mut target = self.first;
        let mut offset = 0usize;
        for (i, span) in self.window().iter().enumerate() {
            let l = span.len();
            if index < prefix + l {
                target = self.first + i;
                offset = index - prefix;
                break;
            }
            prefix += l;
        }

        let directory_shared = Arc::strong_count(&self.spans) > 1;
        if directory_shared || self.spans[target].is_shared() {
            let mut new_spans: Vec<Span> = self.window().to_vec();
            let local_target = target - self.first;
            let mut owned_data = (*new_spans[local_target].data).clone();
            let abs = new_spans[local_target].first + offset;
            owned_data[abs] = value;
            new_spans[local_target].data = Arc::new(owned_data);
            self.last = new_spans.len();
            self.first = 0;
            self.spans = Arc::new(new_spans);
        } else {
            let spans = Arc::get_mut(&mut self.spans).expect("checked exclusive above");
            let span = &mut spans[target];
            let abs = span.first + offset;
            Arc::get_mut(&mut span.data).expect("checked exclusive above")[abs] = value;
        }
        Ok(())
    }
}

pub struct ListIter<'a> {
    list: &'a List,
    span_idx: usize,
    elem_idx: usize,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        while self.span_idx < self.list.last {
            let span = &self.list.spans[self.span_idx];
            if self.elem_idx < span.len() {
                let v = span.get(self.elem_idx);
                self.elem_idx += 1;
                return v;
            }
            self.span_idx += 1;
            self.elem_idx = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Value {
        Value::from_string(s)
    }

    #[test]
    fn append_and_get_round_trip() {
        let mut l = List::new();
        for i in 0..2000 {
            l.append_element(v(&i.to_string())).unwrap();
        }
        assert_eq!(l.len(), 2000);
        for i in 0..2000 {
            assert_eq!(l.get(i).unwrap().get_string().as_ref(), i.to_string());
        }
    }

    #[test]
    fn append_shares_until_mutated() {
        let mut l = List::new();
        l.append_element(v("1")).unwrap();
        l.append_element(v("2")).unwrap();
        l.append_element(v("3")).unwrap();

        let snapshot = l.clone();
        l.append_element(v("4")).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(l.len(), 4);
        assert_eq!(snapshot.get_elements().iter().map(|v| v.get_string().to_string()).collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn range_aliases_without_copying_elements() {
        let l = List::from_values((0..10).map(|i| v(&i.to_string())));
        let mid = l.range(3, 7);
        assert_eq!(mid.len(), 4);
        assert_eq!(mid.get_elements().iter().map(|v| v.get_string().to_string()).collect::<Vec<_>>(), vec!["3", "4", "5", "6"]);
    }

    #[test]
    fn set_element_does_not_disturb_other_holders() {
        let mut l = List::from_values((0..5).map(|i| v(&i.to_string())));
        let snapshot = l.clone();
        l.set_element(2, v("X")).unwrap();
        assert_eq!(l.get(2).unwrap().get_string().as_ref(), "X");
        assert_eq!(snapshot.get(2).unwrap().get_string().as_ref(), "2");
    }

    #[test]
    fn out_of_range_set_is_an_error() {
        let mut l = List::from_values(vec![v("a")]);
        assert!(matches!(l.set_element(5, v("z")), Err(ListError::IndexOutOfRange { .. })));
    }
}
