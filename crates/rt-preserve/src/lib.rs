//! Preserve / release — a deferred-free protocol that lets a function hand
//! a pointer to a caller who may reenter and free it before the original
//! call returns.
//!
//! The registry is a mutex-guarded, linearly-scanned [`rt_collections::BrodnikArray`]
//! of entries, exactly as the design notes describe the source's own
//! structure (a concurrent hash set indexed by pointer is flagged there as
//! an equally valid alternative, but the array is what this is grounded
//! on). `P` stands in for "pointer": any small `Copy + Eq` identity a
//! caller can derive from the thing it wants protected (an address cast
//! to `usize`, an arena index, ...).

use parking_lot::Mutex;
use rt_collections::BrodnikArray;

type FreeFn<P> = Box<dyn FnOnce(P) + Send>;

struct Entry<P> {
    ptr: P,
    count: usize,
    eventually_free: Option<FreeFn<P>>,
}

/// A process-wide (or, for testing, locally scoped) preserve/release
/// registry for pointer-identity `P`.
pub struct Registry<P> {
    entries: Mutex<BrodnikArray<Entry<P>>>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Registry {
            entries: Mutex::new(BrodnikArray::new()),
        }
    }
}

impl<P: Copy + Eq> Registry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(entries: &BrodnikArray<Entry<P>>, p: P) -> Option<usize> {
        (0..entries.len()).find(|&i| entries.at(i).unwrap().ptr == p)
    }

    /// Increments the preserve count for `p`, creating an entry at count 1
    /// if absent.
    pub fn preserve(&self, p: P) {
        let mut entries = self.entries.lock();
        match Self::find(&entries, p) {
            Some(i) => entries.at_mut(i).unwrap().count += 1,
            None => entries.append(Entry {
                ptr: p,
                count: 1,
                eventually_free: None,
            }),
        }
    }

    /// Decrements the preserve count for `p`. If it reaches zero, removes
    /// the entry and — if an `eventuallyFree` callback had been
    /// registered — runs it after removal, so a reentrant `preserve` of
    /// the same `p` inside the callback starts from a clean slate.
    pub fn release(&self, p: P) {
        let mut entries = self.entries.lock();
        let Some(i) = Self::find(&entries, p) else {
            log::debug!("release of untracked pointer ignored");
            return;
        };
        entries.at_mut(i).unwrap().count -= 1;
        if entries.at(i).unwrap().count != 0 {
            return;
        }
        let removed = entries.swap_remove(i);
        drop(entries);
        if let Some(callback) = removed.eventually_free {
            callback(p);
        }
    }

    /// Runs `f(p)` once `p` has no live preservers. If `p` is not
    /// currently preserved, runs `f` immediately; otherwise records it
    /// against the entry, overwriting any previously recorded callback.
    pub fn eventually_free(&self, p: P, f: impl FnOnce(P) + Send + 'static) {
        let mut entries = self.entries.lock();
        match Self::find(&entries, p) {
            Some(i) => entries.at_mut(i).unwrap().eventually_free = Some(Box::new(f)),
            None => {
                drop(entries);
                f(p);
            }
        }
    }

    /// Current preserve count for `p` (0 if untracked). Test/debug only.
    pub fn preserve_count(&self, p: P) -> usize {
        let entries = self.entries.lock();
        Self::find(&entries, p).map(|i| entries.at(i).unwrap().count).unwrap_or(0)
    }
}

/// A weak reference token: carries a nullable pointer and its own
/// refcount, independent of the pointee's lifetime. Dereferencing after
/// the backing block is freed yields `None`, never undefined behavior.
pub struct Handle<P> {
    ptr: Option<P>,
    refcount: usize,
}

impl<P: Copy> Handle<P> {
    pub fn new(ptr: P) -> Self {
        Handle { ptr: Some(ptr), refcount: 0 }
    }

    pub fn get(&self) -> Option<P> {
        self.ptr
    }

    /// Called when the pointee is freed: nulls the pointer, leaving the
    /// handle's own block alive until its refcount also drops to zero.
    pub fn free(&mut self) {
        self.ptr = None;
    }

    pub fn preserve(&mut self) {
        self.refcount += 1;
    }

    /// Returns `true` once the backing block may be reclaimed: the
    /// pointer is null and no one still holds a reference to the handle
    /// itself.
    pub fn release(&mut self) -> bool {
        self.refcount = self.refcount.saturating_sub(1);
        self.ptr.is_none() && self.refcount == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn eventually_free_runs_immediately_with_no_preservers() {
        let registry: Registry<usize> = Registry::new();
        let freed = Arc::new(AtomicBool::new(false));
        let freed2 = freed.clone();
        registry.eventually_free(42, move |_| freed2.store(true, Ordering::SeqCst));
        assert!(freed.load(Ordering::SeqCst));
    }

    #[test]
    fn eventually_free_waits_for_matched_release() {
        let registry: Registry<usize> = Registry::new();
        registry.preserve(7);
        registry.preserve(7);

        let freed = Arc::new(AtomicBool::new(false));
        let freed2 = freed.clone();
        registry.eventually_free(7, move |_| freed2.store(true, Ordering::SeqCst));

        registry.release(7);
        assert!(!freed.load(Ordering::SeqCst), "one preserver still outstanding");

        registry.release(7);
        assert!(freed.load(Ordering::SeqCst));
    }

    #[test]
    fn unmatched_preserve_prevents_free() {
        let registry: Registry<usize> = Registry::new();
        registry.preserve(1);
        let freed = Arc::new(AtomicBool::new(false));
        let freed2 = freed.clone();
        registry.eventually_free(1, move |_| freed2.store(true, Ordering::SeqCst));
        // No release ever happens.
        assert!(!freed.load(Ordering::SeqCst));
        assert_eq!(registry.preserve_count(1), 1);
    }

    #[test]
    fn reentrant_preserve_inside_callback_is_independent() {
        let registry = Arc::new(Registry::<usize>::new());
        let reentered = Arc::new(AtomicUsize::new(0));

        let registry2 = registry.clone();
        let reentered2 = reentered.clone();
        registry.preserve(9);
        registry.eventually_free(9, move |p| {
            registry2.preserve(p);
            reentered2.store(registry2.preserve_count(p), Ordering::SeqCst);
            registry2.release(p);
        });
        registry.release(9);

        assert_eq!(reentered.load(Ordering::SeqCst), 1);
        assert_eq!(registry.preserve_count(9), 0);
    }

    #[test]
    fn handle_nulls_on_free_and_reclaims_when_unreferenced() {
        let mut h = Handle::new(100usize);
        h.preserve();
        assert_eq!(h.get(), Some(100));
        h.free();
        assert_eq!(h.get(), None);
        assert!(h.release());
    }
}
