//! Create-once concurrent map
//!
//! A mutex-guarded map whose values are boxed and never removed, so a
//! reference handed out by [`ConcurrentCreateOnceMap::get_or_create`] stays
//! valid for as long as the map itself. Each key goes from absent to present
//! exactly once.
//!
//! References are shared across threads, so the map is `Sync` only when its
//! values are:
//!
//! ```compile_fail
//! use std::cell::Cell;
//! use otter_vm_profile::ConcurrentCreateOnceMap;
//!
//! let map = ConcurrentCreateOnceMap::<u32, Cell<u64>>::new();
//! std::thread::scope(|scope| {
//!     scope.spawn(|| {
//!         // Error: `Cell<u64>` cannot be shared between threads safely
//!         let (cell, _) = map.get_or_create(0, || Cell::new(0));
//!         cell.set(cell.get() + 1);
//!     });
//! });
//! ```

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Concurrent associative structure with a single atomic get-or-create.
pub struct ConcurrentCreateOnceMap<K, V> {
    entries: Mutex<FxHashMap<K, Box<V>>>,
    created: AtomicUsize,
    // `&V` escapes the lock, so `Sync` must also require `V: Sync`.
    _shared: PhantomData<V>,
}

impl<K, V> ConcurrentCreateOnceMap<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            created: AtomicUsize::new(0),
            _shared: PhantomData,
        }
    }

    /// Return the value for `key`, creating it with `create` if absent.
    ///
    /// `create` runs while the map's lock is held and must not touch this map.
    /// The boolean is `true` for the single caller that created the value.
    #[allow(unsafe_code)]
    pub fn get_or_create(&self, key: K, create: impl FnOnce() -> V) -> (&V, bool) {
        let (ptr, created): (*const V, bool) = {
            let mut entries = self.entries.lock();
            let mut created = false;
            let boxed = entries.entry(key).or_insert_with(|| {
                created = true;
                Box::new(create())
            });
            (&**boxed as *const V, created)
        };

        if created {
            self.created.fetch_add(1, Ordering::Relaxed);
        }

        // SAFETY: values are boxed, so rehashing never moves them, and no API
        // removes or replaces an entry through `&self`. The box therefore lives
        // until the map is dropped or mutably borrowed, both of which the
        // borrow of `self` rules out for the returned lifetime.
        (unsafe { &*ptr }, created)
    }

    /// Return the value for `key` without creating it
    #[allow(unsafe_code)]
    pub fn get(&self, key: &K) -> Option<&V> {
        let ptr: *const V = {
            let entries = self.entries.lock();
            &**entries.get(key)? as *const V
        };

        // SAFETY: see `get_or_create`.
        Some(unsafe { &*ptr })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of values ever created
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Collect `f(key, value)` for every entry while holding the lock
    pub fn collect<T>(&self, mut f: impl FnMut(&K, &V) -> T) -> Vec<T> {
        let entries = self.entries.lock();
        entries.iter().map(|(key, value)| f(key, value)).collect()
    }
}

impl<K, V> Default for ConcurrentCreateOnceMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn creates_each_key_once() {
        let map = ConcurrentCreateOnceMap::<u32, String>::new();
        let (first, created) = map.get_or_create(1, || "one".to_string());
        assert!(created);
        let first = first as *const String;

        let (again, created) = map.get_or_create(1, || unreachable!("key already present"));
        assert!(!created);
        assert!(std::ptr::eq(first, again));
        assert_eq!(map.created_count(), 1);
    }

    #[test]
    fn references_survive_rehash() {
        let map = ConcurrentCreateOnceMap::<u32, u64>::new();
        let (early, _) = map.get_or_create(0, || 7);
        for key in 1..1024 {
            map.get_or_create(key, || key as u64);
        }
        assert_eq!(*early, 7);
        assert_eq!(map.len(), 1024);
        assert!(std::ptr::eq(early, map.get(&0).unwrap()));
    }

    #[test]
    fn get_does_not_create() {
        let map = ConcurrentCreateOnceMap::<u32, u32>::new();
        assert!(map.get(&3).is_none());
        assert!(map.is_empty());
        assert_eq!(map.created_count(), 0);
    }

    #[test]
    fn sync_follows_value_type() {
        fn assert_send_sync<T: Send + Sync>() {}
        fn assert_send<T: Send>() {}

        assert_send_sync::<ConcurrentCreateOnceMap<u32, AtomicUsize>>();
        assert_send::<ConcurrentCreateOnceMap<u32, std::cell::Cell<u64>>>();
    }

    #[test]
    fn racing_creators_converge() {
        const THREADS: usize = 8;
        let map = ConcurrentCreateOnceMap::<&'static str, AtomicUsize>::new();
        let barrier = Barrier::new(THREADS);

        let addresses: Vec<usize> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(THREADS);
            for _ in 0..THREADS {
                handles.push(scope.spawn(|| {
                    barrier.wait();
                    let (value, _) = map.get_or_create("site", || AtomicUsize::new(0));
                    value.fetch_add(1, Ordering::Relaxed);
                    value as *const AtomicUsize as usize
                }));
            }
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(addresses.iter().all(|&addr| addr == addresses[0]));
        assert_eq!(map.created_count(), 1);
        assert_eq!(
            map.get(&"site").unwrap().load(Ordering::Relaxed),
            THREADS
        );
    }
}
