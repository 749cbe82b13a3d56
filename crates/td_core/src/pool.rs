//! Generic free-list recycler for short-lived objects.
//!
//! Objects are handed out by key rather than by value: the pool keeps every
//! active object in a generational [`SlotMap`], so a key that was already
//! released can never release a later occupant of the same slot, and a
//! double release is detected instead of corrupting the free list.
//!
//! The free list is capacity-bounded. Once it holds `max_size` objects,
//! further releases drop the object, letting pressure shed to normal
//! deallocation instead of growing the pool without limit.

use serde::Serialize;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key of an object currently handed out by an [`ObjectPool`].
    pub struct PooledKey;
}

/// Pool accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Objects currently handed out.
    pub active: usize,
    /// Objects waiting in the free list.
    pub available: usize,
    /// Objects produced by the factory over the pool's lifetime.
    pub created: usize,
    /// Acquisitions satisfied from the free list.
    pub reused: usize,
}

/// A capacity-bounded object pool.
pub struct ObjectPool<T> {
    factory: Box<dyn FnMut() -> T>,
    reset: Box<dyn FnMut(&mut T)>,
    max_size: usize,
    free: Vec<T>,
    active: SlotMap<PooledKey, T>,
    created: usize,
    reused: usize,
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("max_size", &self.max_size)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<T> ObjectPool<T> {
    /// Create a pool.
    ///
    /// `reset` runs on every released object before it re-enters the free
    /// list. `max_size` bounds the free list, not the number of active objects.
    pub fn new(
        factory: impl FnMut() -> T + 'static,
        reset: impl FnMut(&mut T) + 'static,
        max_size: usize,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            reset: Box::new(reset),
            max_size,
            free: Vec::with_capacity(max_size),
            active: SlotMap::with_key(),
            created: 0,
            reused: 0,
        }
    }

    /// Fill the free list with up to `count` fresh objects (bounded by `max_size`).
    pub fn prewarm(&mut self, count: usize) {
        let target = count.min(self.max_size);
        while self.free.len() < target {
            let object = (self.factory)();
            self.created += 1;
            self.free.push(object);
        }
    }

    /// Hand out an object, reusing a free one when possible.
    pub fn acquire(&mut self) -> PooledKey {
        let object = if let Some(object) = self.free.pop() {
            self.reused += 1;
            object
        } else {
            self.created += 1;
            (self.factory)()
        };
        self.active.insert(object)
    }

    /// Hand out an object and initialise it in one step.
    pub fn acquire_with(&mut self, init: impl FnOnce(&mut T)) -> PooledKey {
        let key = self.acquire();
        if let Some(object) = self.active.get_mut(key) {
            init(object);
        }
        key
    }

    /// Shared access to an active object.
    #[must_use]
    pub fn get(&self, key: PooledKey) -> Option<&T> {
        self.active.get(key)
    }

    /// Mutable access to an active object.
    pub fn get_mut(&mut self, key: PooledKey) -> Option<&mut T> {
        self.active.get_mut(key)
    }

    /// Whether `key` refers to an object currently handed out.
    #[must_use]
    pub fn is_active(&self, key: PooledKey) -> bool {
        self.active.contains_key(key)
    }

    /// Return an object to the pool.
    ///
    /// Releasing a key that is not active is a no-op and returns `false`.
    pub fn release(&mut self, key: PooledKey) -> bool {
        let Some(mut object) = self.active.remove(key) else {
            tracing::warn!(?key, "Released an object the pool does not consider active");
            return false;
        };
        (self.reset)(&mut object);
        if self.free.len() < self.max_size {
            self.free.push(object);
        } else {
            tracing::trace!(max_size = self.max_size, "Pool at capacity, dropping object");
        }
        true
    }

    /// Iterate over active objects.
    pub fn iter_active(&self) -> impl Iterator<Item = (PooledKey, &T)> {
        self.active.iter()
    }

    /// Keys of active objects matching `predicate`, for sweep-and-release.
    pub fn active_keys_where(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<PooledKey> {
        self.active
            .iter()
            .filter(|(_, object)| predicate(object))
            .map(|(key, _)| key)
            .collect()
    }

    /// Forget every object without resetting it.
    ///
    /// Bookkeeping only: callers owning real resources must tear them down
    /// before calling this. Lifetime counters are kept.
    pub fn clear(&mut self) {
        self.active.clear();
        self.free.clear();
    }

    /// Current accounting.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.len(),
            available: self.free.len(),
            created: self.created,
            reused: self.reused,
        }
    }

    /// Maximum free-list length.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}
