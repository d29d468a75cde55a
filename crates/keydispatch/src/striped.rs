// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

/// A fixed-size pool of mutexes addressed by key hash.
///
/// `StripedLock` maps any hashable key to one of `N` fixed mutexes via `hash(key) mod N`. It gives
/// independent keys independent locks while keeping the number of underlying mutexes bounded,
/// regardless of how many distinct keys are ever seen. Two different keys may occasionally map to
/// the same stripe (a collision); when that happens, operations on those keys are serialized
/// against each other even though nothing required it. Callers that need a guaranteed-correct
/// compound operation over a per-key resource can rely on the stripe to provide that atomicity;
/// the eventual unrelated serialization on collision is a throughput cost, not a correctness one.
///
/// # Thread safety
///
/// `StripedLock` is `Send + Sync` and meant to be shared across threads via `Arc` or as a field of
/// a larger shared structure. The mapping from key to stripe index is a pure function of the key's
/// hash and the stripe count, so it never changes for the lifetime of a given `StripedLock`.
#[derive(Debug)]
pub struct StripedLock {
    stripes: Box<[Mutex<()>]>,
}

impl StripedLock {
    /// Creates a pool sized to comfortably serve `expected_concurrency` concurrent callers.
    ///
    /// The actual stripe count is rounded up to the next power of two (a minimum of one stripe),
    /// which keeps the `hash mod N` reduction to a cheap bitmask.
    #[must_use]
    pub fn new(expected_concurrency: usize) -> Self {
        let count = expected_concurrency.max(1).next_power_of_two();
        let stripes = (0..count).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// The number of stripes backing this lock.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Computes the stripe index a given key is assigned to.
    ///
    /// This is stable: calling it twice with an equal key (even from different threads, even
    /// using unrelated `StripedLock` instances created with the same stripe count) always yields
    /// the same index, because it depends only on the key's hash and the stripe count.
    #[must_use]
    pub fn index_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.stripes.len() - 1)
    }

    /// Locks the stripe a key is assigned to, blocking until it is available.
    pub fn lock_for<K: Hash + ?Sized>(&self, key: &K) -> StripeGuard<'_> {
        let index = self.index_for(key);
        StripeGuard(self.stripes[index].lock())
    }
}

/// An RAII guard holding one stripe of a [`StripedLock`].
///
/// The stripe is released automatically when this guard is dropped.
#[derive(Debug)]
pub struct StripeGuard<'a>(MutexGuard<'a, ()>);
