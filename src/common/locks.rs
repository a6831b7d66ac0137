//! Per-session in-progress markers.
//!
//! A turn or a navigation claims its session key for the duration of the call. A second
//! claim on the same key is refused instead of queued; callers are expected to serialize
//! their own traffic per session and this detects when they do not.

use std::{
    collections::HashSet,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

/// Set of keys currently being worked on.
pub struct InProgress<K> {
    active: Mutex<HashSet<K>>,
}

impl<K> Default for InProgress<K> {
    fn default() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }
}

impl<K> InProgress<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `key`. Returns `None` when another holder already has it.
    pub fn try_acquire(
        self: &Arc<Self>,
        key: &K,
    ) -> Option<InProgressGuard<K>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(InProgressGuard {
            owner: self.clone(),
            key: key.clone(),
        })
    }

    pub fn is_held(
        &self,
        key: &K,
    ) -> bool {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).contains(key)
    }

    fn release(
        &self,
        key: &K,
    ) {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }
}

/// Releases the claim on drop.
pub struct InProgressGuard<K>
where
    K: Hash + Eq + Clone,
{
    owner: Arc<InProgress<K>>,
    key: K,
}

impl<K> Drop for InProgressGuard<K>
where
    K: Hash + Eq + Clone,
{
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}
