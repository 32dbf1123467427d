//! Per-key mutual exclusion.
//!
//! Every key (an account number, a user) gets its own mutex, created on first
//! use and kept in a sharded map. Work on one key is serialized; work on
//! different keys only shares the map shard for the lookup.

use crate::account::AccountNumber;
use crate::user::UserId;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::hash::Hash;
use std::sync::Arc;

/// What a service serializes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Account(AccountNumber),
    User(UserId),
}

/// One mutex per key.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    slots: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        KeyedLocks {
            slots: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `key` is free, then holds it until the guard drops.
    pub fn lock(&self, key: K) -> KeyGuard {
        // Clone the slot out so the shard is released before blocking.
        let slot = self.slots.entry(key).or_default().clone();
        KeyGuard {
            _held: slot.lock_arc(),
        }
    }

    #[cfg(test)]
    fn is_locked(&self, key: &K) -> bool {
        self.slots.get(key).map_or(false, |slot| slot.is_locked())
    }
}

/// Releases its key on drop.
pub struct KeyGuard {
    _held: ArcMutexGuard<RawMutex, ()>,
}
