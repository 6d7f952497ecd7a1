//! Bookkeeping for in-flight background refreshes.
//!
//! At most one refresh per key runs at a time. The marker set is sharded the
//! same way the cache's pending-load table is, so unrelated keys rarely share a
//! lock.

use std::collections::HashSet;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

pub(crate) struct InFlight {
  shards: Box<[CachePadded<Mutex<HashSet<String, ahash::RandomState>>>]>,
  hasher: ahash::RandomState,
}

impl fmt::Debug for InFlight {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InFlight")
      .field("num_shards", &self.shards.len())
      .field("pending", &self.len())
      .finish()
  }
}

impl InFlight {
  pub(crate) fn new(num_shards: usize) -> Self {
    let num_shards = num_shards.max(1).next_power_of_two();
    let hasher = ahash::RandomState::new();
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(Mutex::new(HashSet::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>()
      .into_boxed_slice();
    Self { shards, hasher }
  }

  /// Default shard count, scaled to the machine like the cache store.
  pub(crate) fn with_default_shards() -> Self {
    Self::new(num_cpus::get() * 4)
  }

  #[inline]
  fn shard_index(&self, key: &str) -> usize {
    self.hasher.hash_one(key) as usize & (self.shards.len() - 1)
  }

  /// Marks `key` as refreshing if no refresh for it is running.
  ///
  /// Returns a permit that clears the marker when dropped, or `None` if a
  /// refresh for this key is already in flight.
  pub(crate) fn try_acquire(self: &Arc<Self>, key: &str) -> Option<RefreshPermit> {
    let index = self.shard_index(key);
    let mut pending = self.shards[index].lock();
    if pending.contains(key) {
      return None;
    }
    pending.insert(key.to_owned());
    Some(RefreshPermit {
      in_flight: Arc::clone(self),
      index,
      key: key.to_owned(),
    })
  }

  pub(crate) fn contains(&self, key: &str) -> bool {
    self.shards[self.shard_index(key)].lock().contains(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.lock().len()).sum()
  }
}

/// Ownership of one key's in-flight marker.
///
/// The marker is removed when the permit is dropped: after the refresh
/// completes, fails, panics, or if the task is never run.
pub(crate) struct RefreshPermit {
  in_flight: Arc<InFlight>,
  index: usize,
  key: String,
}

impl RefreshPermit {
  pub(crate) fn key(&self) -> &str {
    &self.key
  }
}

impl fmt::Debug for RefreshPermit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RefreshPermit").field("key", &self.key).finish()
  }
}

impl Drop for RefreshPermit {
  fn drop(&mut self) {
    self.in_flight.shards[self.index].lock().remove(&self.key);
  }
}
