use crate::builder::CacheBuilder;
use crate::codec::{BincodeCodec, Codec};
use crate::config::CacheConfig;
use crate::driver::{Driver, Record};
use crate::error::{BoxError, Error, Result};
use crate::key::{canonicalize, CacheKey};
use crate::metrics::{bump, Metrics, MetricsSnapshot};
use crate::refresh::InFlight;
use crate::runtime::TaskSpawner;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// How a driver record relates to the cache's freshness policy.
#[derive(Debug)]
enum Lookup {
  /// Remaining TTL at or above the soft threshold.
  Fresh(Record),
  /// Remaining TTL below the soft threshold but still positive.
  Stale(Record),
  /// Absent, errored, or expired.
  Miss,
}

/// The internal, thread-safe core of a cache.
pub(crate) struct CacheShared<C> {
  pub(crate) name: String,
  pub(crate) config: CacheConfig,
  pub(crate) codec: C,
  pub(crate) driver: Arc<dyn Driver>,
  pub(crate) spawner: Arc<dyn TaskSpawner>,
  pub(crate) in_flight: Arc<InFlight>,
  pub(crate) metrics: Metrics,
}

impl<C> fmt::Debug for CacheShared<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("name", &self.name)
      .field("config", &self.config)
      .field("in_flight", &self.in_flight)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<C: Codec> CacheShared<C> {
  fn lookup(&self, key: &str) -> Lookup {
    match self.driver.get(&self.name, key) {
      Ok(record) if record.ttl.is_zero() => {
        // The backend kept the record past its lifetime.
        tracing::debug!(cache = %self.name, key, "record reported with zero ttl, treating as miss");
        Lookup::Miss
      }
      Ok(record) if record.ttl >= self.config.soft_threshold() => Lookup::Fresh(record),
      Ok(record) => Lookup::Stale(record),
      Err(err) => {
        if !err.is_not_found() {
          tracing::debug!(cache = %self.name, key, error = %err, "driver get failed, treating as miss");
        }
        Lookup::Miss
      }
    }
  }

  /// Runs a fetch function, counting calls and failures.
  fn run_fetch<K, V, F, E>(&self, key: K, fetch: F) -> Result<V>
  where
    F: FnOnce(K) -> Result<V, E>,
    E: Into<BoxError>,
  {
    bump(&self.metrics.fetches);
    fetch(key).map_err(|err| {
      bump(&self.metrics.fetch_errors);
      Error::Fetch(err.into())
    })
  }

  /// Encodes `value` and writes it with the full lifetime.
  fn store<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
    let payload = self.codec.encode(value)?;
    self.driver.set(&self.name, key, &payload, self.config.lifetime)?;
    Ok(())
  }

  /// Background half of a stale read: fetch, encode, store.
  fn refresh<K, V, F, E>(&self, key: &str, id: K, fetch: F) -> Result<()>
  where
    V: Serialize,
    F: FnOnce(K) -> Result<V, E>,
    E: Into<BoxError>,
  {
    let value = self.run_fetch(id, fetch)?;
    self.store(key, &value)
  }
}

/// A named cache with stale-while-revalidate semantics over a storage driver.
///
/// Reads classify the stored record by its remaining time-to-live:
///
/// - at or above `lifetime - fresh_for`: **fresh**, returned as-is;
/// - below that but positive: **stale**, returned immediately while one
///   background refresh for the key is dispatched;
/// - absent, errored, or expired: **miss**, filled synchronously.
///
/// `Cache` is a cheap handle; clones share the same state.
pub struct Cache<C = BincodeCodec> {
  pub(crate) shared: Arc<CacheShared<C>>,
}

impl<C> Clone for Cache<C> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<C> fmt::Debug for Cache<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl Cache<BincodeCodec> {
  /// Shorthand for [`CacheBuilder::new`].
  pub fn builder(name: impl Into<String>) -> CacheBuilder<BincodeCodec> {
    CacheBuilder::new(name)
  }
}

impl<C> Cache<C> {
  /// The immutable name this cache was built with.
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn config(&self) -> &CacheConfig {
    &self.shared.config
  }

  /// The configured fresh window.
  pub fn fresh_for(&self) -> Duration {
    self.shared.config.fresh_for
  }

  /// The lifetime of every record this cache writes.
  pub fn lifetime(&self) -> Duration {
    self.shared.config.lifetime
  }

  pub fn tags(&self) -> &BTreeSet<String> {
    &self.shared.config.tags
  }

  pub fn has_tag(&self, tag: &str) -> bool {
    self.shared.config.tags.contains(tag)
  }

  /// Returns a snapshot of this cache's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Number of background refreshes currently in flight.
  pub fn pending_refreshes(&self) -> usize {
    self.shared.in_flight.len()
  }

  /// Whether a background refresh for `key` is in flight.
  pub fn is_refreshing<K: CacheKey + ?Sized>(&self, key: &K) -> bool {
    self.shared.in_flight.contains(&canonicalize(key))
  }

  /// Removes one key from the backend.
  pub fn invalidate<K: CacheKey + ?Sized>(&self, key: &K) -> Result<()> {
    let key = canonicalize(key);
    self.shared.driver.invalidate(&self.shared.name, &key)?;
    bump(&self.shared.metrics.invalidations);
    tracing::debug!(cache = %self.shared.name, key = %key, "invalidated key");
    Ok(())
  }

  /// Removes every record of this cache from the backend.
  pub fn invalidate_all(&self) {
    self.shared.driver.invalidate_all(&self.shared.name);
    bump(&self.shared.metrics.invalidations);
    tracing::debug!(cache = %self.shared.name, "invalidated all keys");
  }

  /// Invalidates the whole cache if any of `tags` is one of its tags.
  ///
  /// Returns whether the cache matched. A cache without a matching tag makes
  /// no driver call.
  pub fn invalidate_tags<I, S>(&self, tags: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let matched = tags.into_iter().any(|tag| self.has_tag(tag.as_ref()));
    if matched {
      self.invalidate_all();
    }
    matched
  }
}

impl<C: Codec> Cache<C> {
  /// Looks up `key` and decodes the value into `dst`.
  ///
  /// A fresh record is decoded directly. A stale record is decoded directly
  /// and `fetch` is handed to the spawner to refresh it, unless a refresh for
  /// the same key is already running. On a miss, `fetch` runs on the calling
  /// thread, its value is stored with the full lifetime, read back through
  /// the driver and decoded.
  ///
  /// A fetch failure leaves `dst` untouched and is returned as
  /// [`Error::Fetch`] carrying the fetch function's own error. After any
  /// other error, `dst` must be treated as unspecified.
  ///
  /// `key` is taken by value and must be `'static` because a stale read
  /// moves it into the background refresh. Pass an owned key, such as
  /// `name.clone()` rather than `&name`:
  ///
  /// ```
  /// use fibre_swr::driver::memory::MemoryDriver;
  /// use fibre_swr::CacheBuilder;
  /// use std::convert::Infallible;
  ///
  /// let cache = CacheBuilder::new("lengths").driver(MemoryDriver::new()).build().unwrap();
  /// let name = String::from("alice");
  /// let mut len = 0usize;
  /// cache
  ///   .get(name.clone(), &mut len, |n: String| Ok::<_, Infallible>(n.len()))
  ///   .unwrap();
  /// assert_eq!(len, 5);
  /// ```
  pub fn get<K, V, F, E>(&self, key: K, dst: &mut V, fetch: F) -> Result<()>
  where
    K: CacheKey + Send + 'static,
    V: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce(K) -> Result<V, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let payload = self.load(key, fetch)?;
    self.shared.codec.decode(&payload, dst)?;
    Ok(())
  }

  /// Like [`get`](Cache::get), but returns the decoded value.
  pub fn fetch<K, V, F, E>(&self, key: K, fetch: F) -> Result<V>
  where
    K: CacheKey + Send + 'static,
    V: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce(K) -> Result<V, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let payload = self.load(key, fetch)?;
    Ok(self.shared.codec.decode_value(&payload)?)
  }

  /// Writes `value` for `key` with the full lifetime, bypassing any fetch.
  pub fn set<K, V>(&self, key: &K, value: &V) -> Result<()>
  where
    K: CacheKey + ?Sized,
    V: Serialize + ?Sized,
  {
    self.shared.store(&canonicalize(key), value)
  }

  /// Resolves `key` to the payload that should be decoded for the caller.
  fn load<K, V, F, E>(&self, id: K, fetch: F) -> Result<Vec<u8>>
  where
    K: CacheKey + Send + 'static,
    V: Serialize + Send + 'static,
    F: FnOnce(K) -> Result<V, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let key = canonicalize(&id);
    match self.shared.lookup(&key) {
      Lookup::Fresh(record) => {
        bump(&self.shared.metrics.fresh_hits);
        tracing::trace!(cache = %self.shared.name, key = %key, ttl = ?record.ttl, "fresh hit");
        Ok(record.payload)
      }
      Lookup::Stale(record) => {
        bump(&self.shared.metrics.stale_hits);
        tracing::debug!(cache = %self.shared.name, key = %key, ttl = ?record.ttl, "stale hit");
        self.trigger_background_refresh(&key, id, fetch);
        Ok(record.payload)
      }
      Lookup::Miss => {
        bump(&self.shared.metrics.misses);
        tracing::debug!(cache = %self.shared.name, key = %key, "miss");
        self.load_blocking(&key, id, fetch)
      }
    }
  }

  /// The synchronous miss path: fetch, store, read back.
  fn load_blocking<K, V, F, E>(&self, key: &str, id: K, fetch: F) -> Result<Vec<u8>>
  where
    V: Serialize,
    F: FnOnce(K) -> Result<V, E>,
    E: Into<BoxError>,
  {
    let value = self.shared.run_fetch(id, fetch)?;
    self.shared.store(key, &value)?;

    // Reading back keeps this path and the refresh path on whatever form the
    // backend actually stores.
    let record = self.shared.driver.get(&self.shared.name, key)?;
    Ok(record.payload)
  }

  /// Dispatches one refresh for `key` unless one is already in flight.
  fn trigger_background_refresh<K, V, F, E>(&self, key: &str, id: K, fetch: F)
  where
    K: Send + 'static,
    V: Serialize + Send + 'static,
    F: FnOnce(K) -> Result<V, E> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let permit = match self.shared.in_flight.try_acquire(key) {
      Some(permit) => permit,
      None => {
        bump(&self.shared.metrics.refreshes_skipped);
        tracing::trace!(cache = %self.shared.name, key, "refresh already in flight");
        return;
      }
    };

    bump(&self.shared.metrics.refreshes_started);
    let shared = Arc::clone(&self.shared);
    self.shared.spawner.spawn(Box::new(move || {
      // The permit lives until this task ends, however it ends.
      let key = permit.key();
      match shared.refresh(key, id, fetch) {
        Ok(()) => {
          bump(&shared.metrics.refreshes_completed);
          tracing::debug!(cache = %shared.name, key, "background refresh stored new value");
        }
        Err(err) => {
          bump(&shared.metrics.refreshes_failed);
          tracing::warn!(cache = %shared.name, key, error = %err, "background refresh failed");
        }
      }
      drop(permit);
    }));
  }
}
