use crate::builder::CacheBuilder;
use crate::cache::Cache;
use crate::codec::{BincodeCodec, Codec};
use crate::config::ManagerConfig;
use crate::driver::Driver;
use crate::error::{ConfigError, RegistryError};
use crate::runtime::TaskSpawner;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;

/// A registry of named caches.
///
/// Names are unique: registering a name twice is rejected. Bulk invalidation
/// fans out to every registered cache; each cache decides on its own whether a
/// tag applies to it. Lookups and fan-out take a read lock only long enough to
/// clone the cache handles, so driver calls never run under the registry lock.
pub struct Manager<C = BincodeCodec> {
  caches: RwLock<HashMap<String, Cache<C>>>,
}

impl<C> Default for Manager<C> {
  fn default() -> Self {
    Self {
      caches: RwLock::new(HashMap::default()),
    }
  }
}

impl<C> fmt::Debug for Manager<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Manager")
      .field("caches", &self.names())
      .finish()
  }
}

impl<C> Manager<C> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers every cache in `caches`.
  ///
  /// Fails with [`RegistryError::DuplicateName`] if a name is already
  /// registered or appears twice in the batch. The batch is all-or-nothing:
  /// on error no cache from it is registered.
  pub fn add<I>(&self, caches: I) -> Result<(), RegistryError>
  where
    I: IntoIterator<Item = Cache<C>>,
  {
    let batch: Vec<Cache<C>> = caches.into_iter().collect();
    let mut registry = self.caches.write();

    let mut seen = HashSet::with_capacity(batch.len());
    for cache in &batch {
      if registry.contains_key(cache.name()) || !seen.insert(cache.name()) {
        tracing::warn!(cache = %cache.name(), "rejected duplicate cache registration");
        return Err(RegistryError::DuplicateName(cache.name().to_owned()));
      }
    }

    for cache in batch {
      tracing::debug!(cache = %cache.name(), "registered cache");
      registry.insert(cache.name().to_owned(), cache);
    }
    Ok(())
  }

  /// Looks up a cache by name.
  pub fn get(&self, name: &str) -> Option<Cache<C>> {
    self.caches.read().get(name).cloned()
  }

  /// Unregisters a cache. Its records stay in the backend.
  pub fn remove(&self, name: &str) -> Option<Cache<C>> {
    let removed = self.caches.write().remove(name);
    if removed.is_some() {
      tracing::debug!(cache = %name, "unregistered cache");
    }
    removed
  }

  pub fn contains(&self, name: &str) -> bool {
    self.caches.read().contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.caches.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.caches.read().is_empty()
  }

  fn snapshot(&self) -> Vec<Cache<C>> {
    self.caches.read().values().cloned().collect()
  }

  /// Invalidates every record of every registered cache.
  pub fn invalidate_all(&self) {
    for cache in self.snapshot() {
      cache.invalidate_all();
    }
  }

  /// Invalidates every registered cache carrying one of `tags`.
  ///
  /// Returns how many caches matched.
  pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let tags: Vec<S> = tags.into_iter().collect();
    let matched = self
      .snapshot()
      .iter()
      .filter(|cache| cache.invalidate_tags(tags.iter().map(AsRef::<str>::as_ref)))
      .count();
    tracing::debug!(?matched, "tag invalidation fanned out");
    matched
  }
}

impl<C: Codec + Clone> Manager<C> {
  /// Builds and registers every cache described by `config`.
  ///
  /// All caches share `driver` and `codec`. Without a `spawner` each cache
  /// uses the default thread spawner.
  pub fn from_config(
    config: &ManagerConfig,
    driver: Arc<dyn Driver>,
    codec: C,
    spawner: Option<Arc<dyn TaskSpawner>>,
  ) -> Result<Self, ConfigError> {
    let manager = Self::new();
    let mut caches = Vec::with_capacity(config.caches.len());
    for (name, cache_config) in &config.caches {
      let mut builder = CacheBuilder::new(name.clone())
        .config(cache_config.clone())
        .codec(codec.clone())
        .shared_driver(driver.clone());
      if let Some(spawner) = &spawner {
        builder = builder.spawner(spawner.clone());
      }
      caches.push(builder.build()?);
    }
    manager.add(caches)?;
    Ok(manager)
  }
}
