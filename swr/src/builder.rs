use crate::cache::{Cache, CacheShared};
use crate::codec::{BincodeCodec, Codec};
use crate::config::CacheConfig;
use crate::driver::Driver;
use crate::error::BuildError;
use crate::metrics::Metrics;
use crate::refresh::InFlight;
use crate::runtime::{self, TaskSpawner};

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating [`Cache`] instances.
///
/// ```
/// use fibre_swr::driver::memory::MemoryDriver;
/// use fibre_swr::CacheBuilder;
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new("users")
///   .fresh_for(Duration::from_secs(60))
///   .lifetime(Duration::from_secs(300))
///   .tag("accounts")
///   .driver(MemoryDriver::new())
///   .build()
///   .unwrap();
/// assert_eq!(cache.name(), "users");
/// ```
pub struct CacheBuilder<C = BincodeCodec> {
  name: String,
  config: CacheConfig,
  codec: C,
  driver: Option<Arc<dyn Driver>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  refresh_shards: Option<usize>,
}

impl<C> fmt::Debug for CacheBuilder<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("config", &self.config)
      .field("has_driver", &self.driver.is_some())
      .field("has_spawner", &self.spawner.is_some())
      .finish_non_exhaustive()
  }
}

impl CacheBuilder<BincodeCodec> {
  /// Creates a builder for a cache named `name` with the default policy
  /// (fresh for one minute, five minute lifetime) and the bincode codec.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      config: CacheConfig::default(),
      codec: BincodeCodec,
      driver: None,
      spawner: None,
      refresh_shards: None,
    }
  }
}

impl<C> CacheBuilder<C> {
  /// Sets how long after a write a record is served without refreshing.
  pub fn fresh_for(mut self, duration: Duration) -> Self {
    self.config.fresh_for = duration;
    self
  }

  /// Sets the lifetime of every record this cache writes.
  pub fn lifetime(mut self, duration: Duration) -> Self {
    self.config.lifetime = duration;
    self
  }

  /// Adds one tag.
  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.config.tags.insert(tag.into());
    self
  }

  /// Adds several tags.
  pub fn tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.config.tags.extend(tags.into_iter().map(Into::into));
    self
  }

  /// Replaces the freshness policy and tags wholesale.
  pub fn config(mut self, config: CacheConfig) -> Self {
    self.config = config;
    self
  }

  /// Sets the storage driver.
  pub fn driver<D: Driver + 'static>(mut self, driver: D) -> Self {
    self.driver = Some(Arc::new(driver));
    self
  }

  /// Sets a storage driver that is shared with other caches.
  pub fn shared_driver(mut self, driver: Arc<dyn Driver>) -> Self {
    self.driver = Some(driver);
    self
  }

  /// Sets the spawner used for background refreshes.
  ///
  /// Defaults to [`ThreadSpawner`](crate::runtime::ThreadSpawner).
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Sets the number of shards of the in-flight refresh table.
  /// (Primarily for testing purposes).
  #[doc(hidden)]
  pub fn refresh_shards(mut self, shards: usize) -> Self {
    self.refresh_shards = Some(shards);
    self
  }

  /// Switches the value codec.
  pub fn codec<C2: Codec>(self, codec: C2) -> CacheBuilder<C2> {
    CacheBuilder {
      name: self.name,
      config: self.config,
      codec,
      driver: self.driver,
      spawner: self.spawner,
      refresh_shards: self.refresh_shards,
    }
  }
}

impl<C: Codec> CacheBuilder<C> {
  /// Validates the configuration and builds the cache.
  pub fn build(self) -> Result<Cache<C>, BuildError> {
    self.config.validate(&self.name)?;
    let driver = self
      .driver
      .ok_or_else(|| BuildError::MissingDriver(self.name.clone()))?;

    let in_flight = match self.refresh_shards {
      Some(shards) => InFlight::new(shards),
      None => InFlight::with_default_shards(),
    };

    tracing::debug!(
      cache = %self.name,
      fresh_for = ?self.config.fresh_for,
      lifetime = ?self.config.lifetime,
      tags = ?self.config.tags,
      "building cache"
    );

    let shared = CacheShared {
      name: self.name,
      config: self.config,
      codec: self.codec,
      driver,
      spawner: self.spawner.unwrap_or_else(runtime::default_spawner),
      in_flight: Arc::new(in_flight),
      metrics: Metrics::new(),
    };

    Ok(Cache {
      shared: Arc::new(shared),
    })
  }
}
