//! The storage boundary.
//!
//! A driver is a plain key/value adapter with per-record expiry. It carries no
//! cache policy: freshness decisions are made by [`Cache`](crate::Cache) from
//! the remaining time-to-live the driver reports.

pub mod memory;

use crate::error::DriverError;

use std::sync::Arc;
use std::time::Duration;

/// A live record as returned by [`Driver::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  /// The encoded value, opaque to the driver.
  pub payload: Vec<u8>,
  /// Remaining time-to-live. `Duration::ZERO` means the record is expired.
  pub ttl: Duration,
}

impl Record {
  pub fn new(payload: Vec<u8>, ttl: Duration) -> Self {
    Self { payload, ttl }
  }
}

/// A storage backend, scoped by cache name and canonical key.
///
/// Drivers are shared between every operation of a cache, including
/// background refreshes, and must be safe to call concurrently.
pub trait Driver: Send + Sync {
  /// Loads a record. Any error is treated as absence by the cache;
  /// [`DriverError::NotFound`] is the expected signal.
  fn get(&self, cache_name: &str, key: &str) -> Result<Record, DriverError>;

  /// Stores or overwrites a record. The backend must expire it no later than
  /// `ttl` from now.
  fn set(&self, cache_name: &str, key: &str, payload: &[u8], ttl: Duration) -> Result<(), DriverError>;

  /// Removes one record. A missing key is not an error.
  fn invalidate(&self, cache_name: &str, key: &str) -> Result<(), DriverError>;

  /// Removes every record of `cache_name`. Best effort.
  fn invalidate_all(&self, cache_name: &str);
}

impl<D: Driver + ?Sized> Driver for Arc<D> {
  fn get(&self, cache_name: &str, key: &str) -> Result<Record, DriverError> {
    (**self).get(cache_name, key)
  }

  fn set(&self, cache_name: &str, key: &str, payload: &[u8], ttl: Duration) -> Result<(), DriverError> {
    (**self).set(cache_name, key, payload, ttl)
  }

  fn invalidate(&self, cache_name: &str, key: &str) -> Result<(), DriverError> {
    (**self).invalidate(cache_name, key)
  }

  fn invalidate_all(&self, cache_name: &str) {
    (**self).invalidate_all(cache_name)
  }
}

impl<D: Driver + ?Sized> Driver for Box<D> {
  fn get(&self, cache_name: &str, key: &str) -> Result<Record, DriverError> {
    (**self).get(cache_name, key)
  }

  fn set(&self, cache_name: &str, key: &str, payload: &[u8], ttl: Duration) -> Result<(), DriverError> {
    (**self).set(cache_name, key, payload, ttl)
  }

  fn invalidate(&self, cache_name: &str, key: &str) -> Result<(), DriverError> {
    (**self).invalidate(cache_name, key)
  }

  fn invalidate_all(&self, cache_name: &str) {
    (**self).invalidate_all(cache_name)
  }
}
