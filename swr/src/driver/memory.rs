use super::{Driver, Record};
use crate::error::DriverError;

use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::RwLock;

struct Slot {
  payload: Vec<u8>,
  /// `None` when `now + ttl` is past what `Instant` can represent.
  expires_at: Option<Instant>,
}

impl Slot {
  fn new(payload: &[u8], ttl: Duration) -> Self {
    Self {
      payload: payload.to_vec(),
      expires_at: Instant::now().checked_add(ttl),
    }
  }

  #[inline]
  fn remaining(&self, now: Instant) -> Duration {
    match self.expires_at {
      Some(at) => at.saturating_duration_since(now),
      None => Duration::MAX,
    }
  }
}

/// An in-process driver that keeps records in memory.
///
/// Records are grouped by cache name; the inner map doubles as the membership
/// set that makes `invalidate_all` proportional to the cache's own records.
/// Expired records are reported as [`DriverError::NotFound`] and dropped
/// lazily on access or by [`purge_expired`](MemoryDriver::purge_expired).
#[derive(Default)]
pub struct MemoryDriver {
  caches: RwLock<HashMap<String, HashMap<String, Slot>>>,
}

impl std::fmt::Debug for MemoryDriver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MemoryDriver")
      .field("caches", &self.caches.read().len())
      .finish()
  }
}

impl MemoryDriver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live records stored for `cache_name`.
  pub fn len(&self, cache_name: &str) -> usize {
    let now = Instant::now();
    self
      .caches
      .read()
      .get(cache_name)
      .map_or(0, |records| records.values().filter(|s| !s.remaining(now).is_zero()).count())
  }

  pub fn is_empty(&self, cache_name: &str) -> bool {
    self.len(cache_name) == 0
  }

  /// Drops every expired record and returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut removed = 0;
    let mut caches = self.caches.write();
    for records in caches.values_mut() {
      let before = records.len();
      records.retain(|_, slot| !slot.remaining(now).is_zero());
      removed += before - records.len();
    }
    caches.retain(|_, records| !records.is_empty());
    removed
  }

  fn remove_if_expired(&self, cache_name: &str, key: &str) {
    let now = Instant::now();
    let mut caches = self.caches.write();
    if let Some(records) = caches.get_mut(cache_name) {
      if records.get(key).is_some_and(|slot| slot.remaining(now).is_zero()) {
        records.remove(key);
      }
    }
  }
}

impl Driver for MemoryDriver {
  fn get(&self, cache_name: &str, key: &str) -> Result<Record, DriverError> {
    let now = Instant::now();
    {
      let caches = self.caches.read();
      let slot = caches
        .get(cache_name)
        .and_then(|records| records.get(key))
        .ok_or(DriverError::NotFound)?;

      let ttl = slot.remaining(now);
      if !ttl.is_zero() {
        return Ok(Record::new(slot.payload.clone(), ttl));
      }
    }

    self.remove_if_expired(cache_name, key);
    Err(DriverError::NotFound)
  }

  fn set(&self, cache_name: &str, key: &str, payload: &[u8], ttl: Duration) -> Result<(), DriverError> {
    let slot = Slot::new(payload, ttl);
    self
      .caches
      .write()
      .entry(cache_name.to_owned())
      .or_default()
      .insert(key.to_owned(), slot);
    Ok(())
  }

  fn invalidate(&self, cache_name: &str, key: &str) -> Result<(), DriverError> {
    if let Some(records) = self.caches.write().get_mut(cache_name) {
      records.remove(key);
    }
    Ok(())
  }

  fn invalidate_all(&self, cache_name: &str) {
    self.caches.write().remove(cache_name);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn get_reports_remaining_ttl() {
    let driver = MemoryDriver::new();
    driver.set("c", "k", b"v", Duration::from_secs(60)).unwrap();

    let record = driver.get("c", "k").unwrap();
    assert_eq!(record.payload, b"v");
    assert!(record.ttl <= Duration::from_secs(60));
    assert!(record.ttl > Duration::from_secs(59));
  }

  #[test]
  fn missing_and_expired_records_are_not_found() {
    let driver = MemoryDriver::new();
    assert!(driver.get("c", "nope").unwrap_err().is_not_found());

    driver.set("c", "k", b"v", Duration::from_millis(20)).unwrap();
    thread::sleep(Duration::from_millis(40));
    assert!(driver.get("c", "k").unwrap_err().is_not_found());
    assert_eq!(driver.len("c"), 0);
  }

  #[test]
  fn records_are_scoped_by_cache_name() {
    let driver = MemoryDriver::new();
    driver.set("one", "k", b"1", Duration::from_secs(5)).unwrap();
    driver.set("two", "k", b"2", Duration::from_secs(5)).unwrap();

    assert_eq!(driver.get("one", "k").unwrap().payload, b"1");
    assert_eq!(driver.get("two", "k").unwrap().payload, b"2");

    driver.invalidate_all("one");
    assert!(driver.get("one", "k").is_err());
    assert_eq!(driver.get("two", "k").unwrap().payload, b"2");
  }

  #[test]
  fn invalidate_missing_key_is_ok() {
    let driver = MemoryDriver::new();
    assert!(driver.invalidate("c", "k").is_ok());

    driver.set("c", "k", b"v", Duration::from_secs(5)).unwrap();
    driver.invalidate("c", "k").unwrap();
    assert!(driver.is_empty("c"));
  }

  #[test]
  fn set_overwrites_and_resets_ttl() {
    let driver = MemoryDriver::new();
    driver.set("c", "k", b"old", Duration::from_millis(50)).unwrap();
    driver.set("c", "k", b"new", Duration::from_secs(5)).unwrap();

    let record = driver.get("c", "k").unwrap();
    assert_eq!(record.payload, b"new");
    assert!(record.ttl > Duration::from_secs(4));
  }

  #[test]
  fn unrepresentable_ttl_never_expires() {
    let driver = MemoryDriver::new();
    driver.set("c", "k", b"v", Duration::MAX).unwrap();

    let record = driver.get("c", "k").unwrap();
    assert_eq!(record.payload, b"v");
    assert_eq!(record.ttl, Duration::MAX);
    assert_eq!(driver.purge_expired(), 0);
    assert_eq!(driver.len("c"), 1);
  }

  #[test]
  fn purge_expired_sweeps_all_caches() {
    let driver = MemoryDriver::new();
    driver.set("a", "1", b"x", Duration::from_millis(10)).unwrap();
    driver.set("b", "1", b"x", Duration::from_millis(10)).unwrap();
    driver.set("b", "2", b"x", Duration::from_secs(5)).unwrap();
    thread::sleep(Duration::from_millis(30));

    assert_eq!(driver.purge_expired(), 2);
    assert_eq!(driver.len("a"), 0);
    assert_eq!(driver.len("b"), 1);
  }
}
