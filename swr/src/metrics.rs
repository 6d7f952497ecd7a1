use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for one cache.
/// All fields are atomic to allow for lock-free updates from foreground
/// calls and background refreshes alike.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) fresh_hits: CachePadded<AtomicU64>,
  pub(crate) stale_hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Fetch source ---
  pub(crate) fetches: CachePadded<AtomicU64>,
  pub(crate) fetch_errors: CachePadded<AtomicU64>,

  // --- Background refresh ---
  pub(crate) refreshes_started: CachePadded<AtomicU64>,
  pub(crate) refreshes_skipped: CachePadded<AtomicU64>,
  pub(crate) refreshes_completed: CachePadded<AtomicU64>,
  pub(crate) refreshes_failed: CachePadded<AtomicU64>,

  pub(crate) invalidations: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      fresh_hits: CachePadded::new(AtomicU64::new(0)),
      stale_hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      fetches: CachePadded::new(AtomicU64::new(0)),
      fetch_errors: CachePadded::new(AtomicU64::new(0)),
      refreshes_started: CachePadded::new(AtomicU64::new(0)),
      refreshes_skipped: CachePadded::new(AtomicU64::new(0)),
      refreshes_completed: CachePadded::new(AtomicU64::new(0)),
      refreshes_failed: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
  counter.fetch_add(1, Ordering::Relaxed);
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let fresh_hits = self.fresh_hits.load(Ordering::Relaxed);
    let stale_hits = self.stale_hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let hits = fresh_hits + stale_hits;
    let total_lookups = hits + misses;

    MetricsSnapshot {
      fresh_hits,
      stale_hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      fetches: self.fetches.load(Ordering::Relaxed),
      fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
      refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
      refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
      refreshes_completed: self.refreshes_completed.load(Ordering::Relaxed),
      refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a cache's metrics.
#[derive(Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Lookups answered from a fresh record.
  pub fresh_hits: u64,
  /// Lookups answered from a stale record while a refresh was requested.
  pub stale_hits: u64,
  /// Lookups that found no usable record and fetched synchronously.
  pub misses: u64,
  /// The cache hit ratio ((fresh + stale) / all lookups).
  pub hit_ratio: f64,
  /// Calls made to fetch functions, foreground and background.
  pub fetches: u64,
  /// Fetch calls that returned an error, foreground and background.
  pub fetch_errors: u64,
  /// Background refreshes dispatched.
  pub refreshes_started: u64,
  /// Stale reads that found a refresh for their key already in flight.
  pub refreshes_skipped: u64,
  /// Background refreshes that stored a new record.
  pub refreshes_completed: u64,
  /// Background refreshes that failed to fetch, encode or store.
  pub refreshes_failed: u64,
  /// Single-key, whole-cache and tag invalidations.
  pub invalidations: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("fresh_hits", &self.fresh_hits)
      .field("stale_hits", &self.stale_hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("fetches", &self.fetches)
      .field("fetch_errors", &self.fetch_errors)
      .field("refreshes_started", &self.refreshes_started)
      .field("refreshes_skipped", &self.refreshes_skipped)
      .field("refreshes_completed", &self.refreshes_completed)
      .field("refreshes_failed", &self.refreshes_failed)
      .field("invalidations", &self.invalidations)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
