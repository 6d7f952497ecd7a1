#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fibre_swr::runtime::Task;
use fibre_swr::{canonicalize, CacheKey, Driver, DriverError, Record, TaskSpawner};
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("TEST ERROR")]
pub struct TestError;

/// One expected driver call and the response to give.
#[derive(Debug)]
enum Expectation {
  Get {
    cache: String,
    key: String,
    response: Result<Record, ()>,
  },
  Set {
    cache: String,
    key: String,
    payload: Vec<u8>,
    ttl: Duration,
    fail: bool,
  },
  Invalidate {
    cache: String,
    key: String,
    fail: bool,
  },
  InvalidateAll {
    cache: String,
  },
}

/// A driver that answers from a script of expected calls, in the style of an
/// expectation mock. Unexpected calls are recorded and reported by
/// [`ScriptedDriver::assert_expectations`].
#[derive(Debug, Default)]
pub struct ScriptedDriver {
  expectations: Mutex<VecDeque<Expectation>>,
  unexpected: Mutex<Vec<String>>,
  calls: AtomicUsize,
}

impl ScriptedDriver {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn expect_get_missing(&self, cache: &str, key: &str) {
    self.push(Expectation::Get {
      cache: cache.into(),
      key: key.into(),
      response: Err(()),
    });
  }

  pub fn expect_get(&self, cache: &str, key: &str, payload: &[u8], ttl: Duration) {
    self.push(Expectation::Get {
      cache: cache.into(),
      key: key.into(),
      response: Ok(Record::new(payload.to_vec(), ttl)),
    });
  }

  pub fn expect_set(&self, cache: &str, key: &str, payload: &[u8], ttl: Duration) {
    self.push(Expectation::Set {
      cache: cache.into(),
      key: key.into(),
      payload: payload.to_vec(),
      ttl,
      fail: false,
    });
  }

  pub fn expect_set_failing(&self, cache: &str, key: &str, payload: &[u8], ttl: Duration) {
    self.push(Expectation::Set {
      cache: cache.into(),
      key: key.into(),
      payload: payload.to_vec(),
      ttl,
      fail: true,
    });
  }

  pub fn expect_invalidate(&self, cache: &str, key: &str) {
    self.push(Expectation::Invalidate {
      cache: cache.into(),
      key: key.into(),
      fail: false,
    });
  }

  pub fn expect_invalidate_failing(&self, cache: &str, key: &str) {
    self.push(Expectation::Invalidate {
      cache: cache.into(),
      key: key.into(),
      fail: true,
    });
  }

  pub fn expect_invalidate_all(&self, cache: &str) {
    self.push(Expectation::InvalidateAll { cache: cache.into() });
  }

  fn push(&self, expectation: Expectation) {
    self.expectations.lock().push_back(expectation);
  }

  /// Removes and returns the first pending expectation accepted by `matches`.
  fn take<F>(&self, matches: F) -> Option<Expectation>
  where
    F: Fn(&Expectation) -> bool,
  {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let mut pending = self.expectations.lock();
    let index = pending.iter().position(matches)?;
    pending.remove(index)
  }

  fn unexpected(&self, call: String) {
    self.unexpected.lock().push(call);
  }

  pub fn pending(&self) -> usize {
    self.expectations.lock().len()
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn assert_expectations(&self) {
    let unexpected = self.unexpected.lock();
    assert!(unexpected.is_empty(), "unexpected driver calls: {:?}", *unexpected);
    let pending = self.expectations.lock();
    assert!(pending.is_empty(), "unmet driver expectations: {:?}", *pending);
  }
}

impl Driver for ScriptedDriver {
  fn get(&self, cache_name: &str, key: &str) -> Result<Record, DriverError> {
    let found = self.take(|e| matches!(e, Expectation::Get { cache, key: k, .. } if cache == cache_name && k == key));
    match found {
      Some(Expectation::Get { response: Ok(record), .. }) => Ok(record),
      Some(_) => Err(DriverError::backend(TestError)),
      None => {
        self.unexpected(format!("get({cache_name}, {key})"));
        Err(DriverError::NotFound)
      }
    }
  }

  fn set(&self, cache_name: &str, key: &str, payload: &[u8], ttl: Duration) -> Result<(), DriverError> {
    let found = self.take(|e| {
      matches!(e, Expectation::Set { cache, key: k, payload: p, ttl: t, .. }
        if cache == cache_name && k == key && p.as_slice() == payload && *t == ttl)
    });
    match found {
      Some(Expectation::Set { fail: false, .. }) => Ok(()),
      Some(_) => Err(DriverError::backend(TestError)),
      None => {
        self.unexpected(format!("set({cache_name}, {key}, {payload:?}, {ttl:?})"));
        Err(DriverError::backend(TestError))
      }
    }
  }

  fn invalidate(&self, cache_name: &str, key: &str) -> Result<(), DriverError> {
    let found = self.take(|e| matches!(e, Expectation::Invalidate { cache, key: k, .. } if cache == cache_name && k == key));
    match found {
      Some(Expectation::Invalidate { fail: false, .. }) => Ok(()),
      Some(_) => Err(DriverError::backend(TestError)),
      None => {
        self.unexpected(format!("invalidate({cache_name}, {key})"));
        Ok(())
      }
    }
  }

  fn invalidate_all(&self, cache_name: &str) {
    let found = self.take(|e| matches!(e, Expectation::InvalidateAll { cache } if cache == cache_name));
    if found.is_none() {
      self.unexpected(format!("invalidate_all({cache_name})"));
    }
  }
}

/// A fetch source with a fixed table of values and a call counter.
#[derive(Debug)]
pub struct Fetcher<V> {
  values: HashMap<String, V>,
  calls: AtomicUsize,
}

impl<V: Clone + Send + Sync + 'static> Fetcher<V> {
  pub fn new<K: CacheKey>(values: impl IntoIterator<Item = (K, V)>) -> Arc<Self> {
    Arc::new(Self {
      values: values.into_iter().map(|(k, v)| (canonicalize(&k), v)).collect(),
      calls: AtomicUsize::new(0),
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn value<K: CacheKey>(&self, key: K) -> V {
    self.values[&canonicalize(&key)].clone()
  }

  /// A one-shot fetch function backed by this table. Unknown keys fail with
  /// [`TestError`].
  pub fn func<K: CacheKey + 'static>(self: &Arc<Self>) -> impl FnOnce(K) -> Result<V, TestError> + Send + 'static {
    let this = Arc::clone(self);
    move |key| {
      this.calls.fetch_add(1, Ordering::SeqCst);
      this.values.get(&canonicalize(&key)).cloned().ok_or(TestError)
    }
  }
}

/// A spawner that holds tasks until the test runs them.
#[derive(Default)]
pub struct ManualSpawner {
  tasks: Mutex<Vec<Task>>,
}

impl ManualSpawner {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn queued(&self) -> usize {
    self.tasks.lock().len()
  }

  /// Runs every queued task on the current thread and returns how many ran.
  pub fn run_all(&self) -> usize {
    let tasks: Vec<Task> = std::mem::take(&mut *self.tasks.lock());
    let count = tasks.len();
    for task in tasks {
      task();
    }
    count
  }

  /// Drops every queued task without running it.
  pub fn discard_all(&self) -> usize {
    let tasks: Vec<Task> = std::mem::take(&mut *self.tasks.lock());
    tasks.len()
  }
}

impl TaskSpawner for ManualSpawner {
  fn spawn(&self, task: Task) {
    self.tasks.lock().push(task);
  }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(5));
  }
  condition()
}

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}
