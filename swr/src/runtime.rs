use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;

/// A unit of background work, such as a stale-entry refresh.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A trait for dispatching background work without waiting for it.
///
/// Refresh tasks perform blocking driver and fetch calls, so spawners should
/// run them somewhere blocking is allowed.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Dispatches `task`. The caller never waits for its completion.
  fn spawn(&self, task: Task);
}

/// Runs every task on a fresh, named OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
  fn spawn(&self, task: Task) {
    let spawned = thread::Builder::new()
      .name("fibre-swr-refresh".into())
      .spawn(task);
    if let Err(err) = spawned {
      // The task was dropped with the failed builder, releasing anything it owned.
      tracing::warn!(error = %err, "failed to spawn background refresh thread");
    }
  }
}

static DEFAULT_SPAWNER: Lazy<Arc<dyn TaskSpawner>> = Lazy::new(|| Arc::new(ThreadSpawner));

/// The spawner used when a cache is built without one.
pub(crate) fn default_spawner() -> Arc<dyn TaskSpawner> {
  DEFAULT_SPAWNER.clone()
}

/// Runs tasks on a Tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioSpawner(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  /// Creates a spawner bound to an explicit runtime handle.
  pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl TaskSpawner for TokioSpawner {
  fn spawn(&self, task: Task) {
    // Dropping the JoinHandle detaches the task.
    drop(self.0.spawn_blocking(task));
  }
}
