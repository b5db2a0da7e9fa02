//! The collaborators an `ExpiringMap` relies on to run work off the caller's
//! thread: a `Scheduler` for delayed expiration tasks and an `Executor` for
//! asynchronous listener callbacks.
//!
//! Every map uses the process-wide defaults unless the builder is given its
//! own. The defaults are created once, on first use, and shared by all maps.

use crate::task::pool::ThreadPool;
use crate::task::timer::ThreadScheduler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

/// A type-erased unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync + 'static {
  /// Schedules `task` to run once after `delay` has elapsed.
  ///
  /// Implementations must never run the task on the calling thread: maps
  /// schedule while holding their write lock, and the task takes that lock.
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Runs tasks as soon as possible, fire-and-forget.
pub trait Executor: Send + Sync + 'static {
  fn execute(&self, task: Task);
}

/// The cancellation half of a scheduled task.
pub trait Cancel: Send + Sync {
  /// Prevents the task from running. Returns `true` if the task was still
  /// pending, `false` if it already ran or was cancelled before.
  fn cancel(&self) -> bool;
}

/// A handle to a task submitted to a `Scheduler`.
pub struct TimerHandle {
  inner: Box<dyn Cancel>,
}

impl TimerHandle {
  pub fn new<C>(cancel: C) -> Self
  where
    C: Cancel + 'static,
  {
    Self {
      inner: Box::new(cancel),
    }
  }

  /// Cancels the scheduled task. See [`Cancel::cancel`].
  pub fn cancel(&self) -> bool {
    self.inner.cancel()
  }
}

impl fmt::Debug for TimerHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TimerHandle").finish_non_exhaustive()
  }
}

static GLOBAL_SCHEDULER: Lazy<Arc<ThreadScheduler>> = Lazy::new(|| {
  Arc::new(
    ThreadScheduler::with_name("fibre-expiring-timer")
      .expect("failed to spawn the expiration scheduler thread"),
  )
});

static GLOBAL_EXECUTOR: Lazy<Option<Arc<ThreadPool>>> =
  Lazy::new(|| match ThreadPool::new(num_cpus::get().max(2)) {
    Ok(pool) => Some(Arc::new(pool)),
    Err(err) => {
      tracing::error!(error = %err, "failed to spawn the expiration listener pool");
      None
    }
  });

/// Returns the process-wide scheduler, starting its thread on first use.
pub fn global_scheduler() -> Arc<dyn Scheduler> {
  let scheduler: Arc<ThreadScheduler> = Arc::clone(&GLOBAL_SCHEDULER);
  scheduler
}

/// Returns the process-wide listener pool, starting its workers on first use.
/// Returns `None` if the workers could not be spawned.
pub fn global_executor() -> Option<Arc<dyn Executor>> {
  GLOBAL_EXECUTOR
    .as_ref()
    .map(|pool| Arc::clone(pool) as Arc<dyn Executor>)
}

/// Runs asynchronous listener callbacks on a Tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioExecutor {
  /// Creates an executor that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
  fn execute(&self, task: Task) {
    self.0.spawn_blocking(task);
  }
}
