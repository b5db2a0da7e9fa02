use crate::runtime::{Executor, Task};

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use fibre::mpmc;
use tracing::{debug, warn};

/// A fixed set of worker threads draining an unbounded job queue.
///
/// This is the default `Executor` for asynchronous expiration listeners.
/// Workers exit once the pool is dropped and the queue has drained.
pub struct ThreadPool {
  sender: mpmc::Sender<Task>,
  workers: usize,
}

impl ThreadPool {
  /// Starts a pool with `workers` threads (at least one).
  pub fn new(workers: usize) -> io::Result<Self> {
    let workers = workers.max(1);
    let (sender, receiver) = mpmc::unbounded::<Task>();

    for id in 0..workers {
      let receiver = receiver.clone();
      thread::Builder::new()
        .name(format!("fibre-expiring-listener-{id}"))
        .spawn(move || {
          // Ends when every sender is gone and the queue is empty.
          while let Ok(task) = receiver.recv() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
              warn!(worker = id, "asynchronous task panicked");
            }
          }
          debug!(worker = id, "listener worker stopped");
        })?;
    }
    debug!(workers, "started listener pool");

    Ok(Self { sender, workers })
  }

  /// Returns the number of worker threads.
  pub fn workers(&self) -> usize {
    self.workers
  }
}

impl Executor for ThreadPool {
  fn execute(&self, task: Task) {
    if self.sender.send(task).is_err() {
      warn!("listener pool is closed; dropping task");
    }
  }
}
