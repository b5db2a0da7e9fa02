use crate::runtime::{Cancel, Scheduler, Task, TimerHandle};
use crate::time;

use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

// Timers are ordered by deadline, then by submission order.
type TimerKey = (Instant, u64);

struct Queue {
  timers: BTreeMap<TimerKey, Task>,
  next_seq: u64,
  shutdown: bool,
}

struct TimerCore {
  queue: Mutex<Queue>,
  wakeup: Condvar,
}

impl TimerCore {
  /// The timer thread's main loop.
  fn run(&self) {
    let mut queue = self.queue.lock();
    loop {
      if queue.shutdown {
        break;
      }

      let next_deadline = queue.timers.first_key_value().map(|(key, _)| key.0);
      match next_deadline {
        Some(deadline) if deadline <= Instant::now() => {
          if let Some((_, task)) = queue.timers.pop_first() {
            // Run the task without the queue lock so it can schedule and cancel.
            MutexGuard::unlocked(&mut queue, || {
              if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!("scheduled task panicked; the timer thread keeps running");
              }
            });
          }
        }
        Some(deadline) => {
          self.wakeup.wait_until(&mut queue, deadline);
        }
        None => {
          self.wakeup.wait(&mut queue);
        }
      }
    }
    debug!(dropped = queue.timers.len(), "timer thread stopped");
  }
}

/// A `Scheduler` backed by a single background thread.
///
/// Pending tasks are kept in deadline order; the thread sleeps until the
/// earliest deadline and runs due tasks one after another. Tasks run on the
/// timer thread, so a slow task delays every task behind it.
pub struct ThreadScheduler {
  core: Arc<TimerCore>,
}

impl ThreadScheduler {
  /// Starts a scheduler thread with a default name.
  pub fn new() -> io::Result<Self> {
    Self::with_name("fibre-expiring-timer")
  }

  /// Starts a scheduler thread with the given name.
  pub fn with_name(name: impl Into<String>) -> io::Result<Self> {
    let core = Arc::new(TimerCore {
      queue: Mutex::new(Queue {
        timers: BTreeMap::new(),
        next_seq: 0,
        shutdown: false,
      }),
      wakeup: Condvar::new(),
    });

    let worker = Arc::clone(&core);
    let name = name.into();
    debug!(thread = %name, "starting timer thread");
    thread::Builder::new()
      .name(name)
      .spawn(move || worker.run())?;

    Ok(Self { core })
  }

  /// Returns the number of tasks waiting for their deadline.
  pub fn pending(&self) -> usize {
    self.core.queue.lock().timers.len()
  }
}

impl Scheduler for ThreadScheduler {
  fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
    let deadline = time::deadline_after(Instant::now(), delay);

    let (key, is_earliest) = {
      let mut queue = self.core.queue.lock();
      let seq = queue.next_seq;
      queue.next_seq += 1;
      let key = (deadline, seq);
      let is_earliest = queue
        .timers
        .first_key_value()
        .map_or(true, |(first, _)| key < *first);
      queue.timers.insert(key, task);
      (key, is_earliest)
    };

    if is_earliest {
      self.core.wakeup.notify_one();
    }

    TimerHandle::new(PendingTimer {
      core: Arc::downgrade(&self.core),
      key,
    })
  }
}

impl Drop for ThreadScheduler {
  fn drop(&mut self) {
    // Not joined: the last handle may be dropped from a task on the timer thread.
    self.core.queue.lock().shutdown = true;
    self.core.wakeup.notify_all();
  }
}

struct PendingTimer {
  core: Weak<TimerCore>,
  key: TimerKey,
}

impl Cancel for PendingTimer {
  fn cancel(&self) -> bool {
    match self.core.upgrade() {
      Some(core) => core.queue.lock().timers.remove(&self.key).is_some(),
      None => false,
    }
  }
}
