use crate::listener::{ExpirationListener, ListenerId, RemovalCause};
use crate::runtime::Executor;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

type ListenerList<K, V> = Vec<(ListenerId, Arc<dyn ExpirationListener<K, V>>)>;

/// Holds the registered expiration listeners and fans notifications out to
/// them.
///
/// Synchronous listeners are called inline, in registration order.
/// Asynchronous listeners are each submitted to an executor as their own
/// task. Panics are caught and logged in both cases.
pub(crate) struct Notifier<K, V> {
  sync_listeners: ListenerList<K, V>,
  async_listeners: ListenerList<K, V>,
  next_id: u64,
}

impl<K, V> Notifier<K, V>
where
  K: Clone + Send + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new() -> Self {
    Self {
      sync_listeners: Vec::new(),
      async_listeners: Vec::new(),
      next_id: 0,
    }
  }

  fn next_id(&mut self) -> ListenerId {
    let id = ListenerId(self.next_id);
    self.next_id += 1;
    id
  }

  pub(crate) fn add_sync(&mut self, listener: Arc<dyn ExpirationListener<K, V>>) -> ListenerId {
    let id = self.next_id();
    self.sync_listeners.push((id, listener));
    id
  }

  pub(crate) fn add_async(&mut self, listener: Arc<dyn ExpirationListener<K, V>>) -> ListenerId {
    let id = self.next_id();
    self.async_listeners.push((id, listener));
    id
  }

  pub(crate) fn remove_sync(&mut self, id: ListenerId) -> bool {
    remove_by_id(&mut self.sync_listeners, id)
  }

  pub(crate) fn remove_async(&mut self, id: ListenerId) -> bool {
    remove_by_id(&mut self.async_listeners, id)
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.sync_listeners.is_empty() && self.async_listeners.is_empty()
  }

  pub(crate) fn has_async(&self) -> bool {
    !self.async_listeners.is_empty()
  }

  /// Submits one task per asynchronous listener to `executor`.
  pub(crate) fn notify_async(
    &self,
    executor: &dyn Executor,
    key: &K,
    value: &Arc<V>,
    cause: RemovalCause,
  ) {
    for (id, listener) in &self.async_listeners {
      let id = *id;
      let listener = Arc::clone(listener);
      let key = key.clone();
      let value = Arc::clone(value);
      executor.execute(Box::new(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_expired(key, value, cause)));
        if result.is_err() {
          warn!(listener = id.0, %cause, "asynchronous expiration listener panicked");
        }
      }));
    }
  }

  /// Calls every synchronous listener on the current thread, in order.
  pub(crate) fn notify_sync(&self, key: &K, value: &Arc<V>, cause: RemovalCause) {
    for (id, listener) in &self.sync_listeners {
      let result = panic::catch_unwind(AssertUnwindSafe(|| {
        listener.on_expired(key.clone(), Arc::clone(value), cause)
      }));
      if result.is_err() {
        warn!(listener = id.0, %cause, "expiration listener panicked");
      }
    }
  }
}

fn remove_by_id<K, V>(listeners: &mut ListenerList<K, V>, id: ListenerId) -> bool {
  let before = listeners.len();
  listeners.retain(|(listener_id, _)| *listener_id != id);
  listeners.len() != before
}
