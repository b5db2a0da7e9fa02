use crate::entry::{ArmedTimer, ExpiringEntry};
use crate::listener::RemovalCause;
use crate::loader::Loader;
use crate::metrics::Metrics;
use crate::policy::ExpirationPolicy;
use crate::runtime::{self, Executor, Scheduler};
use crate::store::{EntryStore, Index};
use crate::task::notifier::Notifier;

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

/// Everything guarded by the map's single lock.
pub(crate) struct MapState<K, V> {
  pub(crate) store: Box<dyn EntryStore<K, V>>,
  pub(crate) default_expiration: Duration,
  pub(crate) default_policy: ExpirationPolicy,
  /// `usize::MAX` when the map is unbounded.
  pub(crate) max_size: usize,
  /// The entry holding the map's one armed removal task.
  pub(crate) armed: Option<Index>,
  pub(crate) next_ticket: u64,
}

impl<K, V> MapState<K, V> {
  pub(crate) fn new(
    store: Box<dyn EntryStore<K, V>>,
    default_expiration: Duration,
    default_policy: ExpirationPolicy,
    max_size: usize,
  ) -> Self {
    Self {
      store,
      default_expiration,
      default_policy,
      max_size,
      armed: None,
      next_ticket: 0,
    }
  }
}

/// The internal, thread-safe core of an `ExpiringMap`.
///
/// At most one removal task is armed at any time, always for the entry that
/// expires soonest. Its firing removes that entry, sweeps any other entries
/// that have also passed their deadline, then re-arms for the new head.
pub(crate) struct MapShared<K, V> {
  pub(crate) state: RwLock<MapState<K, V>>,
  pub(crate) notifier: RwLock<Notifier<K, V>>,
  pub(crate) loader: Option<Loader<K, V>>,
  pub(crate) variable_expiration: bool,
  pub(crate) scheduler: Arc<dyn Scheduler>,
  /// `None` means the process-wide listener pool, started on first use.
  pub(crate) executor: Option<Arc<dyn Executor>>,
  pub(crate) metrics: Metrics,
  /// Handed to removal tasks so a pending task never keeps the map alive.
  pub(crate) this: Weak<Self>,
}

impl<K, V> fmt::Debug for MapShared<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut debug = f.debug_struct("MapShared");
    // try_read: Debug may be reached from a listener while the lock is held.
    if let Some(state) = self.state.try_read() {
      debug
        .field("len", &state.store.len())
        .field("default_expiration", &state.default_expiration)
        .field("default_policy", &state.default_policy)
        .field("max_size", &state.max_size);
    }
    debug
      .field("variable_expiration", &self.variable_expiration)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V> Drop for MapShared<K, V> {
  fn drop(&mut self) {
    let state = self.state.get_mut();
    if let Some(index) = state.armed.take() {
      if let Some(entry) = state.store.get_mut(index) {
        entry.cancel();
      }
    }
  }
}

impl<K, V> MapShared<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
{
  /// Keeps the armed removal task on the entry that expires soonest.
  ///
  /// Must be called after every change to the store's ordering.
  pub(crate) fn rearm(&self, state: &mut MapState<K, V>) {
    let first = state.store.first();
    if state.armed.is_some() && state.armed == first {
      return;
    }
    if let Some(previous) = state.armed.take() {
      if let Some(entry) = state.store.get_mut(previous) {
        entry.cancel();
      }
    }
    if let Some(first) = first {
      self.arm(state, first);
    }
  }

  fn arm(&self, state: &mut MapState<K, V>, index: Index) {
    let ticket = state.next_ticket;
    state.next_ticket += 1;

    let Some(entry) = state.store.get_mut(index) else {
      return;
    };
    let delay = entry.remaining(Instant::now());
    let map = self.this.clone();
    let handle = self.scheduler.schedule(
      delay,
      Box::new(move || {
        if let Some(map) = map.upgrade() {
          map.on_timer(index, ticket);
        }
      }),
    );
    trace!(ticket, ?delay, "armed removal task");
    entry.timer = Some(ArmedTimer { ticket, handle });
    state.armed = Some(index);
  }

  /// Runs when an armed removal task fires.
  pub(crate) fn on_timer(&self, index: Index, ticket: u64) {
    let mut state = self.state.write();

    // A stale ticket means the entry was reset or replaced since arming.
    let current = state
      .store
      .get(index)
      .map_or(false, |entry| entry.is_armed_with(ticket));
    if current {
      if let Some(entry) = self.detach(&mut state, index) {
        self.report(entry, RemovalCause::Expired);
      }
    } else {
      trace!(ticket, "stale removal task");
    }

    let swept = self.expire_elapsed(&mut state);
    if swept > 0 {
      debug!(swept, "removed additional expired entries");
    }
    self.rearm(&mut state);
  }

  /// Removes every entry whose deadline has passed, soonest first.
  pub(crate) fn expire_elapsed(&self, state: &mut MapState<K, V>) -> usize {
    let now = Instant::now();
    let mut removed = 0;
    while let Some(first) = state.store.first() {
      let expired = state
        .store
        .get(first)
        .map_or(false, |entry| entry.is_expired(now));
      if !expired {
        break;
      }
      match self.detach(state, first) {
        Some(entry) => {
          self.report(entry, RemovalCause::Expired);
          removed += 1;
        }
        None => break,
      }
    }
    removed
  }

  /// Removes an entry from the store and cancels its removal task.
  ///
  /// Does not re-arm; callers decide when to.
  pub(crate) fn detach(
    &self,
    state: &mut MapState<K, V>,
    index: Index,
  ) -> Option<ExpiringEntry<K, V>> {
    let mut entry = state.store.remove(index)?;
    entry.cancel();
    if state.armed == Some(index) {
      state.armed = None;
    }
    Some(entry)
  }

  /// Counts a removal and hands it to the listeners.
  fn report(&self, entry: ExpiringEntry<K, V>, cause: RemovalCause) {
    match cause {
      RemovalCause::Expired => Metrics::record(&self.metrics.expirations),
      RemovalCause::Evicted => Metrics::record(&self.metrics.evictions),
    }
    // Loader placeholders have nothing to report.
    let Some(value) = entry.value else {
      return;
    };

    let notifier = self.notifier.read();
    if notifier.is_empty() {
      return;
    }
    if notifier.has_async() {
      match &self.executor {
        Some(executor) => notifier.notify_async(executor.as_ref(), &entry.key, &value, cause),
        // Async listeners added after construction use the shared pool.
        None => match runtime::global_executor() {
          Some(executor) => notifier.notify_async(executor.as_ref(), &entry.key, &value, cause),
          None => warn!("no listener pool available, async listeners skipped"),
        },
      }
    }
    notifier.notify_sync(&entry.key, &value, cause);
  }

  /// Restarts an entry's deadline from now and moves it accordingly.
  pub(crate) fn reset_entry(&self, state: &mut MapState<K, V>, index: Index) {
    let now = Instant::now();
    let Some(entry) = state.store.get_mut(index) else {
      return;
    };
    entry.cancel();
    entry.reset(now);
    if state.armed == Some(index) {
      state.armed = None;
    }
    state.store.reorder(index);
    self.rearm(state);
  }

  /// Evicts the entry that expires soonest to make room for a new key.
  fn evict_first(&self, state: &mut MapState<K, V>) {
    let Some(first) = state.store.first() else {
      return;
    };
    if let Some(entry) = self.detach(state, first) {
      debug!(max_size = state.max_size, "evicting soonest-expiring entry");
      self.report(entry, RemovalCause::Evicted);
    }
  }

  /// Inserts or overwrites the entry for `key`.
  ///
  /// `lifetime` replaces the entry's policy and duration; `None` keeps an
  /// existing entry's own settings and gives a new entry the map defaults.
  /// Returns the previous value.
  pub(crate) fn put_internal(
    &self,
    state: &mut MapState<K, V>,
    key: K,
    value: Option<Arc<V>>,
    lifetime: Option<(ExpirationPolicy, Duration)>,
  ) -> Option<Arc<V>> {
    if let Some(index) = state.store.find(&key) {
      let Some(entry) = state.store.get_mut(index) else {
        return None;
      };
      let policy = lifetime.map_or(entry.policy, |(policy, _)| policy);
      // Same value on a created-only entry: nothing to change.
      if policy != ExpirationPolicy::ResetOnAccess && entry.value == value {
        return entry.value.clone();
      }

      let previous = std::mem::replace(&mut entry.value, value);
      if let Some((policy, duration)) = lifetime {
        entry.policy = policy;
        entry.duration = duration;
      }
      Metrics::record(&self.metrics.updates);
      self.reset_entry(state, index);
      previous
    } else {
      if state.store.len() >= state.max_size {
        self.evict_first(state);
      }
      let (policy, duration) =
        lifetime.unwrap_or((state.default_policy, state.default_expiration));
      state
        .store
        .insert(ExpiringEntry::new(key, value, policy, duration));
      Metrics::record(&self.metrics.inserts);
      self.rearm(state);
      None
    }
  }

  /// Removes the entry for `key` without notifying listeners.
  pub(crate) fn remove_internal(
    &self,
    state: &mut MapState<K, V>,
    index: Index,
  ) -> Option<ExpiringEntry<K, V>> {
    let entry = self.detach(state, index)?;
    Metrics::record(&self.metrics.removals);
    self.rearm(state);
    Some(entry)
  }

  /// Looks up `key`, resetting its deadline if its policy asks for it.
  ///
  /// Falls back to the loader on a miss.
  pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
    let found = {
      let state = self.state.read();
      state
        .store
        .find(key)
        .and_then(|index| state.store.get(index))
        .map(|entry| (entry.value.clone(), entry.policy))
    };

    match found {
      Some((value, policy)) => {
        Metrics::record(&self.metrics.hits);
        if policy == ExpirationPolicy::ResetOnAccess {
          let mut state = self.state.write();
          // The entry may have been removed or replaced since the read.
          if let Some(index) = state.store.find(key) {
            let still_resets = state
              .store
              .get(index)
              .map_or(false, |entry| entry.policy == ExpirationPolicy::ResetOnAccess);
            if still_resets {
              self.reset_entry(&mut state, index);
            }
          }
        }
        value
      }
      None => {
        Metrics::record(&self.metrics.misses);
        self.load(key)
      }
    }
  }

  /// Runs the loader for a missing key under the write lock.
  ///
  /// Concurrent misses on the same key queue on the lock; all but the first
  /// find the loaded entry and return it.
  fn load(&self, key: &K) -> Option<Arc<V>> {
    let loader = self.loader.as_ref()?;
    let mut state = self.state.write();

    if let Some(index) = state.store.find(key) {
      return state.store.get(index).and_then(|entry| entry.value.clone());
    }

    Metrics::record(&self.metrics.loads);
    match loader {
      Loader::Plain(load) => {
        let value = Arc::new(load(key));
        self.put_internal(&mut state, key.clone(), Some(Arc::clone(&value)), None);
        Some(value)
      }
      Loader::Expiring(load) => match load(key) {
        Some(loaded) => {
          let lifetime = (
            loaded.policy.unwrap_or(state.default_policy),
            loaded
              .duration
              .filter(|duration| !duration.is_zero())
              .unwrap_or(state.default_expiration),
          );
          let value = Arc::new(loaded.value);
          self.put_internal(
            &mut state,
            key.clone(),
            Some(Arc::clone(&value)),
            Some(lifetime),
          );
          Some(value)
        }
        None => {
          trace!("loader produced no value; installing placeholder");
          self.put_internal(&mut state, key.clone(), None, None);
          None
        }
      },
    }
  }

  /// Removes every entry without notifying listeners.
  pub(crate) fn clear(&self) {
    let mut state = self.state.write();
    state.armed = None;
    let mut drained = state.store.drain();
    for entry in &mut drained {
      entry.cancel();
    }
    debug!(removed = drained.len(), "cleared map");
  }
}
