use crate::builder::ExpiringMapBuilder;
use crate::error::MapError;
use crate::listener::{ExpirationListener, ListenerId};
use crate::metrics::MetricsSnapshot;
use crate::policy::ExpirationPolicy;
use crate::shared::MapShared;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe map whose entries remove themselves once they expire.
///
/// Expiration is active: a background timer removes each entry as its
/// deadline passes and notifies the registered listeners, whether or not
/// the map is being read. Cloning the handle is cheap and shares the map.
///
/// Values are stored as `Arc<V>`, so `V` does not need to be `Clone`.
pub struct ExpiringMap<K, V> {
  pub(crate) shared: Arc<MapShared<K, V>>,
}

impl<K, V> Clone for ExpiringMap<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringMap")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V> Default for ExpiringMap<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

fn check_duration(duration: Duration) -> Result<(), MapError> {
  if duration.is_zero() {
    Err(MapError::ZeroExpiration)
  } else {
    Ok(())
  }
}

impl<K, V> ExpiringMap<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
{
  /// Creates a map with a 60 second, creation-based expiration and no size
  /// bound.
  pub fn new() -> Self {
    ExpiringMapBuilder::new().build_unchecked()
  }

  pub fn builder() -> ExpiringMapBuilder<K, V> {
    ExpiringMapBuilder::new()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  fn require_variable(&self) -> Result<(), MapError> {
    if self.shared.variable_expiration {
      Ok(())
    } else {
      Err(MapError::VariableExpirationDisabled)
    }
  }

  // --- Reads ---

  /// Returns the value for `key`.
  ///
  /// Reading an entry with the `ResetOnAccess` policy restarts its deadline.
  /// On a miss, the configured loader (if any) computes and stores the
  /// value; concurrent misses on the same key load it once.
  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    self.shared.get(key)
  }

  /// Returns `true` if the map holds an entry for `key`. Does not count as
  /// an access.
  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.state.read().store.find(key).is_some()
  }

  pub fn contains_value(&self, value: &V) -> bool {
    let state = self.shared.state.read();
    let found = state
      .store
      .iter()
      .any(|entry| entry.value.as_deref() == Some(value));
    found
  }

  pub fn len(&self) -> usize {
    self.shared.state.read().store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns a snapshot of the keys, soonest to expire first.
  pub fn keys(&self) -> Vec<K> {
    let state = self.shared.state.read();
    let keys = state.store.iter().map(|entry| entry.key.clone()).collect();
    keys
  }

  /// Returns a snapshot of the values, soonest to expire first.
  pub fn values(&self) -> Vec<Arc<V>> {
    let state = self.shared.state.read();
    let values = state
      .store
      .iter()
      .filter_map(|entry| entry.value.clone())
      .collect();
    values
  }

  /// Returns a snapshot of the key/value pairs, soonest to expire first.
  pub fn entries(&self) -> Vec<(K, Arc<V>)> {
    let state = self.shared.state.read();
    let entries = state
      .store
      .iter()
      .filter_map(|entry| entry.value.clone().map(|value| (entry.key.clone(), value)))
      .collect();
    entries
  }

  // --- Writes ---

  /// Stores `value` under `key`, returning the previous value.
  ///
  /// A new key gets the map's default duration and policy; an existing key
  /// keeps its own and has its deadline restarted. Storing a value equal to
  /// the current one is a no-op unless the entry resets on access.
  pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    self
      .shared
      .put_internal(&mut state, key, Some(Arc::new(value)), None)
  }

  /// Stores `value` with its own `policy` and the map's default duration.
  pub fn put_with_policy(
    &self,
    key: K,
    value: V,
    policy: ExpirationPolicy,
  ) -> Result<Option<Arc<V>>, MapError> {
    self.require_variable()?;
    let mut state = self.shared.state.write();
    let duration = state.default_expiration;
    Ok(self.shared.put_internal(
      &mut state,
      key,
      Some(Arc::new(value)),
      Some((policy, duration)),
    ))
  }

  /// Stores `value` with its own `duration` and the map's default policy.
  pub fn put_with_expiration(
    &self,
    key: K,
    value: V,
    duration: Duration,
  ) -> Result<Option<Arc<V>>, MapError> {
    self.require_variable()?;
    check_duration(duration)?;
    let mut state = self.shared.state.write();
    let policy = state.default_policy;
    Ok(self.shared.put_internal(
      &mut state,
      key,
      Some(Arc::new(value)),
      Some((policy, duration)),
    ))
  }

  /// Stores `value` with its own `policy` and `duration`.
  pub fn put_with(
    &self,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration: Duration,
  ) -> Result<Option<Arc<V>>, MapError> {
    self.require_variable()?;
    check_duration(duration)?;
    let mut state = self.shared.state.write();
    Ok(self.shared.put_internal(
      &mut state,
      key,
      Some(Arc::new(value)),
      Some((policy, duration)),
    ))
  }

  /// Stores every pair, in iteration order, under a single lock.
  pub fn put_all<I>(&self, entries: I)
  where
    I: IntoIterator<Item = (K, V)>,
  {
    let mut state = self.shared.state.write();
    for (key, value) in entries {
      self
        .shared
        .put_internal(&mut state, key, Some(Arc::new(value)), None);
    }
  }

  /// Stores `value` only if `key` has no value. Returns the existing value
  /// otherwise; `None` means the value was stored.
  ///
  /// A loader placeholder counts as absent and is replaced.
  pub fn put_if_absent(&self, key: K, value: V) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    let existing = state
      .store
      .find(&key)
      .and_then(|index| state.store.get(index))
      .and_then(|entry| entry.value.clone());
    if existing.is_some() {
      return existing;
    }
    self
      .shared
      .put_internal(&mut state, key, Some(Arc::new(value)), None)
  }

  /// Replaces the value for `key` only if it has an entry. Returns the
  /// previous value.
  pub fn replace(&self, key: K, value: V) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    state.store.find(&key)?;
    self
      .shared
      .put_internal(&mut state, key, Some(Arc::new(value)), None)
  }

  /// Replaces the value for `key` only if it currently equals `old`.
  pub fn replace_if(&self, key: K, old: &V, new: V) -> bool {
    let mut state = self.shared.state.write();
    let matches = state
      .store
      .find(&key)
      .and_then(|index| state.store.get(index))
      .map_or(false, |entry| entry.value.as_deref() == Some(old));
    if matches {
      self
        .shared
        .put_internal(&mut state, key, Some(Arc::new(new)), None);
    }
    matches
  }

  /// Removes the entry for `key`, returning its value. Listeners are not
  /// notified of explicit removals.
  pub fn remove(&self, key: &K) -> Option<Arc<V>> {
    let mut state = self.shared.state.write();
    let index = state.store.find(key)?;
    self
      .shared
      .remove_internal(&mut state, index)
      .and_then(|entry| entry.value)
  }

  /// Removes the entry for `key` only if its value equals `value`.
  pub fn remove_if(&self, key: &K, value: &V) -> bool {
    let mut state = self.shared.state.write();
    let Some(index) = state.store.find(key) else {
      return false;
    };
    let matches = state
      .store
      .get(index)
      .map_or(false, |entry| entry.value.as_deref() == Some(value));
    if matches {
      self.shared.remove_internal(&mut state, index);
    }
    matches
  }

  /// Removes every entry and cancels the pending expiration. Listeners are
  /// not notified.
  pub fn clear(&self) {
    self.shared.clear();
  }

  // --- Per-entry expiration ---

  /// Returns the duration configured for the entry under `key`.
  pub fn expiration_of(&self, key: &K) -> Result<Duration, MapError> {
    self.require_variable()?;
    let state = self.shared.state.read();
    state
      .store
      .find(key)
      .and_then(|index| state.store.get(index))
      .map(|entry| entry.duration)
      .ok_or(MapError::EntryNotFound)
  }

  /// Changes the duration of the entry under `key` and restarts its
  /// deadline. Does nothing if the key has no entry.
  pub fn set_expiration(&self, key: &K, duration: Duration) -> Result<(), MapError> {
    self.require_variable()?;
    check_duration(duration)?;
    let mut state = self.shared.state.write();
    if let Some(index) = state.store.find(key) {
      if let Some(entry) = state.store.get_mut(index) {
        entry.duration = duration;
      }
      self.shared.reset_entry(&mut state, index);
    }
    Ok(())
  }

  pub fn policy_of(&self, key: &K) -> Result<ExpirationPolicy, MapError> {
    self.require_variable()?;
    let state = self.shared.state.read();
    state
      .store
      .find(key)
      .and_then(|index| state.store.get(index))
      .map(|entry| entry.policy)
      .ok_or(MapError::EntryNotFound)
  }

  /// Changes the policy of the entry under `key`. The current deadline is
  /// left as is.
  pub fn set_policy(&self, key: &K, policy: ExpirationPolicy) -> Result<(), MapError> {
    self.require_variable()?;
    let mut state = self.shared.state.write();
    if let Some(index) = state.store.find(key) {
      if let Some(entry) = state.store.get_mut(index) {
        entry.policy = policy;
      }
    }
    Ok(())
  }

  /// Returns the time left before the entry under `key` expires.
  pub fn expected_expiration(&self, key: &K) -> Result<Duration, MapError> {
    let state = self.shared.state.read();
    state
      .store
      .find(key)
      .and_then(|index| state.store.get(index))
      .map(|entry| entry.remaining(Instant::now()))
      .ok_or(MapError::EntryNotFound)
  }

  /// Restarts the deadline of the entry under `key`. Returns `false` if the
  /// key has no entry.
  pub fn reset_expiration(&self, key: &K) -> bool {
    let mut state = self.shared.state.write();
    match state.store.find(key) {
      Some(index) => {
        self.shared.reset_entry(&mut state, index);
        true
      }
      None => false,
    }
  }

  // --- Map-wide settings ---

  pub fn default_expiration(&self) -> Duration {
    self.shared.state.read().default_expiration
  }

  /// Changes the duration given to entries stored from now on.
  pub fn set_default_expiration(&self, duration: Duration) -> Result<(), MapError> {
    self.require_variable()?;
    check_duration(duration)?;
    self.shared.state.write().default_expiration = duration;
    Ok(())
  }

  pub fn default_policy(&self) -> ExpirationPolicy {
    self.shared.state.read().default_policy
  }

  /// Changes the policy given to entries stored from now on. Works on fixed
  /// maps too.
  pub fn set_default_policy(&self, policy: ExpirationPolicy) -> Result<(), MapError> {
    self.shared.state.write().default_policy = policy;
    Ok(())
  }

  /// Returns the size bound, or `None` for an unbounded map.
  pub fn max_size(&self) -> Option<usize> {
    let max_size = self.shared.state.read().max_size;
    (max_size != usize::MAX).then_some(max_size)
  }

  /// Changes the size bound. Existing entries above the new bound are kept;
  /// the bound applies to insertions from now on.
  pub fn set_max_size(&self, max_size: usize) -> Result<(), MapError> {
    if max_size == 0 {
      return Err(MapError::ZeroMaxSize);
    }
    self.shared.state.write().max_size = max_size;
    Ok(())
  }

  pub fn is_variable_expiration(&self) -> bool {
    self.shared.variable_expiration
  }

  // --- Listeners ---

  /// Adds a listener called on the removing thread when an entry expires or
  /// is evicted.
  pub fn add_expiration_listener<L>(&self, listener: L) -> ListenerId
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.notifier.write().add_sync(Arc::new(listener))
  }

  pub fn remove_expiration_listener(&self, id: ListenerId) -> bool {
    self.shared.notifier.write().remove_sync(id)
  }

  /// Adds a listener called on the map's executor when an entry expires or
  /// is evicted.
  pub fn add_async_expiration_listener<L>(&self, listener: L) -> ListenerId
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.notifier.write().add_async(Arc::new(listener))
  }

  pub fn remove_async_expiration_listener(&self, id: ListenerId) -> bool {
    self.shared.notifier.write().remove_async(id)
  }
}
