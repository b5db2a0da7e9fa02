use crate::error::BuildError;
use crate::handles::ExpiringMap;
use crate::loader::{ExpiringValue, Loader};
use crate::metrics::Metrics;
use crate::policy::ExpirationPolicy;
use crate::runtime::{self, Executor, Scheduler};
use crate::shared::{MapShared, MapState};
use crate::store;
use crate::task::notifier::Notifier;
use crate::ExpirationListener;

use core::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Expiration applied when none is configured.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(60);

type PlainLoaderFn<K, V> = Arc<dyn Fn(&K) -> V + Send + Sync>;
type ExpiringLoaderFn<K, V> = Arc<dyn Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync>;

/// A builder for creating `ExpiringMap` instances.
pub struct ExpiringMapBuilder<K, V> {
  expiration: Duration,
  policy: ExpirationPolicy,
  max_size: Option<usize>,
  variable_expiration: bool,
  entry_loader: Option<PlainLoaderFn<K, V>>,
  expiring_entry_loader: Option<ExpiringLoaderFn<K, V>>,
  listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  async_listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  scheduler: Option<Arc<dyn Scheduler>>,
  executor: Option<Arc<dyn Executor>>,
}

impl<K, V> fmt::Debug for ExpiringMapBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringMapBuilder")
      .field("expiration", &self.expiration)
      .field("policy", &self.policy)
      .field("max_size", &self.max_size)
      .field("variable_expiration", &self.variable_expiration)
      .field("listeners", &self.listeners.len())
      .field("async_listeners", &self.async_listeners.len())
      .finish_non_exhaustive()
  }
}

impl<K, V> Default for ExpiringMapBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General Configuration Methods ---
impl<K, V> ExpiringMapBuilder<K, V> {
  /// Creates a builder with the default settings: 60 second expiration,
  /// `CreatedOnly` policy, no size bound and a single fixed duration.
  pub fn new() -> Self {
    Self {
      expiration: DEFAULT_EXPIRATION,
      policy: ExpirationPolicy::CreatedOnly,
      max_size: None,
      variable_expiration: false,
      entry_loader: None,
      expiring_entry_loader: None,
      listeners: Vec::new(),
      async_listeners: Vec::new(),
      scheduler: None,
      executor: None,
    }
  }

  /// Sets the expiration applied to entries that don't carry their own.
  pub fn expiration(mut self, duration: Duration) -> Self {
    self.expiration = duration;
    self
  }

  /// Bounds the number of entries. Inserting a new key into a full map
  /// evicts the entry that expires soonest.
  pub fn max_size(mut self, max_size: usize) -> Self {
    self.max_size = Some(max_size);
    self
  }

  pub fn expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Allows entries to carry their own duration and policy, and allows the
  /// map-wide defaults to change after construction.
  ///
  /// Variable maps keep entries ordered by deadline, which costs
  /// `O(log n)` per insert instead of `O(1)`.
  pub fn variable_expiration(mut self) -> Self {
    self.variable_expiration = true;
    self
  }

  /// Sets a loader that computes the value for a key missing on `get`.
  ///
  /// Loaded entries use the map's default duration and policy. The loader
  /// runs under the map's write lock and must not call back into the map.
  pub fn entry_loader<F>(mut self, loader: F) -> Self
  where
    F: Fn(&K) -> V + Send + Sync + 'static,
  {
    self.entry_loader = Some(Arc::new(loader));
    self
  }

  /// Sets a loader whose values carry their own expiration settings.
  ///
  /// Returning `None` stores a valueless placeholder for the key, so the
  /// loader is not called again until the placeholder expires or is
  /// removed. Enables variable expiration.
  pub fn expiring_entry_loader<F>(mut self, loader: F) -> Self
  where
    F: Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync + 'static,
  {
    self.expiring_entry_loader = Some(Arc::new(loader));
    self.variable_expiration = true;
    self
  }

  /// Adds a listener called on the removing thread when an entry expires
  /// or is evicted.
  pub fn expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.listeners.push(Arc::new(listener));
    self
  }

  /// Adds a listener called on the map's executor when an entry expires or
  /// is evicted.
  pub fn async_expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.async_listeners.push(Arc::new(listener));
    self
  }

  /// Replaces the process-wide scheduler for this map.
  pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
    self.scheduler = Some(scheduler);
    self
  }

  /// Replaces the process-wide listener pool for this map.
  pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
    self.executor = Some(executor);
    self
  }
}

// --- Build Methods ---
impl<K, V> ExpiringMapBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: PartialEq + Send + Sync + 'static,
{
  /// Builds an `ExpiringMap`.
  pub fn build(self) -> Result<ExpiringMap<K, V>, BuildError> {
    self.validate()?;
    Ok(self.build_unchecked())
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.expiration.is_zero() {
      return Err(BuildError::ZeroExpiration);
    }
    if self.max_size == Some(0) {
      return Err(BuildError::ZeroMaxSize);
    }
    if self.entry_loader.is_some() && self.expiring_entry_loader.is_some() {
      return Err(BuildError::ConflictingLoaders);
    }
    Ok(())
  }

  pub(crate) fn build_unchecked(self) -> ExpiringMap<K, V> {
    let loader = match (self.entry_loader, self.expiring_entry_loader) {
      (Some(load), _) => Some(Loader::Plain(load)),
      (None, Some(load)) => Some(Loader::Expiring(load)),
      (None, None) => None,
    };

    // Start the shared listener pool with the map rather than on the first
    // notification, which happens under the map's lock.
    let executor = match self.executor {
      Some(executor) => Some(executor),
      None if !self.async_listeners.is_empty() => runtime::global_executor(),
      None => None,
    };

    let mut notifier = Notifier::new();
    for listener in self.listeners {
      notifier.add_sync(listener);
    }
    for listener in self.async_listeners {
      notifier.add_async(listener);
    }

    let state = MapState::new(
      store::new_store(self.variable_expiration),
      self.expiration,
      self.policy,
      self.max_size.unwrap_or(usize::MAX),
    );
    let scheduler = self.scheduler.unwrap_or_else(runtime::global_scheduler);

    let shared = Arc::new_cyclic(|this| MapShared {
      state: RwLock::new(state),
      notifier: RwLock::new(notifier),
      loader,
      variable_expiration: self.variable_expiration,
      scheduler,
      executor,
      metrics: Metrics::new(),
      this: this.clone(),
    });
    ExpiringMap { shared }
  }
}
