use crate::policy::ExpirationPolicy;

use std::sync::Arc;
use std::time::Duration;

/// A value produced by an expiring entry loader, optionally carrying its own
/// expiration settings.
///
/// Settings left unset fall back to the map's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringValue<V> {
  pub(crate) value: V,
  pub(crate) duration: Option<Duration>,
  pub(crate) policy: Option<ExpirationPolicy>,
}

impl<V> ExpiringValue<V> {
  /// Wraps a value that uses the map's default duration and policy.
  pub fn new(value: V) -> Self {
    Self {
      value,
      duration: None,
      policy: None,
    }
  }

  pub fn with_duration(mut self, duration: Duration) -> Self {
    self.duration = Some(duration);
    self
  }

  pub fn with_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = Some(policy);
    self
  }

  pub fn value(&self) -> &V {
    &self.value
  }

  pub fn duration(&self) -> Option<Duration> {
    self.duration
  }

  pub fn policy(&self) -> Option<ExpirationPolicy> {
    self.policy
  }
}

/// The on-miss value producer configured for a map.
///
/// Loaders run under the map's write lock, which is what makes a load
/// happen at most once per missing key.
pub(crate) enum Loader<K, V> {
  /// Produces a value that uses the map's defaults.
  Plain(Arc<dyn Fn(&K) -> V + Send + Sync>),
  /// Produces a value with its own expiration, or `None` to install a
  /// placeholder.
  Expiring(Arc<dyn Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync>),
}
