use std::fmt;
use std::sync::Arc;

/// Describes why an entry left the map and was reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// The entry's expiration deadline passed.
  Expired,
  /// The entry was the soonest to expire and made room for a new key
  /// because the map was at its max size.
  Evicted,
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Expired => write!(f, "expired"),
      RemovalCause::Evicted => write!(f, "evicted due to max size"),
    }
  }
}

/// A listener that is notified when entries expire or are evicted.
///
/// Explicit removals (`remove`, `clear`) are not reported.
///
/// Synchronous listeners run on the thread that performed the removal while
/// the map's write lock is held, so they must be fast and must not call back
/// into the same map. Asynchronous listeners run on the map's executor.
/// A panicking listener is logged and otherwise ignored.
pub trait ExpirationListener<K, V>: Send + Sync {
  fn on_expired(&self, key: K, value: Arc<V>, cause: RemovalCause);
}

impl<K, V, F> ExpirationListener<K, V> for F
where
  F: Fn(K, Arc<V>, RemovalCause) + Send + Sync,
{
  fn on_expired(&self, key: K, value: Arc<V>, cause: RemovalCause) {
    self(key, value, cause)
  }
}

/// Identifies a registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);
