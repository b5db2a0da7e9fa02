use crate::policy::ExpirationPolicy;
use crate::runtime::TimerHandle;
use crate::time;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The removal task currently armed for an entry.
#[derive(Debug)]
pub(crate) struct ArmedTimer {
  /// Identifies this arming; a firing with a stale ticket is ignored.
  pub(crate) ticket: u64,
  pub(crate) handle: TimerHandle,
}

/// A stored key/value pair together with its expiration state.
#[derive(Debug)]
pub(crate) struct ExpiringEntry<K, V> {
  pub(crate) key: K,
  /// `None` marks a placeholder installed for a loader that produced no value.
  pub(crate) value: Option<Arc<V>>,
  pub(crate) policy: ExpirationPolicy,
  pub(crate) duration: Duration,
  pub(crate) expected_expiration: Instant,
  pub(crate) timer: Option<ArmedTimer>,
}

impl<K, V> ExpiringEntry<K, V> {
  pub(crate) fn new(
    key: K,
    value: Option<Arc<V>>,
    policy: ExpirationPolicy,
    duration: Duration,
  ) -> Self {
    Self {
      key,
      value,
      policy,
      duration,
      expected_expiration: time::deadline_after(Instant::now(), duration),
      timer: None,
    }
  }

  /// Restarts the deadline from `now`.
  ///
  /// The caller must reorder the entry in its store afterwards.
  #[inline]
  pub(crate) fn reset(&mut self, now: Instant) {
    self.expected_expiration = time::deadline_after(now, self.duration);
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: Instant) -> bool {
    self.expected_expiration <= now
  }

  /// Time left until the deadline; zero once it has passed.
  #[inline]
  pub(crate) fn remaining(&self, now: Instant) -> Duration {
    self.expected_expiration.saturating_duration_since(now)
  }

  /// Cancels the armed removal task, if any. Returns `true` if one was armed.
  pub(crate) fn cancel(&mut self) -> bool {
    match self.timer.take() {
      Some(armed) => {
        armed.handle.cancel();
        true
      }
      None => false,
    }
  }

  #[inline]
  pub(crate) fn is_armed_with(&self, ticket: u64) -> bool {
    self.timer.as_ref().map_or(false, |armed| armed.ticket == ticket)
  }
}
