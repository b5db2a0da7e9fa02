#![allow(dead_code)]

use fibre_expiring_map::{ExpirationListener, ExpiringMap, RemovalCause};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub const TINY_TTL: Duration = Duration::from_millis(150);
pub const SLEEP_MARGIN: Duration = Duration::from_millis(150);

pub type Event<K, V> = (K, Arc<V>, RemovalCause);

/// Forwards every notification into a channel.
pub struct ChannelListener<K, V> {
  // Listeners must be Sync.
  sender: Mutex<mpsc::Sender<Event<K, V>>>,
}

impl<K, V> ChannelListener<K, V> {
  pub fn new() -> (Self, mpsc::Receiver<Event<K, V>>) {
    let (tx, rx) = mpsc::channel();
    (
      Self {
        sender: Mutex::new(tx),
      },
      rx,
    )
  }
}

impl<K, V> ExpirationListener<K, V> for ChannelListener<K, V>
where
  K: Send,
  V: Send + Sync,
{
  fn on_expired(&self, key: K, value: Arc<V>, cause: RemovalCause) {
    let _ = self.sender.lock().unwrap().send((key, value, cause));
  }
}

/// A fixed-expiration map with the given duration.
pub fn build_map(expiration: Duration) -> ExpiringMap<&'static str, i32> {
  ExpiringMap::builder()
    .expiration(expiration)
    .build()
    .unwrap()
}

/// A variable-expiration map with the given default duration.
pub fn build_variable_map(expiration: Duration) -> ExpiringMap<&'static str, i32> {
  ExpiringMap::builder()
    .expiration(expiration)
    .variable_expiration()
    .build()
    .unwrap()
}
