//! Keyed storage for entries, ordered by when they expire.
//!
//! Two backends implement [`EntryStore`]:
//! - [`InsertionOrderedStore`]: O(1) insert and remove. Expiration order is
//!   insertion order, which only holds while every entry shares one duration.
//! - [`DeadlineOrderedStore`]: O(log n) insert and remove, ordered by each
//!   entry's own deadline. Required for variable expiration.
//!
//! The backend is chosen once, when the map is built.

mod deadline;
mod insertion;

pub(crate) use deadline::DeadlineOrderedStore;
pub(crate) use insertion::InsertionOrderedStore;

use crate::entry::ExpiringEntry;

use std::hash::Hash;

pub(crate) use generational_arena::Index;

/// The contract shared by both store backends.
///
/// Entries are addressed by generational `Index`, so an index held by a
/// stale timer resolves to `None` once its entry is gone, even if the slot
/// has been reused.
pub(crate) trait EntryStore<K, V>: Send + Sync {
  fn len(&self) -> usize;

  /// Looks up the index of the entry for `key`.
  fn find(&self, key: &K) -> Option<Index>;

  fn get(&self, index: Index) -> Option<&ExpiringEntry<K, V>>;

  fn get_mut(&mut self, index: Index) -> Option<&mut ExpiringEntry<K, V>>;

  /// Returns the entry that expires soonest.
  fn first(&self) -> Option<Index>;

  /// Stores an entry whose key is not yet present.
  fn insert(&mut self, entry: ExpiringEntry<K, V>) -> Index;

  fn remove(&mut self, index: Index) -> Option<ExpiringEntry<K, V>>;

  /// Repositions an entry after its deadline changed.
  fn reorder(&mut self, index: Index);

  /// Removes and returns every entry.
  fn drain(&mut self) -> Vec<ExpiringEntry<K, V>>;

  /// Iterates over entries, soonest to expire first.
  fn iter(&self) -> Box<dyn Iterator<Item = &ExpiringEntry<K, V>> + '_>;
}

/// Creates the backend matching the map's expiration mode.
pub(crate) fn new_store<K, V>(variable_expiration: bool) -> Box<dyn EntryStore<K, V>>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  if variable_expiration {
    Box::new(DeadlineOrderedStore::new())
  } else {
    Box::new(InsertionOrderedStore::new())
  }
}
