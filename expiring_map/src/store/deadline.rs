use super::{EntryStore, Index};
use crate::entry::ExpiringEntry;

use std::collections::BTreeMap;
use std::hash::Hash;
use std::time::Instant;

use ahash::HashMap;
use generational_arena::Arena;

// Deadline first; equal deadlines fall back to (re)insertion order, so two
// distinct entries never compare equal.
type OrderKey = (Instant, u64);

struct Slot<K, V> {
  entry: ExpiringEntry<K, V>,
  order: OrderKey,
}

/// A deadline-ordered store: entries live in an arena, indexed by key and by
/// `(expected_expiration, sequence)` in a sorted map.
pub(crate) struct DeadlineOrderedStore<K, V> {
  slots: Arena<Slot<K, V>>,
  lookup: HashMap<K, Index>,
  order: BTreeMap<OrderKey, Index>,
  next_seq: u64,
}

impl<K, V> DeadlineOrderedStore<K, V>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new() -> Self {
    Self {
      slots: Arena::new(),
      lookup: HashMap::default(),
      order: BTreeMap::new(),
      next_seq: 0,
    }
  }

  fn order_key(&mut self, deadline: Instant) -> OrderKey {
    let seq = self.next_seq;
    self.next_seq += 1;
    (deadline, seq)
  }
}

impl<K, V> EntryStore<K, V> for DeadlineOrderedStore<K, V>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
{
  fn len(&self) -> usize {
    self.lookup.len()
  }

  fn find(&self, key: &K) -> Option<Index> {
    self.lookup.get(key).copied()
  }

  fn get(&self, index: Index) -> Option<&ExpiringEntry<K, V>> {
    self.slots.get(index).map(|slot| &slot.entry)
  }

  fn get_mut(&mut self, index: Index) -> Option<&mut ExpiringEntry<K, V>> {
    self.slots.get_mut(index).map(|slot| &mut slot.entry)
  }

  fn first(&self) -> Option<Index> {
    self.order.first_key_value().map(|(_, index)| *index)
  }

  fn insert(&mut self, entry: ExpiringEntry<K, V>) -> Index {
    let key = entry.key.clone();
    let order = self.order_key(entry.expected_expiration);
    let index = self.slots.insert(Slot { entry, order });
    self.lookup.insert(key, index);
    self.order.insert(order, index);
    index
  }

  fn remove(&mut self, index: Index) -> Option<ExpiringEntry<K, V>> {
    let slot = self.slots.remove(index)?;
    self.order.remove(&slot.order);
    self.lookup.remove(&slot.entry.key);
    Some(slot.entry)
  }

  fn reorder(&mut self, index: Index) {
    let Some(slot) = self.slots.get(index) else {
      return;
    };
    let (old_order, deadline) = (slot.order, slot.entry.expected_expiration);
    let new_order = self.order_key(deadline);

    self.order.remove(&old_order);
    self.order.insert(new_order, index);
    self.slots[index].order = new_order;
  }

  fn drain(&mut self) -> Vec<ExpiringEntry<K, V>> {
    self.lookup.clear();
    self.order.clear();
    self.slots.drain().map(|(_, slot)| slot.entry).collect()
  }

  fn iter(&self) -> Box<dyn Iterator<Item = &ExpiringEntry<K, V>> + '_> {
    Box::new(self.order.values().map(move |index| &self.slots[*index].entry))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::policy::ExpirationPolicy;
  use std::sync::Arc;
  use std::time::Duration;

  fn entry(key: i32, secs: u64) -> ExpiringEntry<i32, i32> {
    ExpiringEntry::new(
      key,
      Some(Arc::new(key)),
      ExpirationPolicy::CreatedOnly,
      Duration::from_secs(secs),
    )
  }

  fn keys(store: &DeadlineOrderedStore<i32, i32>) -> Vec<i32> {
    store.iter().map(|entry| entry.key).collect()
  }

  #[test]
  fn orders_by_deadline_not_insertion() {
    let mut store = DeadlineOrderedStore::new();
    store.insert(entry(1, 30));
    let two = store.insert(entry(2, 10));
    store.insert(entry(3, 20));

    assert_eq!(store.first(), Some(two));
    assert_eq!(keys(&store), vec![2, 3, 1]);
  }

  #[test]
  fn equal_deadlines_are_both_kept() {
    let mut store = DeadlineOrderedStore::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut a = entry(1, 10);
    let mut b = entry(2, 10);
    a.expected_expiration = deadline;
    b.expected_expiration = deadline;

    let first = store.insert(a);
    store.insert(b);

    assert_eq!(store.len(), 2);
    assert_eq!(store.first(), Some(first));
    assert_eq!(keys(&store), vec![1, 2]);
  }

  #[test]
  fn reorder_follows_new_deadline() {
    let mut store = DeadlineOrderedStore::new();
    let one = store.insert(entry(1, 10));
    store.insert(entry(2, 20));

    let now = Instant::now();
    let slot = store.get_mut(one).unwrap();
    slot.duration = Duration::from_secs(30);
    slot.reset(now);
    store.reorder(one);

    assert_eq!(keys(&store), vec![2, 1]);

    let slot = store.get_mut(one).unwrap();
    slot.duration = Duration::from_secs(1);
    slot.reset(now);
    store.reorder(one);

    assert_eq!(keys(&store), vec![1, 2]);
    assert_eq!(store.first(), Some(one));
  }

  #[test]
  fn remove_clears_every_index() {
    let mut store = DeadlineOrderedStore::new();
    let one = store.insert(entry(1, 10));
    store.insert(entry(2, 20));

    assert_eq!(store.remove(one).map(|e| e.key), Some(1));
    assert!(store.remove(one).is_none());
    assert!(store.find(&1).is_none());
    assert_eq!(keys(&store), vec![2]);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn drain_empties_the_store() {
    let mut store = DeadlineOrderedStore::new();
    store.insert(entry(1, 10));
    store.insert(entry(2, 5));

    assert_eq!(store.drain().len(), 2);
    assert!(store.first().is_none());
    assert_eq!(store.len(), 0);
    assert!(keys(&store).is_empty());
  }
}
