use super::{EntryStore, Index};
use crate::entry::ExpiringEntry;

use std::hash::Hash;

use ahash::HashMap;
use generational_arena::Arena;

struct Node<K, V> {
  entry: ExpiringEntry<K, V>,
  prev: Option<Index>,
  next: Option<Index>,
}

/// An insertion-ordered store: a doubly linked list threaded through an
/// arena, plus a key lookup.
///
/// The head is the oldest entry. With a uniform duration the oldest entry is
/// also the first to expire, and a reset entry moves to the tail.
pub(crate) struct InsertionOrderedStore<K, V> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K, V> InsertionOrderedStore<K, V>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::default(),
      head: None,
      tail: None,
    }
  }

  // Detaches a node from the list without removing it from the arena.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev = node.prev;
    let next = node.next;

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  // Appends a node that is already in the arena.
  fn push_back_node(&mut self, index: Index) {
    let old_tail = self.tail;
    self.nodes[index].prev = old_tail;
    self.nodes[index].next = None;
    self.tail = Some(index);

    match old_tail {
      Some(old_tail) => self.nodes[old_tail].next = Some(index),
      None => self.head = Some(index),
    }
  }
}

impl<K, V> EntryStore<K, V> for InsertionOrderedStore<K, V>
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
    self.nodes.get(index).map(|node| &node.entry)
  }

  fn get_mut(&mut self, index: Index) -> Option<&mut ExpiringEntry<K, V>> {
    self.nodes.get_mut(index).map(|node| &mut node.entry)
  }

  fn first(&self) -> Option<Index> {
    self.head
  }

  fn insert(&mut self, entry: ExpiringEntry<K, V>) -> Index {
    let key = entry.key.clone();
    let index = self.nodes.insert(Node {
      entry,
      prev: None,
      next: None,
    });
    self.lookup.insert(key, index);
    self.push_back_node(index);
    index
  }

  fn remove(&mut self, index: Index) -> Option<ExpiringEntry<K, V>> {
    if !self.nodes.contains(index) {
      return None;
    }
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.lookup.remove(&node.entry.key);
    Some(node.entry)
  }

  fn reorder(&mut self, index: Index) {
    if self.nodes.contains(index) && self.tail != Some(index) {
      self.unlink(index);
      self.push_back_node(index);
    }
  }

  fn drain(&mut self) -> Vec<ExpiringEntry<K, V>> {
    self.lookup.clear();
    self.head = None;
    self.tail = None;
    self.nodes.drain().map(|(_, node)| node.entry).collect()
  }

  fn iter(&self) -> Box<dyn Iterator<Item = &ExpiringEntry<K, V>> + '_> {
    let mut current = self.head;
    Box::new(std::iter::from_fn(move || {
      let node = &self.nodes[current?];
      current = node.next;
      Some(&node.entry)
    }))
  }
}
