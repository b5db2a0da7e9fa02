mod common;

use common::{ChannelListener, SLEEP_MARGIN, TINY_TTL};
use fibre_expiring_map::{ExpirationPolicy, ExpiringMap, ExpiringValue};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier,
};
use std::{thread, time::Duration};

#[test]
fn test_loader_fills_misses() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let map = ExpiringMap::builder()
    .entry_loader({
      let load_count = load_count.clone();
      move |key: &i32| {
        load_count.fetch_add(1, Ordering::SeqCst);
        key * 10
      }
    })
    .build()
    .unwrap();

  assert_eq!(map.get(&5).as_deref(), Some(&50));
  assert_eq!(map.get(&5).as_deref(), Some(&50));
  assert_eq!(load_count.load(Ordering::SeqCst), 1, "second get is a hit");
  assert!(map.contains_key(&5));

  let metrics = map.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.loads, 1);
  assert_eq!(metrics.inserts, 1);
}

#[test]
fn test_loader_runs_once_under_contention() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let num_threads = 16;

  let map = ExpiringMap::builder()
    .entry_loader({
      let load_count = load_count.clone();
      move |key: &i32| {
        load_count.fetch_add(1, Ordering::SeqCst);
        // Keep the load slow enough that every thread misses.
        thread::sleep(Duration::from_millis(50));
        key + 1
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let map = map.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        map.get(&7)
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(handle.join().unwrap().as_deref(), Some(&8));
  }
  assert_eq!(load_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_loaded_entry_expires_and_reloads() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let map = ExpiringMap::builder()
    .expiration(TINY_TTL)
    .entry_loader({
      let load_count = load_count.clone();
      move |_: &&str| load_count.fetch_add(1, Ordering::SeqCst)
    })
    .build()
    .unwrap();

  assert_eq!(map.get(&"k").as_deref(), Some(&0));
  thread::sleep(TINY_TTL + SLEEP_MARGIN);
  assert!(!map.contains_key(&"k"));
  assert_eq!(map.get(&"k").as_deref(), Some(&1));
}

#[test]
fn test_expiring_loader_sets_entry_lifetime() {
  let map = ExpiringMap::<&str, i32>::builder()
    .expiration(Duration::from_secs(60))
    .expiring_entry_loader(|key: &&str| match *key {
      "short" => Some(
        ExpiringValue::new(1)
          .with_duration(TINY_TTL)
          .with_policy(ExpirationPolicy::ResetOnAccess),
      ),
      _ => Some(ExpiringValue::new(2)),
    })
    .build()
    .unwrap();

  assert!(map.is_variable_expiration(), "expiring loader implies variable");
  assert_eq!(map.get(&"short").as_deref(), Some(&1));
  assert_eq!(map.get(&"long").as_deref(), Some(&2));

  assert_eq!(map.expiration_of(&"short"), Ok(TINY_TTL));
  assert_eq!(map.policy_of(&"short"), Ok(ExpirationPolicy::ResetOnAccess));
  assert_eq!(map.expiration_of(&"long"), Ok(Duration::from_secs(60)));
  assert_eq!(map.policy_of(&"long"), Ok(ExpirationPolicy::CreatedOnly));

  thread::sleep(TINY_TTL + SLEEP_MARGIN);
  assert!(!map.contains_key(&"short"));
  assert!(map.contains_key(&"long"));
}

#[test]
fn test_expiring_loader_placeholder() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let (listener, rx) = ChannelListener::new();
  let map = ExpiringMap::builder()
    .expiration(TINY_TTL)
    .expiration_listener(listener)
    .expiring_entry_loader({
      let load_count = load_count.clone();
      move |_: &&str| -> Option<ExpiringValue<i32>> {
        load_count.fetch_add(1, Ordering::SeqCst);
        None
      }
    })
    .build()
    .unwrap();

  assert_eq!(map.get(&"nothing"), None);
  assert_eq!(map.get(&"nothing"), None);
  assert_eq!(load_count.load(Ordering::SeqCst), 1, "placeholder suppresses reloads");

  assert!(map.contains_key(&"nothing"));
  assert_eq!(map.len(), 1);
  assert!(map.values().is_empty());
  assert!(map.entries().is_empty());
  assert_eq!(map.keys(), vec!["nothing"]);

  thread::sleep(TINY_TTL + SLEEP_MARGIN);
  assert!(!map.contains_key(&"nothing"), "placeholder expires normally");
  assert!(rx.try_recv().is_err(), "placeholders are not reported");

  assert_eq!(map.get(&"nothing"), None);
  assert_eq!(load_count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_put_if_absent_replaces_placeholder() {
  let map = ExpiringMap::builder()
    .expiration(Duration::from_secs(60))
    .expiring_entry_loader(|_: &&str| -> Option<ExpiringValue<i32>> { None })
    .build()
    .unwrap();

  assert_eq!(map.get(&"key"), None);
  assert!(map.contains_key(&"key"));

  assert_eq!(map.put_if_absent("key", 7), None);
  assert_eq!(map.get(&"key").as_deref(), Some(&7));
  assert_eq!(map.put_if_absent("key", 8).as_deref(), Some(&7));
  assert_eq!(map.len(), 1);
}

#[test]
fn test_put_without_get_does_not_load() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let map = ExpiringMap::builder()
    .entry_loader({
      let load_count = load_count.clone();
      move |_: &i32| {
        load_count.fetch_add(1, Ordering::SeqCst);
        0
      }
    })
    .build()
    .unwrap();

  map.put(1, 100);
  assert_eq!(map.get(&1).as_deref(), Some(&100));
  assert!(!map.contains_key(&2));
  assert_eq!(load_count.load(Ordering::SeqCst), 0);
}
