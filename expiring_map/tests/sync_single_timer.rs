use fibre_expiring_map::{ExpiringMap, ThreadScheduler};
use std::sync::Arc;
use std::time::Duration;

fn build_scheduled_map(scheduler: &Arc<ThreadScheduler>) -> ExpiringMap<u32, u32> {
  ExpiringMap::builder()
    .expiration(Duration::from_secs(60))
    .variable_expiration()
    .scheduler(scheduler.clone())
    .build()
    .unwrap()
}

#[test]
fn test_one_timer_armed_at_a_time() {
  let scheduler = Arc::new(ThreadScheduler::new().unwrap());
  let map = build_scheduled_map(&scheduler);
  assert_eq!(scheduler.pending(), 0);

  for i in 0..50 {
    // Later keys expire sooner, so the armed timer keeps moving.
    let duration = Duration::from_secs(100 - u64::from(i));
    map.put_with_expiration(i, i, duration).unwrap();
    assert_eq!(scheduler.pending(), 1);
  }
  for i in 0..50 {
    assert_eq!(map.get(&i).as_deref(), Some(&i));
  }
  for i in (0..50).step_by(2) {
    map.remove(&i);
  }
  map.reset_expiration(&1);
  map.put(1_000, 0);

  assert_eq!(scheduler.pending(), 1);

  map.clear();
  assert_eq!(scheduler.pending(), 0);
  assert!(map.is_empty());
}

#[test]
fn test_removing_last_entry_disarms() {
  let scheduler = Arc::new(ThreadScheduler::new().unwrap());
  let map = build_scheduled_map(&scheduler);

  map.put(1, 1);
  assert_eq!(scheduler.pending(), 1);
  map.remove(&1);
  assert_eq!(scheduler.pending(), 0);
}
