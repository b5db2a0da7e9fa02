mod common;

use common::{build_map, build_variable_map, ChannelListener, SLEEP_MARGIN, TINY_TTL};
use fibre_expiring_map::{ExpirationPolicy, ExpiringMap, MapError, RemovalCause};
use std::{thread, time::Duration};

#[test]
fn test_fixed_map_rejects_variable_operations() {
  let map = build_map(Duration::from_secs(60));
  map.put("a", 1);

  let unsupported = MapError::VariableExpirationDisabled;
  assert_eq!(
    map.put_with_expiration("b", 2, TINY_TTL),
    Err(unsupported.clone())
  );
  assert_eq!(
    map.put_with_policy("b", 2, ExpirationPolicy::ResetOnAccess),
    Err(unsupported.clone())
  );
  assert_eq!(map.expiration_of(&"a"), Err(unsupported.clone()));
  assert_eq!(map.policy_of(&"a"), Err(unsupported.clone()));
  assert_eq!(map.set_expiration(&"a", TINY_TTL), Err(unsupported.clone()));
  assert_eq!(
    map.set_policy(&"a", ExpirationPolicy::ResetOnAccess),
    Err(unsupported.clone())
  );
  assert_eq!(map.set_default_expiration(TINY_TTL), Err(unsupported));

  // The default policy can change without breaking the shared duration.
  assert_eq!(map.set_default_policy(ExpirationPolicy::ResetOnAccess), Ok(()));
  assert_eq!(map.default_policy(), ExpirationPolicy::ResetOnAccess);

  // Expected expiration is available in both modes.
  assert!(map.expected_expiration(&"a").is_ok());
  assert!(!map.contains_key(&"b"));
  assert!(!map.is_variable_expiration());
}

#[test]
fn test_entries_expire_by_their_own_deadline() {
  let (listener, rx) = ChannelListener::new();
  let map = ExpiringMap::builder()
    .expiration(Duration::from_secs(60))
    .variable_expiration()
    .expiration_listener(listener)
    .build()
    .unwrap();

  map.put_with_expiration("slow", 1, TINY_TTL * 3).unwrap();
  map.put_with_expiration("fast", 2, TINY_TTL).unwrap();
  map.put("default", 3);

  let (key, _, cause) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!((key, cause), ("fast", RemovalCause::Expired));
  let (key, _, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(key, "slow");

  assert_eq!(map.keys(), vec!["default"]);
}

#[test]
fn test_put_with_overwrites_entry_settings() {
  let map = build_variable_map(Duration::from_secs(60));
  map.put("a", 1);
  assert_eq!(map.expiration_of(&"a"), Ok(Duration::from_secs(60)));

  assert_eq!(
    map
      .put_with("a", 2, ExpirationPolicy::ResetOnAccess, Duration::from_secs(5))
      .unwrap()
      .as_deref(),
    Some(&1)
  );
  assert_eq!(map.expiration_of(&"a"), Ok(Duration::from_secs(5)));
  assert_eq!(map.policy_of(&"a"), Ok(ExpirationPolicy::ResetOnAccess));

  // A plain put keeps the entry's own settings.
  map.put("a", 3);
  assert_eq!(map.expiration_of(&"a"), Ok(Duration::from_secs(5)));
  assert_eq!(map.policy_of(&"a"), Ok(ExpirationPolicy::ResetOnAccess));
}

#[test]
fn test_put_with_same_value_is_idempotent() {
  let map = build_variable_map(Duration::from_secs(60));
  map
    .put_with_expiration("a", 1, Duration::from_secs(10))
    .unwrap();
  map
    .put_with_expiration("a", 1, Duration::from_secs(10))
    .unwrap();

  assert_eq!(map.len(), 1);
  assert_eq!(map.expiration_of(&"a"), Ok(Duration::from_secs(10)));
  assert_eq!(map.metrics().updates, 0);
}

#[test]
fn test_set_expiration_restarts_deadline() {
  let map = build_variable_map(Duration::from_secs(60));
  map.put("a", 1);

  map.set_expiration(&"a", TINY_TTL).unwrap();
  assert_eq!(map.expiration_of(&"a"), Ok(TINY_TTL));
  assert!(map.expected_expiration(&"a").unwrap() <= TINY_TTL);

  thread::sleep(TINY_TTL + SLEEP_MARGIN);
  assert!(!map.contains_key(&"a"));

  // Missing keys are ignored.
  assert_eq!(map.set_expiration(&"missing", TINY_TTL), Ok(()));
  assert_eq!(map.expiration_of(&"missing"), Err(MapError::EntryNotFound));
}

#[test]
fn test_set_policy_changes_future_reads() {
  let map = build_variable_map(TINY_TTL);
  map.put("a", 1);
  map
    .set_policy(&"a", ExpirationPolicy::ResetOnAccess)
    .unwrap();

  for _ in 0..4 {
    thread::sleep(TINY_TTL / 3);
    assert!(map.get(&"a").is_some());
  }
}

#[test]
fn test_default_setters_apply_to_new_entries_only() {
  let map = build_variable_map(Duration::from_secs(60));
  map.put("old", 1);

  map.set_default_expiration(Duration::from_secs(5)).unwrap();
  map
    .set_default_policy(ExpirationPolicy::ResetOnAccess)
    .unwrap();
  assert_eq!(map.default_expiration(), Duration::from_secs(5));
  assert_eq!(map.default_policy(), ExpirationPolicy::ResetOnAccess);

  map.put("new", 2);
  assert_eq!(map.expiration_of(&"old"), Ok(Duration::from_secs(60)));
  assert_eq!(map.policy_of(&"old"), Ok(ExpirationPolicy::CreatedOnly));
  assert_eq!(map.expiration_of(&"new"), Ok(Duration::from_secs(5)));
  assert_eq!(map.policy_of(&"new"), Ok(ExpirationPolicy::ResetOnAccess));

  // put_with_policy uses the current default duration.
  map
    .put_with_policy("policy", 3, ExpirationPolicy::CreatedOnly)
    .unwrap();
  assert_eq!(map.expiration_of(&"policy"), Ok(Duration::from_secs(5)));
}

#[test]
fn test_zero_durations_are_rejected() {
  let map = build_variable_map(Duration::from_secs(60));

  assert_eq!(
    map.put_with_expiration("a", 1, Duration::ZERO),
    Err(MapError::ZeroExpiration)
  );
  assert_eq!(
    map.set_default_expiration(Duration::ZERO),
    Err(MapError::ZeroExpiration)
  );
  assert!(map.is_empty());
}

#[test]
fn test_shorter_entry_preempts_armed_timer() {
  let (listener, rx) = ChannelListener::new();
  let map = ExpiringMap::builder()
    .expiration(Duration::from_secs(60))
    .variable_expiration()
    .expiration_listener(listener)
    .build()
    .unwrap();

  map.put("long", 1);
  map.put_with_expiration("short", 2, TINY_TTL).unwrap();

  let started = std::time::Instant::now();
  let (key, _, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
  assert_eq!(key, "short");
  assert!(started.elapsed() < Duration::from_secs(1));
  assert!(map.contains_key(&"long"));
}
