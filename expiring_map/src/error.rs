use thiserror::Error;

/// Errors that can occur when building an `ExpiringMap`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The map was configured with a zero expiration duration.
  #[error("expiration duration must be greater than zero")]
  ZeroExpiration,
  /// The map was configured with a max size of zero. Leave `max_size` unset
  /// for an unbounded map.
  #[error("max size must be greater than zero")]
  ZeroMaxSize,
  /// Both an `entry_loader` and an `expiring_entry_loader` were configured.
  #[error("only one of entry_loader or expiring_entry_loader may be set")]
  ConflictingLoaders,
}

/// Errors returned by individual `ExpiringMap` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
  /// Per-entry or map-wide expiration control was requested on a map that
  /// was built without `variable_expiration()`.
  #[error("operation unsupported without variable expiration")]
  VariableExpirationDisabled,
  /// A zero expiration duration was supplied.
  #[error("expiration duration must be greater than zero")]
  ZeroExpiration,
  /// A max size of zero was supplied.
  #[error("max size must be greater than zero")]
  ZeroMaxSize,
  /// The key has no entry in the map.
  #[error("no entry exists for the given key")]
  EntryNotFound,
}
