use std::fmt;

/// Determines when an entry's expiration deadline is restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpirationPolicy {
  /// The deadline is set when the entry is created or its value replaced.
  #[default]
  CreatedOnly,
  /// The deadline is additionally restarted every time the entry is read.
  ResetOnAccess,
}

impl fmt::Display for ExpirationPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExpirationPolicy::CreatedOnly => write!(f, "expires after creation"),
      ExpirationPolicy::ResetOnAccess => write!(f, "expires after last access"),
    }
  }
}
