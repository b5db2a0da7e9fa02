//! The user-facing map handle.

mod sync;

pub use sync::ExpiringMap;
