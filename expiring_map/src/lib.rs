//! A concurrent, self-expiring map.
//!
//! Entries are removed by a background timer as soon as their deadline
//! passes, not lazily on the next read. Removals are reported to expiration
//! listeners, which may run inline or on a worker pool.
//!
//! # Features
//! - **Active expiration**: a single timer is armed per map, always for the
//!   entry that expires soonest.
//! - **Expiration policies**: `CreatedOnly` deadlines, or `ResetOnAccess`
//!   deadlines that restart on every read.
//! - **Variable expiration**: optional per-entry durations and policies.
//! - **Max size**: inserting into a full map evicts the soonest-expiring entry.
//! - **Loaders**: missing keys can be computed on `get`, at most once per miss.
//! - **Non-Clone values**: values are stored and returned as `Arc<V>`.
//!
//! ```
//! use fibre_expiring_map::{ExpirationPolicy, ExpiringMap};
//! use std::time::Duration;
//!
//! let map = ExpiringMap::builder()
//!   .expiration(Duration::from_secs(30))
//!   .expiration_policy(ExpirationPolicy::ResetOnAccess)
//!   .max_size(1_000)
//!   .build()
//!   .unwrap();
//!
//! map.put("session", 42);
//! assert_eq!(map.get(&"session").as_deref(), Some(&42));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod runtime;

// Internal, crate-only modules
mod entry;
mod loader;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::ExpiringMapBuilder;
pub use error::{BuildError, MapError};
pub use handles::ExpiringMap;
pub use listener::{ExpirationListener, ListenerId, RemovalCause};
pub use loader::ExpiringValue;
pub use metrics::MetricsSnapshot;
pub use policy::ExpirationPolicy;
pub use runtime::{Cancel, Executor, Scheduler, Task, TimerHandle};
pub use task::pool::ThreadPool;
pub use task::timer::ThreadScheduler;

#[cfg(feature = "tokio")]
pub use runtime::TokioExecutor;
