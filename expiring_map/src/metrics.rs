use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

/// Internal counters for a single map. All fields are atomic so they can be
/// bumped under a read lock.
#[derive(Debug)]
pub(crate) struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,
  pub(crate) expirations: CachePadded<AtomicU64>,
  pub(crate) evictions: CachePadded<AtomicU64>,
  created_at: Instant,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      expirations: CachePadded::new(AtomicU64::new(0)),
      evictions: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }

  #[inline]
  pub(crate) fn record(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if lookups == 0 {
        0.0
      } else {
        hits as f64 / lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      expirations: self.expirations.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
      uptime: self.created_at.elapsed(),
    }
  }
}

/// A point-in-time copy of a map's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Reads that found an entry, including loader placeholders.
  pub hits: u64,
  /// Reads that found no entry, whether or not a loader then ran.
  pub misses: u64,
  pub hit_ratio: f64,
  /// Loader invocations.
  pub loads: u64,
  /// New keys stored.
  pub inserts: u64,
  /// Existing keys overwritten with a different value.
  pub updates: u64,
  /// Explicit removals via `remove`/`remove_if`.
  pub removals: u64,
  /// Entries removed because their deadline passed.
  pub expirations: u64,
  /// Entries removed to respect `max_size`.
  pub evictions: u64,
  pub uptime: Duration,
}

impl fmt::Display for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "ExpiringMap metrics:")?;
    writeln!(f, "  hits: {} ({:.2}%)", self.hits, self.hit_ratio * 100.0)?;
    writeln!(f, "  misses: {}", self.misses)?;
    writeln!(f, "  loads: {}", self.loads)?;
    writeln!(f, "  inserts: {}, updates: {}", self.inserts, self.updates)?;
    writeln!(f, "  removals: {}", self.removals)?;
    writeln!(f, "  expirations: {}, evictions: {}", self.expirations, self.evictions)?;
    write!(f, "  uptime: {:?}", self.uptime)
  }
}
