use std::time::{Duration, Instant};

// Roughly a century; far enough out to mean "never" for a cache deadline.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Returns `now + duration`, saturating instead of panicking on overflow.
#[inline]
pub(crate) fn deadline_after(now: Instant, duration: Duration) -> Instant {
  now
    .checked_add(duration)
    .or_else(|| now.checked_add(FAR_FUTURE))
    .unwrap_or(now)
}
