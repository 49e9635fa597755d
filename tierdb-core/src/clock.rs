//! Reduced-resolution clocks backing eviction ranking
//!
//! Idle-time estimation does not need millisecond-fresh reads on every
//! sampled key. The LRU clock keeps a cached reduced-bits timestamp that a
//! periodic tick refreshes; when the configured refresh interval is coarser
//! than the clock resolution it falls back to a direct read instead.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resolution of the reduced LRU clock in milliseconds.
pub const LRU_CLOCK_RESOLUTION_MS: u64 = 1000;

/// The reduced clock wraps at 24 bits.
pub const LRU_CLOCK_MAX: u64 = (1 << 24) - 1;

/// Reduced-resolution monotonic-ish clock for LRU stamps.
pub struct LruClock {
    /// Cached reduced clock value, refreshed by [`LruClock::tick`].
    cached: AtomicU64,
    /// How often the owner promises to call `tick`, in milliseconds.
    refresh_interval_ms: u64,
}

impl LruClock {
    /// Create a clock that expects a `tick()` every `refresh_interval_ms`.
    pub fn new(refresh_interval_ms: u64) -> Self {
        Self {
            cached: AtomicU64::new(Self::read_raw()),
            refresh_interval_ms,
        }
    }

    fn read_raw() -> u64 {
        (Utc::now().timestamp_millis() as u64 / LRU_CLOCK_RESOLUTION_MS) & LRU_CLOCK_MAX
    }

    /// Refresh the cached value. Called periodically by the owning loop.
    pub fn tick(&self) {
        self.cached.store(Self::read_raw(), Ordering::Relaxed);
    }

    /// Current reduced clock value.
    ///
    /// Uses the cached value when the refresh interval is at least as fine
    /// as the clock resolution, otherwise resorts to a direct time read.
    pub fn now(&self) -> u64 {
        if self.refresh_interval_ms <= LRU_CLOCK_RESOLUTION_MS {
            self.cached.load(Ordering::Relaxed)
        } else {
            Self::read_raw()
        }
    }

    /// Minimum idle time in milliseconds for a record stamped at `stamp`,
    /// treating the reduced clock as having wrapped at most once.
    pub fn idle_time_ms(&self, stamp: u64) -> u64 {
        let now = self.now();
        if now >= stamp {
            (now - stamp) * LRU_CLOCK_RESOLUTION_MS
        } else {
            (now + (LRU_CLOCK_MAX - stamp)) * LRU_CLOCK_RESOLUTION_MS
        }
    }

    /// Current time in minutes, truncated to 16 bits. Suitable for storage
    /// as an LFU last-decrement stamp.
    pub fn minutes(&self) -> u16 {
        ((Utc::now().timestamp() / 60) & 0xffff) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_within_range() {
        let clock = LruClock::new(100);
        assert!(clock.now() <= LRU_CLOCK_MAX);
    }

    #[test]
    fn test_idle_time_fresh_stamp() {
        let clock = LruClock::new(100);
        clock.tick();
        let stamp = clock.now();
        // A just-stamped record has zero idle time at this resolution.
        assert_eq!(clock.idle_time_ms(stamp), 0);
    }

    #[test]
    fn test_idle_time_old_stamp() {
        let clock = LruClock::new(100);
        clock.tick();
        let now = clock.now();
        let stamp = now.saturating_sub(5);
        assert_eq!(clock.idle_time_ms(stamp), 5 * LRU_CLOCK_RESOLUTION_MS);
    }

    #[test]
    fn test_idle_time_wraparound() {
        let clock = LruClock::new(100);
        clock.tick();
        let now = clock.now();
        // Stamp "in the future" means the reduced clock wrapped once.
        let stamp = LRU_CLOCK_MAX - 2;
        if now < stamp {
            assert_eq!(
                clock.idle_time_ms(stamp),
                (now + (LRU_CLOCK_MAX - stamp)) * LRU_CLOCK_RESOLUTION_MS
            );
        }
    }

    #[test]
    fn test_coarse_refresh_falls_back_to_direct_read() {
        // Refresh interval coarser than the resolution: cached value is
        // never trusted, so a stale cache must not be observable.
        let clock = LruClock::new(LRU_CLOCK_RESOLUTION_MS * 10);
        clock.cached.store(0, Ordering::Relaxed);
        assert!(clock.now() > 0);
    }
}
