//! Probabilistic access-frequency estimation
//!
//! Each record carries an 8-bit counter with a 16-bit decay timestamp in
//! minutes, packed into a single `u32` for storage. The counter grows
//! logarithmically under access (the increment probability shrinks as the
//! counter rises) and decays periodically, so sustained popularity is
//! required to keep a high value.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Counter value assigned to newly created records. A non-zero start keeps
/// fresh records from being evicted before they had a chance to be accessed.
pub const LFU_INIT_VAL: u8 = 5;

/// A record's frequency state: an 8-bit counter plus the minute timestamp of
/// its last decay check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyCounter {
    /// Unix minutes (mod 2^16) of the last decay inspection.
    pub last_decrement_min: u16,
    /// Logarithmic access counter.
    pub counter: u8,
}

impl FrequencyCounter {
    /// Fresh counter stamped at `now_min`.
    pub fn new(now_min: u16) -> Self {
        Self {
            last_decrement_min: now_min,
            counter: LFU_INIT_VAL,
        }
    }

    /// Pack into the stored form: decay timestamp in the high 16 bits of the
    /// low word, counter in the low 8 bits.
    pub fn encode(&self) -> u32 {
        (u32::from(self.last_decrement_min) << 8) | u32::from(self.counter)
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(raw: u32) -> Self {
        Self {
            last_decrement_min: ((raw >> 8) & 0xffff) as u16,
            counter: (raw & 0xff) as u8,
        }
    }
}

/// Minutes elapsed from `last` to `now` on the wrapping 16-bit minute clock.
pub fn elapsed_minutes(now: u16, last: u16) -> u16 {
    if now >= last {
        now - last
    } else {
        65535 - last + now
    }
}

/// Tunable frequency policy: logarithmic increments, periodic decay.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyEstimator {
    log_factor: u32,
    decay_minutes: u32,
}

impl FrequencyEstimator {
    pub fn new(log_factor: u32, decay_minutes: u32) -> Self {
        Self {
            log_factor,
            decay_minutes,
        }
    }

    /// Probabilistically increment `counter`.
    ///
    /// The increment probability is `1 / ((counter - INIT) * log_factor + 1)`,
    /// so with the default factor a counter of 255 represents millions of
    /// accesses. Saturates at 255.
    pub fn log_incr<R: Rng>(&self, counter: u8, rng: &mut R) -> u8 {
        if counter == 255 {
            return 255;
        }
        let baseval = counter.saturating_sub(LFU_INIT_VAL);
        let p = 1.0 / (f64::from(baseval) * f64::from(self.log_factor) + 1.0);
        if rng.gen::<f64>() < p {
            counter + 1
        } else {
            counter
        }
    }

    /// Apply decay if at least `decay_minutes` have passed since the last
    /// inspection.
    ///
    /// High counters (above twice the initial value) are halved, clamped at
    /// twice the initial value; lower non-zero counters lose one. Whenever
    /// decay is due the timestamp is restamped to `now_min`, even when the
    /// counter itself did not move.
    pub fn decr_if_due(&self, freq: FrequencyCounter, now_min: u16) -> FrequencyCounter {
        let elapsed = elapsed_minutes(now_min, freq.last_decrement_min);
        if u32::from(elapsed) < self.decay_minutes {
            return freq;
        }

        let counter = if freq.counter > 2 * LFU_INIT_VAL {
            (freq.counter / 2).max(2 * LFU_INIT_VAL)
        } else if freq.counter > 0 {
            freq.counter - 1
        } else {
            0
        };

        FrequencyCounter {
            last_decrement_min: now_min,
            counter,
        }
    }
}
