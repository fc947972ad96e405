//! # TWAP Observation Series
//!
//! Cumulative-value time series for a single scalar (typically a Q64.64 sqrt price).
//! Observations live in a circular buffer whose capacity can grow but never shrink.
//! Newly allocated slots are pre-touched and only become usable once the writer wraps
//! past the previous end of the buffer; until then they are skipped by lookups.

use ethnum::U256;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_OBSERVATION_CAPACITY;
use crate::errors::{PerpError, PerpResult};
use crate::math::safe_math::u256_to_u128;

/// Single cumulative observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Timestamp of this observation
    pub timestamp: u32,
    /// Sum of `value * seconds` since the series was initialized
    pub cumulative_value: U256,
    /// Whether this slot has ever been written
    pub initialized: bool,
}

impl Observation {
    /// Roll this observation forward to `timestamp` with `value` held constant
    fn transform(&self, timestamp: u32, value: u128) -> PerpResult<Observation> {
        let elapsed = timestamp
            .checked_sub(self.timestamp)
            .ok_or(PerpError::InvalidTimestamp { now: timestamp, last: self.timestamp })?;
        let cumulative_value = self
            .cumulative_value
            .checked_add(U256::from(value) * U256::from(elapsed))
            .ok_or(PerpError::MathOverflow)?;
        Ok(Observation { timestamp, cumulative_value, initialized: true })
    }
}

/// Circular buffer of observations for one scalar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapSeries {
    /// Slot holding the newest observation
    write_index: u16,
    /// Slots currently in rotation
    usable_slot_count: u16,
    /// Slots allocated; rotation expands to this on the next wrap
    capacity_cap: u16,
    observations: Vec<Observation>,
}

impl TwapSeries {
    /// Start a series with a single zero observation at `now`
    pub fn initialize(now: u32) -> Self {
        Self {
            write_index: 0,
            usable_slot_count: 1,
            capacity_cap: 1,
            observations: vec![Observation { timestamp: now, cumulative_value: U256::ZERO, initialized: true }],
        }
    }

    /// Index of the newest observation
    pub fn write_index(&self) -> u16 {
        self.write_index
    }

    /// Number of slots in rotation
    pub fn usable_slot_count(&self) -> u16 {
        self.usable_slot_count
    }

    /// Number of slots allocated
    pub fn capacity_cap(&self) -> u16 {
        self.capacity_cap
    }

    /// Newest observation
    pub fn latest(&self) -> &Observation {
        &self.observations[self.write_index as usize]
    }

    /// Allocate slots up to `new_cap`. Returns the resulting capacity.
    pub fn grow_capacity(&mut self, new_cap: u16) -> u16 {
        let new_cap = new_cap.min(MAX_OBSERVATION_CAPACITY);
        if new_cap <= self.capacity_cap {
            return self.capacity_cap;
        }

        // Pre-touch the slots so later writes only overwrite
        self.observations.resize(
            new_cap as usize,
            Observation { timestamp: 1, cumulative_value: U256::ZERO, initialized: false },
        );
        debug!("observation capacity grown {} -> {}", self.capacity_cap, new_cap);
        self.capacity_cap = new_cap;
        self.capacity_cap
    }

    /// Record `value` as the scalar that prevailed since the newest observation.
    /// A second write at the same timestamp is ignored.
    pub fn write(&mut self, now: u32, value: u128) -> PerpResult<()> {
        let last = *self.latest();
        if now == last.timestamp {
            return Ok(());
        }
        if now < last.timestamp {
            return Err(PerpError::InvalidTimestamp { now, last: last.timestamp });
        }

        // Rotation expands only once the writer reaches the current end
        if self.capacity_cap > self.usable_slot_count && self.write_index == self.usable_slot_count - 1 {
            self.usable_slot_count = self.capacity_cap;
        }

        let next_index = (self.write_index + 1) % self.usable_slot_count;
        self.observations[next_index as usize] = last.transform(now, value)?;
        self.write_index = next_index;
        Ok(())
    }

    /// Time-weighted average of the scalar over the last `window` seconds.
    ///
    /// `current_value` is the scalar prevailing since the newest observation. The
    /// window start clamps to the oldest observation but the divisor stays `window`,
    /// so a series younger than the window averages low. With no accumulated change
    /// the current value is returned.
    pub fn time_weighted_average(&self, window: u32, now: u32, current_value: u128) -> PerpResult<u128> {
        if window == 0 {
            return Ok(current_value);
        }

        let cumulative_now = self.cumulative_at(now, now, current_value)?;
        let cumulative_start = self.cumulative_at(now.saturating_sub(window), now, current_value)?;
        let delta = cumulative_now
            .checked_sub(cumulative_start)
            .ok_or(PerpError::MathUnderflow)?;
        if delta == U256::ZERO {
            return Ok(current_value);
        }

        u256_to_u128(delta / U256::from(window))
    }

    /// Cumulative value at `target`, interpolating between stored observations
    pub fn cumulative_at(&self, target: u32, now: u32, current_value: u128) -> PerpResult<U256> {
        let last = self.latest();
        if target == last.timestamp {
            return Ok(last.cumulative_value);
        }
        if target > last.timestamp {
            if target > now {
                return Err(PerpError::InvalidTimestamp { now: target, last: now });
            }
            return Ok(last.transform(target, current_value)?.cumulative_value);
        }

        let oldest = self.oldest();
        if target <= oldest.timestamp {
            return Ok(oldest.cumulative_value);
        }

        let (before, after) = self.binary_search(target)?;
        if target == after.timestamp {
            return Ok(after.cumulative_value);
        }

        let span = after.timestamp - before.timestamp;
        let elapsed = target - before.timestamp;
        let growth = after
            .cumulative_value
            .checked_sub(before.cumulative_value)
            .ok_or(PerpError::MathUnderflow)?;
        let interpolated = growth
            .checked_mul(U256::from(elapsed))
            .ok_or(PerpError::MathOverflow)?
            / U256::from(span);
        before
            .cumulative_value
            .checked_add(interpolated)
            .ok_or(PerpError::MathOverflow)
    }

    /// Oldest usable observation; slot 0 until the buffer has wrapped
    fn oldest(&self) -> &Observation {
        let next = (self.write_index + 1) % self.usable_slot_count;
        let candidate = &self.observations[next as usize];
        if candidate.initialized {
            candidate
        } else {
            &self.observations[0]
        }
    }

    /// Find the stored pair with `before.timestamp <= target <= after.timestamp`.
    /// Assumes `oldest < target < newest`.
    fn binary_search(&self, target: u32) -> PerpResult<(Observation, Observation)> {
        let count = self.usable_slot_count as usize;
        let mut left = (self.write_index as usize + 1) % count;
        let mut right = left + count - 1;

        while left <= right {
            let mid = (left + right) / 2;
            let before = self.observations[mid % count];

            // Slots allocated but never written sit at the tail before the first wrap
            if !before.initialized {
                left = mid + 1;
                continue;
            }

            let after = self.observations[(mid + 1) % count];
            let target_at_or_after = before.timestamp <= target;
            if target_at_or_after && target <= after.timestamp {
                return Ok((before, after));
            }

            if !target_at_or_after {
                if mid == 0 {
                    break;
                }
                right = mid - 1;
            } else {
                left = mid + 1;
            }
        }

        Err(PerpError::SeriesNotInitialized)
    }
}
