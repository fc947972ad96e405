//! # Funding Ledger
//!
//! Global funding accumulators plus a sparse mirror of the venue's active ticks.
//! Each active tick stores the funding accrued on the side opposite to the current
//! price, which lets range growth be derived in O(1) exactly like fee growth in a
//! concentrated-liquidity pool.

use std::collections::BTreeMap;

use ethnum::{I256, U256};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{Q64, Q64_RESOLUTION};
use crate::errors::{PerpError, PerpResult};
use crate::math::growth_math::{growth_below, growth_inside, sub_growth};
use crate::math::safe_math::{i256_to_i128, mul_div_i256, safe_mul_i128};

/// Funding accrued on the side of a tick opposite to the current price
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    /// Opposite-side cumulative funding (Q64.64)
    pub funding_opposite: i128,
    /// Opposite-side cumulative funding scaled by 1/sqrt price (Q64.64)
    pub funding_scaled_opposite: i128,
}

/// Funding growth attributed to a tick range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeGrowth {
    /// Growth while the price sat below the lower tick
    pub below_lower: i128,
    /// Growth while the price sat inside `[lower, upper)`
    pub inside: i128,
    /// Scaled growth while the price sat inside `[lower, upper)`
    pub inside_scaled: i128,
}

impl RangeGrowth {
    /// Component-wise wrapping difference `self - earlier`
    pub fn since(&self, earlier: &RangeGrowth) -> RangeGrowth {
        RangeGrowth {
            below_lower: sub_growth(self.below_lower, earlier.below_lower),
            inside: sub_growth(self.inside, earlier.inside),
            inside_scaled: sub_growth(self.inside_scaled, earlier.inside_scaled),
        }
    }
}

/// Global funding state and per-tick snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingLedger {
    /// Timestamp of the last advance
    pub last_update: u32,
    /// Premium paid per second by longs (Q64.64 price units)
    pub funding_rate_per_second: i128,
    /// Integral of the rate over time (Q64.64)
    pub cumulative_funding: i128,
    /// Integral of rate / sqrt price over time (Q64.64)
    pub cumulative_funding_scaled: i128,
    buckets: BTreeMap<i32, BucketSnapshot>,
}

impl FundingLedger {
    /// Create a ledger whose first interval starts at `now`
    pub fn new(now: u32) -> Self {
        Self { last_update: now, ..Default::default() }
    }

    /// Integrate the current rate over the time since the last advance, holding
    /// `sqrt_price_x64` as the price that prevailed during the interval.
    pub fn advance(&mut self, now: u32, sqrt_price_x64: u128) -> PerpResult<()> {
        let elapsed = now
            .checked_sub(self.last_update)
            .ok_or(PerpError::InvalidTimestamp { now, last: self.last_update })?;
        if elapsed == 0 {
            return Ok(());
        }
        if sqrt_price_x64 == 0 {
            return Err(PerpError::DivisionByZero);
        }

        let accrued = safe_mul_i128(self.funding_rate_per_second, elapsed as i128)?;
        let accrued_scaled = i256_to_i128(mul_div_i256(
            I256::from(accrued),
            I256::from(Q64),
            I256::from(sqrt_price_x64),
        )?)?;

        self.cumulative_funding = self.cumulative_funding.wrapping_add(accrued);
        self.cumulative_funding_scaled = self.cumulative_funding_scaled.wrapping_add(accrued_scaled);
        self.last_update = now;

        debug!(
            "funding advanced {}s at rate {}: cumulative={} scaled={}",
            elapsed, self.funding_rate_per_second, self.cumulative_funding, self.cumulative_funding_scaled
        );
        Ok(())
    }

    /// Re-derive the per-second rate from mark and index sqrt-price TWAPs:
    /// `(mark^2 - index^2) / interval`, compared in price space.
    pub fn refresh_rate(&mut self, mark_twap_x64: u128, index_twap_x64: u128, funding_interval: u32) -> PerpResult<()> {
        if funding_interval == 0 {
            return Err(PerpError::DivisionByZero);
        }
        let mark_price = square_x64(mark_twap_x64).as_i256();
        let index_price = square_x64(index_twap_x64).as_i256();
        let rate = (mark_price - index_price) / I256::from(funding_interval);

        self.funding_rate_per_second = i256_to_i128(rate)?;
        debug!(
            "funding rate refreshed: mark={} index={} rate={}",
            mark_twap_x64, index_twap_x64, self.funding_rate_per_second
        );
        Ok(())
    }

    /// Start tracking a tick that just became active.
    /// All growth so far is attributed to the side below the current price.
    pub fn initialize_bucket(&mut self, tick: i32, tick_current: i32) -> PerpResult<()> {
        if self.buckets.contains_key(&tick) {
            return Err(PerpError::BucketAlreadyInitialized(tick));
        }
        let snapshot = if tick <= tick_current {
            BucketSnapshot {
                funding_opposite: self.cumulative_funding,
                funding_scaled_opposite: self.cumulative_funding_scaled,
            }
        } else {
            BucketSnapshot::default()
        };
        self.buckets.insert(tick, snapshot);
        debug!("bucket {} initialized (current tick {})", tick, tick_current);
        Ok(())
    }

    /// Flip a tick's snapshot as the price crosses it
    pub fn cross_bucket(&mut self, tick: i32) -> PerpResult<()> {
        let global = self.cumulative_funding;
        let global_scaled = self.cumulative_funding_scaled;
        let snapshot = self
            .buckets
            .get_mut(&tick)
            .ok_or(PerpError::BucketNotInitialized(tick))?;
        snapshot.funding_opposite = sub_growth(global, snapshot.funding_opposite);
        snapshot.funding_scaled_opposite = sub_growth(global_scaled, snapshot.funding_scaled_opposite);
        debug!("bucket {} crossed", tick);
        Ok(())
    }

    /// Stop tracking a tick the venue no longer reports as active
    pub fn clear_bucket(&mut self, tick: i32) -> PerpResult<()> {
        self.buckets
            .remove(&tick)
            .ok_or(PerpError::BucketNotInitialized(tick))?;
        debug!("bucket {} cleared", tick);
        Ok(())
    }

    /// Snapshot stored for a tick, if it is tracked
    pub fn bucket(&self, tick: i32) -> Option<&BucketSnapshot> {
        self.buckets.get(&tick)
    }

    /// Whether a tick is tracked
    pub fn is_bucket_initialized(&self, tick: i32) -> bool {
        self.buckets.contains_key(&tick)
    }

    /// Number of tracked ticks
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Growth below `tick_lower` and inside `[tick_lower, tick_upper)`
    pub fn range_growth(&self, tick_lower: i32, tick_upper: i32, tick_current: i32) -> PerpResult<RangeGrowth> {
        if tick_lower >= tick_upper {
            return Err(PerpError::InvalidTickRange { lower: tick_lower, upper: tick_upper });
        }
        let lower = self
            .buckets
            .get(&tick_lower)
            .ok_or(PerpError::BucketNotInitialized(tick_lower))?;
        let upper = self
            .buckets
            .get(&tick_upper)
            .ok_or(PerpError::BucketNotInitialized(tick_upper))?;

        Ok(RangeGrowth {
            below_lower: growth_below(tick_lower, tick_current, self.cumulative_funding, lower.funding_opposite),
            inside: growth_inside(
                tick_lower,
                tick_upper,
                tick_current,
                self.cumulative_funding,
                lower.funding_opposite,
                upper.funding_opposite,
            ),
            inside_scaled: growth_inside(
                tick_lower,
                tick_upper,
                tick_current,
                self.cumulative_funding_scaled,
                lower.funding_scaled_opposite,
                upper.funding_scaled_opposite,
            ),
        })
    }
}

fn square_x64(sqrt_price_x64: u128) -> U256 {
    (U256::from(sqrt_price_x64) * U256::from(sqrt_price_x64)) >> Q64_RESOLUTION
}
