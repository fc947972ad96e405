//! # Funding
//!
//! Price-bucket funding ledger and the funding owed by positions.

pub mod ledger;

pub use ledger::{BucketSnapshot, FundingLedger, RangeGrowth};

use crate::errors::PerpResult;
use crate::math::growth_math::maker_funding_payment;
use crate::math::tick_math::sqrt_price_at_tick;

/// Funding owed by a maker range between its entry growth and `current` growth
pub fn maker_funding_owed(
    liquidity: u128,
    tick_lower: i32,
    tick_upper: i32,
    entry: &RangeGrowth,
    current: &RangeGrowth,
) -> PerpResult<i128> {
    let delta = current.since(entry);
    maker_funding_payment(
        liquidity,
        sqrt_price_at_tick(tick_lower)?,
        sqrt_price_at_tick(tick_upper)?,
        delta.below_lower,
        delta.inside,
        delta.inside_scaled,
    )
}
