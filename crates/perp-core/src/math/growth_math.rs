//! # Growth Math
//!
//! "Growth outside" accounting for tick-indexed funding, and the funding owed by
//! maker and taker positions from growth deltas. Accumulators are signed Q64.64 and
//! wrap modulo 2^128, so every subtraction here is a wrapping one.

use ethnum::I256;

use crate::constants::Q64;
use crate::errors::PerpResult;
use crate::math::liquidity_math::get_amount_base_delta;
use crate::math::safe_math::{i256_to_i128, mul_div_i256, Rounding};

/// Subtract growth values with wraparound
pub fn sub_growth(a: i128, b: i128) -> i128 {
    a.wrapping_sub(b)
}

/// Growth accrued while the price sat below `tick`
pub fn growth_below(tick: i32, tick_current: i32, growth_global: i128, growth_outside: i128) -> i128 {
    if tick_current >= tick {
        growth_outside
    } else {
        sub_growth(growth_global, growth_outside)
    }
}

/// Growth accrued while the price sat at or above `tick`
pub fn growth_above(tick: i32, tick_current: i32, growth_global: i128, growth_outside: i128) -> i128 {
    if tick_current < tick {
        growth_outside
    } else {
        sub_growth(growth_global, growth_outside)
    }
}

/// Growth inside `[tick_lower, tick_upper)`: global - below - above
pub fn growth_inside(
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    growth_global: i128,
    growth_outside_lower: i128,
    growth_outside_upper: i128,
) -> i128 {
    let below = growth_below(tick_lower, tick_current, growth_global, growth_outside_lower);
    let above = growth_above(tick_upper, tick_current, growth_global, growth_outside_upper);
    sub_growth(sub_growth(growth_global, below), above)
}

/// Funding owed by a maker range since its entry snapshot.
///
/// Below the range the maker holds the full base amount of the range; inside it holds
/// `L * (1/s - 1/s_upper)`, which integrates to `L * (Δscaled - Δinside / s_upper)`;
/// above the range it holds no base. Positive means the maker pays.
pub fn maker_funding_payment(
    liquidity: u128,
    sqrt_lower_x64: u128,
    sqrt_upper_x64: u128,
    delta_below: i128,
    delta_inside: i128,
    delta_inside_scaled: i128,
) -> PerpResult<i128> {
    let q64 = I256::from(Q64);
    let base_below = get_amount_base_delta(sqrt_lower_x64, sqrt_upper_x64, liquidity, Rounding::Down)?;

    let below_term = mul_div_i256(I256::from(delta_below), I256::from(base_below), q64)?;

    let inside_unscaled = mul_div_i256(I256::from(delta_inside), q64, I256::from(sqrt_upper_x64))?;
    let inside_term = mul_div_i256(
        I256::from(liquidity),
        I256::from(delta_inside_scaled) - inside_unscaled,
        q64,
    )?;

    i256_to_i128(below_term + inside_term)
}

/// Funding owed by a taker: `size * Δcumulative / 2^64`, negated for shorts.
/// Positive means the taker pays.
pub fn taker_funding_payment(size: u128, is_long: bool, delta_cumulative: i128) -> PerpResult<i128> {
    let owed = mul_div_i256(I256::from(size), I256::from(delta_cumulative), I256::from(Q64))?;
    let owed = i256_to_i128(owed)?;
    Ok(if is_long { owed } else { -owed })
}
