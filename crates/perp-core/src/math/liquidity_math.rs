//! # Liquidity Math
//!
//! Base/quote amounts held by a concentrated-liquidity range and spot valuation of
//! base amounts. Base is token 0 and quote is token 1; sqrt prices are Q64.64.

use ethnum::U256;

use crate::constants::{Q64, Q64_RESOLUTION};
use crate::errors::{PerpError, PerpResult};
use crate::math::safe_math::{mul_div_u128, mul_div_u256, u256_to_u128, Rounding};

/// Base amount spanning `[sqrt_ratio_a, sqrt_ratio_b]` for `liquidity`:
/// `L * (sb - sa) / (sa * sb)`
pub fn get_amount_base_delta(
    sqrt_ratio_a_x64: u128,
    sqrt_ratio_b_x64: u128,
    liquidity: u128,
    rounding: Rounding,
) -> PerpResult<u128> {
    let (lower, upper) = ordered(sqrt_ratio_a_x64, sqrt_ratio_b_x64);
    if lower == 0 {
        return Err(PerpError::DivisionByZero);
    }

    let numerator1 = U256::from(liquidity) << Q64_RESOLUTION;
    let numerator2 = U256::from(upper - lower);
    let scaled = mul_div_u256(numerator1, numerator2, U256::from(upper), rounding)?;

    let result = match rounding {
        Rounding::Down => scaled / U256::from(lower),
        Rounding::Up => {
            let lower = U256::from(lower);
            let quotient = scaled / lower;
            if scaled % lower != U256::ZERO {
                quotient + U256::ONE
            } else {
                quotient
            }
        }
    };
    u256_to_u128(result)
}

/// Quote amount spanning `[sqrt_ratio_a, sqrt_ratio_b]` for `liquidity`:
/// `L * (sb - sa)`
pub fn get_amount_quote_delta(
    sqrt_ratio_a_x64: u128,
    sqrt_ratio_b_x64: u128,
    liquidity: u128,
    rounding: Rounding,
) -> PerpResult<u128> {
    let (lower, upper) = ordered(sqrt_ratio_a_x64, sqrt_ratio_b_x64);
    mul_div_u128(liquidity, upper - lower, Q64, rounding)
}

/// Base and quote held by a range position at the current sqrt price
pub fn get_amounts_for_liquidity(
    sqrt_price_x64: u128,
    sqrt_lower_x64: u128,
    sqrt_upper_x64: u128,
    liquidity: u128,
    rounding: Rounding,
) -> PerpResult<(u128, u128)> {
    if sqrt_price_x64 <= sqrt_lower_x64 {
        let base = get_amount_base_delta(sqrt_lower_x64, sqrt_upper_x64, liquidity, rounding)?;
        Ok((base, 0))
    } else if sqrt_price_x64 < sqrt_upper_x64 {
        let base = get_amount_base_delta(sqrt_price_x64, sqrt_upper_x64, liquidity, rounding)?;
        let quote = get_amount_quote_delta(sqrt_lower_x64, sqrt_price_x64, liquidity, rounding)?;
        Ok((base, quote))
    } else {
        let quote = get_amount_quote_delta(sqrt_lower_x64, sqrt_upper_x64, liquidity, rounding)?;
        Ok((0, quote))
    }
}

/// Value a base amount in quote at a sqrt price: `base * s^2 / 2^128`
pub fn base_value_in_quote(base: u128, sqrt_price_x64: u128, rounding: Rounding) -> PerpResult<u128> {
    let price_x64 = price_x64_from_sqrt(sqrt_price_x64)?;
    mul_div_u128(base, price_x64, Q64, rounding)
}

/// Square a Q64.64 sqrt price into a Q64.64 price
pub fn price_x64_from_sqrt(sqrt_price_x64: u128) -> PerpResult<u128> {
    let squared = U256::from(sqrt_price_x64) * U256::from(sqrt_price_x64);
    u256_to_u128(squared >> Q64_RESOLUTION)
}

fn ordered(a: u128, b: u128) -> (u128, u128) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}
