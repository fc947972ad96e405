//! # Safe Math Operations
//!
//! Overflow-checked arithmetic, wide mul-div and the signed/unsigned conversions used
//! by the funding ledger and settlement engine.

use ethnum::{I256, U256};

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{PerpError, PerpResult};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked arithmetic returning a typed error
        pub fn $fn_name(a: $type, b: $type) -> PerpResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, PerpError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, PerpError::MathUnderflow);

safe_arith!(safe_add_u128, u128, checked_add, PerpError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, PerpError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, PerpError::MathOverflow);

safe_arith!(safe_add_i128, i128, checked_add, PerpError::MathOverflow);
safe_arith!(safe_sub_i128, i128, checked_sub, PerpError::MathUnderflow);
safe_arith!(safe_mul_i128, i128, checked_mul, PerpError::MathOverflow);

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round towards zero
    Down,
    /// Round away from zero
    Up,
}

/// `a * b / denominator` with a 256-bit intermediate
pub fn mul_div_u128(a: u128, b: u128, denominator: u128, rounding: Rounding) -> PerpResult<u128> {
    let result = mul_div_u256(U256::from(a), U256::from(b), U256::from(denominator), rounding)?;
    u256_to_u128(result)
}

/// `a * b / denominator` on 256-bit operands
pub fn mul_div_u256(a: U256, b: U256, denominator: U256, rounding: Rounding) -> PerpResult<U256> {
    if denominator == U256::ZERO {
        return Err(PerpError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(PerpError::MathOverflow)?;
    let quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        return quotient.checked_add(U256::ONE).ok_or(PerpError::MathOverflow);
    }
    Ok(quotient)
}

/// Signed `a * b / denominator`, truncating towards zero
pub fn mul_div_i256(a: I256, b: I256, denominator: I256) -> PerpResult<I256> {
    if denominator == I256::ZERO {
        return Err(PerpError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(PerpError::MathOverflow)?;
    product.checked_div(denominator).ok_or(PerpError::MathOverflow)
}

/// Narrow a U256 to u128
pub fn u256_to_u128(value: U256) -> PerpResult<u128> {
    u128::try_from(value).map_err(|_| PerpError::ConversionError)
}

/// Narrow an I256 to i128
pub fn i256_to_i128(value: I256) -> PerpResult<i128> {
    i128::try_from(value).map_err(|_| PerpError::ConversionError)
}

/// Reinterpret an unsigned amount as signed
pub fn u128_to_i128(value: u128) -> PerpResult<i128> {
    i128::try_from(value).map_err(|_| PerpError::ConversionError)
}

/// Take a fraction of `value` expressed in basis points
pub fn apply_bps(value: u128, bps: u32) -> PerpResult<u128> {
    mul_div_u128(value, bps as u128, BPS_DENOMINATOR as u128, Rounding::Down)
}

/// Scale factor between collateral decimals and the 18-decimal internal unit
pub fn collateral_scale(collateral_decimals: u8) -> PerpResult<u128> {
    let exponent = crate::constants::INTERNAL_DECIMALS
        .checked_sub(collateral_decimals)
        .ok_or(PerpError::ConversionError)?;
    10u128.checked_pow(exponent as u32).ok_or(PerpError::MathOverflow)
}
