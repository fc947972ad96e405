//! # Settlement
//!
//! Turns a closing position's margin, realized P&L and funding into a payout
//! decision. Liquidation eligibility is always measured on the margin left after the
//! liquidation fee charged in the same settlement.

use ethnum::U256;

use crate::config::EngineConfig;
use crate::constants::BPS_DENOMINATOR;
use crate::errors::{PerpError, PerpResult};
use crate::math::safe_math::{
    apply_bps, collateral_scale, safe_add_i128, safe_mul_u128, safe_sub_i128, safe_sub_u128, u128_to_i128,
};
use crate::types::CloseOutcome;

/// Payout decision for a closing position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: CloseOutcome,
    /// `margin + pnl - funding` (18 decimals)
    pub effective_margin: i128,
    /// Fee actually charged (18 decimals)
    pub liquidation_fee: u128,
    /// Collateral owed to the holder
    pub holder_payout: u64,
    /// Collateral owed to the liquidating caller
    pub liquidator_reward: u64,
    /// Collateral owed to the insurance account
    pub insurance_share: u64,
    /// Shortfall (18 decimals)
    pub bad_debt: u128,
}

/// Leverage implied by `margin` strictly exceeds the threshold:
/// `margin * liquidation_leverage_bps < notional * 10_000`
pub fn is_liquidatable(margin: u128, notional: u128, liquidation_leverage_bps: u32) -> bool {
    U256::from(margin) * U256::from(liquidation_leverage_bps) < U256::from(notional) * U256::from(BPS_DENOMINATOR)
}

/// Convert collateral units to 18-decimal internal units
pub fn to_internal(amount: u64, collateral_decimals: u8) -> PerpResult<u128> {
    safe_mul_u128(amount as u128, collateral_scale(collateral_decimals)?)
}

/// Convert 18-decimal internal units to collateral units, rounding down
pub fn to_collateral(amount: u128, collateral_decimals: u8) -> PerpResult<u64> {
    let scaled = amount / collateral_scale(collateral_decimals)?;
    u64::try_from(scaled).map_err(|_| PerpError::ConversionError)
}

/// Decide how a position with posted `margin` (collateral units) settles.
///
/// `realized_pnl`, `funding` and `notional` are 18-decimal quote amounts; positive
/// funding is owed by the position.
pub fn settle(
    config: &EngineConfig,
    margin: u64,
    realized_pnl: i128,
    funding: i128,
    notional: u128,
) -> PerpResult<Settlement> {
    let decimals = config.collateral_decimals;
    let margin_internal = u128_to_i128(to_internal(margin, decimals)?)?;
    let effective_margin = safe_sub_i128(safe_add_i128(margin_internal, realized_pnl)?, funding)?;

    if effective_margin < 0 {
        return Ok(Settlement {
            outcome: CloseOutcome::Insolvent,
            effective_margin,
            liquidation_fee: 0,
            holder_payout: 0,
            liquidator_reward: 0,
            insurance_share: 0,
            bad_debt: effective_margin.unsigned_abs(),
        });
    }

    let effective = effective_margin.unsigned_abs();
    let fee = apply_bps(notional, config.liquidation_fee_bps)?.min(effective);
    let margin_after_fee = safe_sub_u128(effective, fee)?;

    if is_liquidatable(margin_after_fee, notional, config.liquidation_leverage_bps) {
        let reward = apply_bps(fee, config.liquidator_share_bps)?;
        let insurance = safe_sub_u128(fee, reward)?;
        return Ok(Settlement {
            outcome: CloseOutcome::Liquidated,
            effective_margin,
            liquidation_fee: fee,
            holder_payout: to_collateral(margin_after_fee, decimals)?,
            liquidator_reward: to_collateral(reward, decimals)?,
            insurance_share: to_collateral(insurance, decimals)?,
            bad_debt: 0,
        });
    }

    Ok(Settlement {
        outcome: CloseOutcome::Paid,
        effective_margin,
        liquidation_fee: 0,
        holder_payout: to_collateral(effective, decimals)?,
        liquidator_reward: 0,
        insurance_share: 0,
        bad_debt: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const E18: u128 = 1_000_000_000_000_000_000;

    // 20x threshold, 0.5% fee: margin after fee sits exactly at notional / 20
    // when the effective margin is 11/200 of notional.
    fn boundary_config() -> EngineConfig {
        EngineConfig {
            liquidation_leverage_bps: 200_000,
            liquidation_fee_bps: 50,
            liquidator_share_bps: 5_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_is_not_liquidatable() {
        assert!(!is_liquidatable(10 * E18, 200 * E18, 200_000));
        assert!(is_liquidatable(10 * E18 - 1, 200 * E18, 200_000));
        assert!(!is_liquidatable(0, 0, 200_000));
    }

    #[test]
    fn test_exactly_at_threshold_is_paid() {
        let settlement = settle(&boundary_config(), 11_000_000, 0, 0, 200 * E18).unwrap();
        assert_eq!(settlement.outcome, CloseOutcome::Paid);
        assert_eq!(settlement.holder_payout, 11_000_000);
        assert_eq!(settlement.liquidation_fee, 0);
    }

    #[test]
    fn test_one_unit_below_threshold_is_liquidated() {
        let settlement = settle(&boundary_config(), 11_000_000, 0, 1, 200 * E18).unwrap();
        assert_eq!(settlement.outcome, CloseOutcome::Liquidated);
        assert_eq!(settlement.liquidation_fee, E18);
        // Margin after fee is 10e18 - 1, truncated to collateral units
        assert_eq!(settlement.holder_payout, 9_999_999);
        assert_eq!(settlement.liquidator_reward, 500_000);
        assert_eq!(settlement.insurance_share, 500_000);
    }

    #[test]
    fn test_negative_effective_margin_is_bad_debt() {
        let settlement = settle(&boundary_config(), 1_000_000, -(3 * E18 as i128), 0, 50 * E18).unwrap();
        assert_eq!(settlement.outcome, CloseOutcome::Insolvent);
        assert_eq!(settlement.effective_margin, -(2 * E18 as i128));
        assert_eq!(settlement.bad_debt, 2 * E18);
        assert_eq!(settlement.holder_payout, 0);
    }

    #[test]
    fn test_fee_capped_at_effective_margin() {
        // Effective margin smaller than the fee: everything goes to the fee split
        let config = EngineConfig { liquidation_fee_bps: 1_000, ..boundary_config() };
        let settlement = settle(&config, 1_000_000, 0, 0, 100 * E18).unwrap();
        assert_eq!(settlement.outcome, CloseOutcome::Liquidated);
        assert_eq!(settlement.liquidation_fee, E18);
        assert_eq!(settlement.holder_payout, 0);
        assert_eq!(settlement.liquidator_reward + settlement.insurance_share, 1_000_000);
    }

    #[test]
    fn test_collateral_conversion() {
        assert_eq!(to_internal(1_000_000, 6).unwrap(), E18);
        assert_eq!(to_collateral(E18 + 999_999_999_999, 6).unwrap(), 1_000_000);
        assert_eq!(to_internal(5, 18).unwrap(), 5);
    }
}
