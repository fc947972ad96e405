//! Property-based tests for the TWAP series, the funding ledger and settlement.

use feels_perp_core::math::safe_math::Rounding;
use feels_perp_core::math::tick_math::sqrt_price_at_tick;
use feels_perp_core::math::liquidity_math::get_amount_base_delta;
use feels_perp_core::math::growth_math::maker_funding_payment;
use feels_perp_core::settlement::to_collateral;
use feels_perp_core::{settle, CloseOutcome, EngineConfig, FundingLedger, TwapSeries, Q64};
use proptest::prelude::*;

// ============================================================================
// Test Strategies
// ============================================================================

/// Piecewise-constant path: (seconds held, value held)
fn value_path(max_len: usize) -> impl Strategy<Value = Vec<(u32, u128)>> {
    prop::collection::vec((1u32..5_000, 1u128..(u64::MAX as u128)), 1..max_len)
}

/// Funding steps: (rate, seconds, tick the price moves to afterwards)
fn funding_steps() -> impl Strategy<Value = Vec<(i128, u32, i32)>> {
    prop::collection::vec((-1_000_000_000_000i128..1_000_000_000_000, 1u32..1_000, -50i32..50), 1..40)
}

/// Cross every tracked tick the price passes moving from `from` to `to`
fn move_price(ledger: &mut FundingLedger, tracked: &[i32], from: i32, to: i32) {
    for &tick in tracked {
        let crossed_up = from < tick && tick <= to;
        let crossed_down = to < tick && tick <= from;
        if crossed_up || crossed_down {
            ledger.cross_bucket(tick).unwrap();
        }
    }
}

// ============================================================================
// TWAP Properties
// ============================================================================

proptest! {
    /// Averaging over the full history reproduces the exact time-weighted mean
    #[test]
    fn prop_full_window_average_is_exact(path in value_path(30), current in 1u128..(u64::MAX as u128)) {
        let mut series = TwapSeries::initialize(0);
        series.grow_capacity(64);

        let mut now = 0u32;
        let mut weighted = 0u128;
        for (held, value) in &path {
            now += held;
            series.write(now, *value).unwrap();
            weighted += value * (*held as u128);
        }

        let average = series.time_weighted_average(now, now, current).unwrap();
        prop_assert_eq!(average, weighted / now as u128);
    }

    /// Growing the buffer without writing leaves every lookup unchanged
    #[test]
    fn prop_grow_without_write_is_invisible(
        path in value_path(20),
        initial_cap in 1u16..16,
        grown_to in 1u16..256,
        window in 0u32..100_000,
    ) {
        let mut series = TwapSeries::initialize(0);
        series.grow_capacity(initial_cap);
        let mut now = 0u32;
        for (held, value) in &path {
            now += held;
            series.write(now, *value).unwrap();
        }

        let current = path[0].1;
        let before = series.time_weighted_average(window, now, current).unwrap();
        let latest = *series.latest();

        series.grow_capacity(grown_to);
        prop_assert_eq!(series.time_weighted_average(window, now, current).unwrap(), before);
        prop_assert_eq!(*series.latest(), latest);
    }

    /// Growing the buffer mid-stream does not change averages the smaller buffer still covers
    #[test]
    fn prop_capacity_growth_preserves_averages(
        path in prop::collection::vec((1u32..5_000, 1u128..(u64::MAX as u128)), 8..40),
        grow_at in 0usize..8,
        grown_to in 9u16..128,
        lookback in 1usize..5,
    ) {
        let mut small = TwapSeries::initialize(0);
        small.grow_capacity(8);
        let mut grown = small.clone();

        let mut now = 0u32;
        for (i, (held, value)) in path.iter().enumerate() {
            if i == grow_at {
                grown.grow_capacity(grown_to);
            }
            now += held;
            small.write(now, *value).unwrap();
            grown.write(now, *value).unwrap();
        }

        let window: u32 = path.iter().rev().take(lookback).map(|(held, _)| held).sum();
        let current = path[path.len() - 1].1;
        prop_assert_eq!(
            small.time_weighted_average(window, now, current).unwrap(),
            grown.time_weighted_average(window, now, current).unwrap()
        );
    }
}

// ============================================================================
// Funding Ledger Properties
// ============================================================================

proptest! {
    /// Crossing a tick twice without time passing restores its snapshot
    #[test]
    fn prop_double_cross_is_identity(
        rate in any::<i64>(),
        elapsed in 1u32..100_000,
        tick_current in -100i32..100,
    ) {
        let mut ledger = FundingLedger::new(0);
        ledger.funding_rate_per_second = rate as i128;
        ledger.advance(elapsed / 2, Q64).unwrap();
        ledger.initialize_bucket(0, tick_current).unwrap();
        ledger.advance(elapsed, Q64).unwrap();

        let before = *ledger.bucket(0).unwrap();
        ledger.cross_bucket(0).unwrap();
        ledger.cross_bucket(0).unwrap();
        prop_assert_eq!(*ledger.bucket(0).unwrap(), before);
    }

    /// Range growth equals funding integrated while the price sat in each region,
    /// and adjacent ranges add up to their union
    #[test]
    fn prop_range_growth_matches_brute_force(start_tick in -50i32..50, steps in funding_steps()) {
        let (a, b, c) = (-20, 0, 20);
        let tracked = [a, b, c];

        let mut ledger = FundingLedger::new(0);
        for tick in tracked {
            ledger.initialize_bucket(tick, start_tick).unwrap();
        }

        let mut now = 0u32;
        let mut tick_current = start_tick;
        let mut expected_below_a = 0i128;
        let mut expected_ab = 0i128;
        let mut expected_bc = 0i128;

        for (rate, elapsed, next_tick) in steps {
            ledger.funding_rate_per_second = rate;
            now += elapsed;
            ledger.advance(now, Q64).unwrap();

            let accrued = rate * elapsed as i128;
            if tick_current < a {
                expected_below_a += accrued;
            } else if tick_current < b {
                expected_ab += accrued;
            } else if tick_current < c {
                expected_bc += accrued;
            }

            move_price(&mut ledger, &tracked, tick_current, next_tick);
            tick_current = next_tick;
        }

        let ab = ledger.range_growth(a, b, tick_current).unwrap();
        let bc = ledger.range_growth(b, c, tick_current).unwrap();
        let ac = ledger.range_growth(a, c, tick_current).unwrap();

        prop_assert_eq!(ab.below_lower, expected_below_a);
        prop_assert_eq!(ab.inside, expected_ab);
        prop_assert_eq!(bc.inside, expected_bc);
        prop_assert_eq!(ab.inside.wrapping_add(bc.inside), ac.inside);
        // At a unit sqrt price the scaled accumulator tracks the plain one
        prop_assert_eq!(ac.inside_scaled, ac.inside);
    }

    /// Equal mark and index TWAPs never produce a funding rate
    #[test]
    fn prop_equal_twaps_zero_rate(sqrt_price in (Q64 / 1_000)..(Q64 * 1_000), interval in 1u32..1_000_000) {
        let mut ledger = FundingLedger::new(0);
        ledger.funding_rate_per_second = 42;
        ledger.refresh_rate(sqrt_price, sqrt_price, interval).unwrap();
        prop_assert_eq!(ledger.funding_rate_per_second, 0);
    }

    /// A maker below its range pays funding on its full base amount
    #[test]
    fn prop_maker_below_range_pays_on_full_base(
        liquidity in 1u128..1_000_000_000_000_000_000_000,
        delta in -1_000_000_000_000_000i128..1_000_000_000_000_000,
    ) {
        let sqrt_lower = sqrt_price_at_tick(-600).unwrap();
        let sqrt_upper = sqrt_price_at_tick(600).unwrap();
        let base = get_amount_base_delta(sqrt_lower, sqrt_upper, liquidity, Rounding::Down).unwrap();

        let owed = maker_funding_payment(liquidity, sqrt_lower, sqrt_upper, delta, 0, 0).unwrap();
        let expected = (base as i128 * delta) / Q64 as i128;
        prop_assert_eq!(owed, expected);
    }
}

// ============================================================================
// Settlement Properties
// ============================================================================

proptest! {
    /// Payout, reward and insurance never exceed the effective margin, and bad debt
    /// appears only when the effective margin is negative
    #[test]
    fn prop_settlement_conserves_margin(
        margin in 1u64..1_000_000_000_000,
        pnl in -1_000_000_000_000_000_000_000i128..1_000_000_000_000_000_000_000,
        funding in -1_000_000_000_000_000_000i128..1_000_000_000_000_000_000,
        notional in 0u128..100_000_000_000_000_000_000_000,
    ) {
        let config = EngineConfig::default();
        let settlement = settle(&config, margin, pnl, funding, notional).unwrap();

        if settlement.effective_margin < 0 {
            prop_assert_eq!(settlement.outcome, CloseOutcome::Insolvent);
            prop_assert_eq!(settlement.bad_debt, settlement.effective_margin.unsigned_abs());
            prop_assert_eq!(settlement.holder_payout, 0);
        } else {
            prop_assert_eq!(settlement.bad_debt, 0);
            let available = to_collateral(settlement.effective_margin as u128, config.collateral_decimals).unwrap();
            let paid = settlement.holder_payout + settlement.liquidator_reward + settlement.insurance_share;
            prop_assert!(paid <= available);
            prop_assert!(available - paid <= 2);
        }
    }
}
