//! Test collaborators: a venue that trades at a fixed price, a constant index and a
//! balance-map custody.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::ops::Bound;

use feels_perp_core::math::liquidity_math::{base_value_in_quote, get_amounts_for_liquidity};
use feels_perp_core::math::safe_math::{mul_div_u128, Rounding};
use feels_perp_core::math::tick_math::{sqrt_price_at_tick, tick_at_sqrt_price};
use feels_perp_core::{
    AccountId, AmmVenue, Custody, EngineConfig, IndexOracle, Limits, MintReceipt, PerpEngine, PerpError, PerpResult,
    SwapDirection, VenueError, VenueResult, MAX_TICK, MIN_TICK, Q64,
};

pub const E18: u128 = 1_000_000_000_000_000_000;
pub const USDC: u64 = 1_000_000;

/// First trading timestamp. Engines start at 0, so by `T0` the default TWAP window
/// is covered by mark history.
pub const T0: u32 = 1_000;

pub type TestEngine = PerpEngine<FixedPriceVenue, FixedIndexOracle, MapCustody>;

// ============================================================================
// Venue
// ============================================================================

/// Venue that fills every swap at the current price without moving it.
/// The price only changes through `set_tick`.
#[derive(Debug, Clone, Default)]
pub struct FixedPriceVenue {
    created: bool,
    sqrt_price_x64: u128,
    tick: i32,
    tick_refs: BTreeMap<i32, u32>,
    ranges: BTreeMap<u64, (i32, i32, u128)>,
    next_range_id: u64,
    pub fail_swaps: bool,
}

impl FixedPriceVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liquidity placed by someone other than the engine
    pub fn with_external_range(mut self, tick_lower: i32, tick_upper: i32, liquidity: u128) -> Self {
        self.insert_range(tick_lower, tick_upper, liquidity);
        self
    }

    pub fn set_tick(&mut self, tick: i32) {
        self.sqrt_price_x64 = sqrt_price_at_tick(tick).unwrap();
        self.tick = tick;
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    fn insert_range(&mut self, tick_lower: i32, tick_upper: i32, liquidity: u128) -> u64 {
        self.next_range_id += 1;
        self.ranges.insert(self.next_range_id, (tick_lower, tick_upper, liquidity));
        *self.tick_refs.entry(tick_lower).or_default() += 1;
        *self.tick_refs.entry(tick_upper).or_default() += 1;
        self.next_range_id
    }

    fn release_tick(&mut self, tick: i32) {
        if let Some(refs) = self.tick_refs.get_mut(&tick) {
            *refs -= 1;
            if *refs == 0 {
                self.tick_refs.remove(&tick);
            }
        }
    }

    fn amounts(&self, tick_lower: i32, tick_upper: i32, liquidity: u128, rounding: Rounding) -> VenueResult<(u128, u128)> {
        let lower = sqrt_price_at_tick(tick_lower).map_err(|_| VenueError::InvalidRequest("tick"))?;
        let upper = sqrt_price_at_tick(tick_upper).map_err(|_| VenueError::InvalidRequest("tick"))?;
        get_amounts_for_liquidity(self.sqrt_price_x64, lower, upper, liquidity, rounding)
            .map_err(|_| VenueError::InvalidRequest("amounts"))
    }

    fn quote_for_base(&self, base: u128, rounding: Rounding) -> VenueResult<u128> {
        base_value_in_quote(base, self.sqrt_price_x64, rounding).map_err(|_| VenueError::InvalidRequest("overflow"))
    }

    fn base_for_quote(&self, quote: u128, rounding: Rounding) -> VenueResult<u128> {
        let step = mul_div_u128(quote, Q64, self.sqrt_price_x64, rounding)
            .map_err(|_| VenueError::InvalidRequest("overflow"))?;
        mul_div_u128(step, Q64, self.sqrt_price_x64, rounding).map_err(|_| VenueError::InvalidRequest("overflow"))
    }

    fn check_swap(&self) -> VenueResult<()> {
        if !self.created {
            return Err(VenueError::PoolNotInitialized);
        }
        if self.fail_swaps {
            return Err(VenueError::InsufficientLiquidity);
        }
        Ok(())
    }
}

impl AmmVenue for FixedPriceVenue {
    fn create_pool(&mut self, _tick_spacing: i32, sqrt_price_x64: u128) -> VenueResult<()> {
        if self.created {
            return Err(VenueError::PoolAlreadyInitialized);
        }
        self.tick = tick_at_sqrt_price(sqrt_price_x64).map_err(|_| VenueError::InvalidRequest("sqrt price"))?;
        self.sqrt_price_x64 = sqrt_price_x64;
        self.created = true;
        Ok(())
    }

    fn sqrt_price_and_tick(&self) -> VenueResult<(u128, i32)> {
        if !self.created {
            return Err(VenueError::PoolNotInitialized);
        }
        Ok((self.sqrt_price_x64, self.tick))
    }

    fn is_bucket_active(&self, tick: i32) -> VenueResult<bool> {
        Ok(self.tick_refs.contains_key(&tick))
    }

    fn next_active_bucket(&self, tick: i32, search_down: bool) -> VenueResult<(i32, bool)> {
        let found = if search_down {
            self.tick_refs.range(..=tick).next_back()
        } else {
            self.tick_refs.range((Bound::Excluded(tick), Bound::Unbounded)).next()
        };
        Ok(match found {
            Some((&next, _)) => (next, true),
            None if search_down => (MIN_TICK, false),
            None => (MAX_TICK, false),
        })
    }

    fn mint_liquidity(
        &mut self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        _limits: Limits,
    ) -> VenueResult<MintReceipt> {
        if !self.created {
            return Err(VenueError::PoolNotInitialized);
        }
        let (base, quote) = self.amounts(tick_lower, tick_upper, liquidity, Rounding::Up)?;
        let position_id = self.insert_range(tick_lower, tick_upper, liquidity);
        Ok(MintReceipt { position_id, base, quote })
    }

    fn burn_liquidity(&mut self, position_id: u64, _limits: Limits) -> VenueResult<(u128, u128)> {
        let (tick_lower, tick_upper, liquidity) = self
            .ranges
            .remove(&position_id)
            .ok_or(VenueError::PositionNotFound(position_id))?;
        self.release_tick(tick_lower);
        self.release_tick(tick_upper);
        self.amounts(tick_lower, tick_upper, liquidity, Rounding::Down)
    }

    fn swap_exact_in(&mut self, direction: SwapDirection, amount_in: u128, _limits: Limits) -> VenueResult<u128> {
        self.check_swap()?;
        match direction {
            SwapDirection::BaseToQuote => self.quote_for_base(amount_in, Rounding::Down),
            SwapDirection::QuoteToBase => self.base_for_quote(amount_in, Rounding::Down),
        }
    }

    fn swap_exact_out(&mut self, direction: SwapDirection, amount_out: u128, _limits: Limits) -> VenueResult<u128> {
        self.check_swap()?;
        match direction {
            SwapDirection::BaseToQuote => self.base_for_quote(amount_out, Rounding::Up),
            SwapDirection::QuoteToBase => self.quote_for_base(amount_out, Rounding::Up),
        }
    }
}

// ============================================================================
// Oracle and Custody
// ============================================================================

/// Index that always reports the same sqrt price
#[derive(Debug, Clone)]
pub struct FixedIndexOracle {
    pub sqrt_price_x64: u128,
}

impl IndexOracle for FixedIndexOracle {
    fn time_weighted_average(&self, _window: u32, _now: u32) -> PerpResult<u128> {
        Ok(self.sqrt_price_x64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapCustody {
    balances: BTreeMap<AccountId, u64>,
}

impl MapCustody {
    pub fn credit(&mut self, account: AccountId, amount: u64) {
        *self.balances.entry(account).or_default() += amount;
    }
}

impl Custody for MapCustody {
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u64) -> PerpResult<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(PerpError::InsufficientFunds { account: from.0, balance, amount });
        }
        self.balances.insert(from, balance - amount);
        self.credit(to, amount);
        Ok(())
    }

    fn balance_of(&self, account: AccountId) -> u64 {
        self.balances.get(&account).copied().unwrap_or(0)
    }
}

// ============================================================================
// Setup
// ============================================================================

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Engine started at `now` on a venue at price 1.0, with the index at `index_tick`
pub fn engine_with_index(venue: FixedPriceVenue, index_tick: i32, now: u32) -> TestEngine {
    let oracle = FixedIndexOracle { sqrt_price_x64: sqrt_price_at_tick(index_tick).unwrap() };
    PerpEngine::new(EngineConfig::default(), venue, oracle, MapCustody::default(), now).unwrap()
}

/// Engine at price 1.0 with mark and index equal, and `funded` accounts holding 1000 USDC
pub fn engine(funded: &[AccountId]) -> TestEngine {
    let mut engine = engine_with_index(FixedPriceVenue::new(), 0, 0);
    for &account in funded {
        engine.custody_mut().credit(account, 1_000 * USDC);
    }
    engine
}
