//! In-memory concentrated-liquidity pool.
//!
//! Ticks carry gross and net liquidity; swaps walk initialized ticks one step at a
//! time exactly like a Uniswap-v3 style pool, without fees. After a downward crossing
//! of tick `t` the current tick becomes `t - 1` even though the price sits on `t`.

use std::collections::BTreeMap;

use ethnum::U256;
use feels_perp_core::math::{
    get_amount_base_delta, get_amount_quote_delta, get_amounts_for_liquidity, is_tick_valid, mul_div_u256,
    sqrt_price_at_tick, tick_at_sqrt_price, u256_to_u128, Rounding,
};
use feels_perp_core::{
    AmmVenue, Limits, MintReceipt, PerpError, PerpResult, SwapDirection, VenueError, VenueResult, MAX_SQRT_PRICE_X64,
    MAX_TICK, MIN_SQRT_PRICE_X64, MIN_TICK, Q64_RESOLUTION,
};

/// Liquidity referencing a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInfo {
    pub liquidity_gross: u128,
    /// Liquidity added when the price crosses this tick upwards
    pub liquidity_net: i128,
}

/// Range position held by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

/// Single-pool venue
#[derive(Debug, Clone, Default)]
pub struct SimPool {
    initialized: bool,
    tick_spacing: i32,
    sqrt_price_x64: u128,
    tick: i32,
    /// Liquidity active at the current price
    liquidity: u128,
    ticks: BTreeMap<i32, TickInfo>,
    positions: BTreeMap<u64, LiquidityPosition>,
    next_position_id: u64,
}

#[derive(Debug, Clone, Copy)]
struct SwapStep {
    sqrt_price_next: u128,
    amount_in: u128,
    amount_out: u128,
}

impl SimPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn tick_info(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn position(&self, position_id: u64) -> Option<&LiquidityPosition> {
        self.positions.get(&position_id)
    }

    fn ensure_initialized(&self) -> VenueResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(VenueError::PoolNotInitialized)
        }
    }

    fn validate_range(&self, tick_lower: i32, tick_upper: i32) -> VenueResult<()> {
        if tick_lower >= tick_upper {
            return Err(VenueError::InvalidRequest("tick_lower must be below tick_upper"));
        }
        if !is_tick_valid(tick_lower) || !is_tick_valid(tick_upper) {
            return Err(VenueError::InvalidRequest("tick out of range"));
        }
        if tick_lower % self.tick_spacing != 0 || tick_upper % self.tick_spacing != 0 {
            return Err(VenueError::InvalidRequest("tick not aligned to spacing"));
        }
        Ok(())
    }

    fn update_tick(&mut self, tick: i32, liquidity_delta: i128, upper: bool) -> VenueResult<()> {
        let info = self.ticks.entry(tick).or_default();
        info.liquidity_gross = add_delta(info.liquidity_gross, liquidity_delta)?;
        let net_delta = if upper { -liquidity_delta } else { liquidity_delta };
        info.liquidity_net = info
            .liquidity_net
            .checked_add(net_delta)
            .ok_or(VenueError::InvalidRequest("liquidity net overflow"))?;
        if info.liquidity_gross == 0 {
            self.ticks.remove(&tick);
        }
        Ok(())
    }

    fn in_range(&self, tick_lower: i32, tick_upper: i32) -> bool {
        tick_lower <= self.tick && self.tick < tick_upper
    }

    fn next_initialized_tick(&self, tick: i32, search_down: bool) -> (i32, bool) {
        if search_down {
            match self.ticks.range(..=tick).next_back() {
                Some((next, _)) => (*next, true),
                None => (MIN_TICK, false),
            }
        } else {
            match self.ticks.range(tick.saturating_add(1)..).next() {
                Some((next, _)) => (*next, true),
                None => (MAX_TICK, false),
            }
        }
    }

    fn swap(&mut self, direction: SwapDirection, amount: u128, exact_in: bool, limits: Limits) -> VenueResult<u128> {
        self.ensure_initialized()?;
        if amount == 0 {
            return Ok(0);
        }

        let zero_for_one = direction.is_price_down();
        let limit = if zero_for_one {
            limits.sqrt_price_min_x64.max(MIN_SQRT_PRICE_X64)
        } else {
            limits.sqrt_price_max_x64.min(MAX_SQRT_PRICE_X64)
        };
        let limit_is_bound = limit == MIN_SQRT_PRICE_X64 || limit == MAX_SQRT_PRICE_X64;

        let mut sqrt_price = self.sqrt_price_x64;
        let mut tick = self.tick;
        let mut liquidity = self.liquidity;
        let mut remaining = amount;
        let mut calculated: u128 = 0;

        while remaining > 0 {
            if sqrt_price == limit
                || (zero_for_one && sqrt_price < limit)
                || (!zero_for_one && sqrt_price > limit)
            {
                return Err(if limit_is_bound {
                    VenueError::InsufficientLiquidity
                } else {
                    VenueError::SlippageExceeded
                });
            }

            let (next_tick, initialized) = self.next_initialized_tick(tick, zero_for_one);
            let sqrt_price_tick = math(sqrt_price_at_tick(next_tick.clamp(MIN_TICK, MAX_TICK)))?;
            let target = if zero_for_one {
                sqrt_price_tick.max(limit)
            } else {
                sqrt_price_tick.min(limit)
            };

            let step = math(compute_swap_step(sqrt_price, target, liquidity, remaining, exact_in, zero_for_one))?;
            sqrt_price = step.sqrt_price_next;
            let (consumed, produced) = if exact_in {
                (step.amount_in, step.amount_out)
            } else {
                (step.amount_out, step.amount_in)
            };
            remaining -= consumed;
            calculated = calculated
                .checked_add(produced)
                .ok_or(VenueError::InvalidRequest("swap amount overflow"))?;

            if sqrt_price == sqrt_price_tick {
                if !initialized {
                    // Reached the end of the price range
                    if remaining > 0 {
                        return Err(VenueError::InsufficientLiquidity);
                    }
                    tick = next_tick;
                    break;
                }
                let net = self.ticks.get(&next_tick).map(|info| info.liquidity_net).unwrap_or(0);
                liquidity = add_delta(liquidity, if zero_for_one { -net } else { net })?;
                tick = if zero_for_one { next_tick - 1 } else { next_tick };
            } else {
                tick = math(tick_at_sqrt_price(sqrt_price))?;
            }
        }

        self.sqrt_price_x64 = sqrt_price;
        self.tick = tick;
        self.liquidity = liquidity;
        Ok(calculated)
    }
}

impl AmmVenue for SimPool {
    fn create_pool(&mut self, tick_spacing: i32, sqrt_price_x64: u128) -> VenueResult<()> {
        if self.initialized {
            return Err(VenueError::PoolAlreadyInitialized);
        }
        if tick_spacing <= 0 {
            return Err(VenueError::InvalidRequest("tick spacing must be positive"));
        }
        self.tick = tick_at_sqrt_price(sqrt_price_x64)
            .map_err(|_| VenueError::InvalidRequest("sqrt price out of range"))?;
        self.tick_spacing = tick_spacing;
        self.sqrt_price_x64 = sqrt_price_x64;
        self.next_position_id = 1;
        self.initialized = true;
        Ok(())
    }

    fn sqrt_price_and_tick(&self) -> VenueResult<(u128, i32)> {
        self.ensure_initialized()?;
        Ok((self.sqrt_price_x64, self.tick))
    }

    fn is_bucket_active(&self, tick: i32) -> VenueResult<bool> {
        self.ensure_initialized()?;
        Ok(self.ticks.contains_key(&tick))
    }

    fn next_active_bucket(&self, tick: i32, search_down: bool) -> VenueResult<(i32, bool)> {
        self.ensure_initialized()?;
        Ok(self.next_initialized_tick(tick, search_down))
    }

    fn mint_liquidity(
        &mut self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        limits: Limits,
    ) -> VenueResult<MintReceipt> {
        self.ensure_initialized()?;
        self.validate_range(tick_lower, tick_upper)?;
        if liquidity == 0 {
            return Err(VenueError::InvalidRequest("zero liquidity"));
        }
        if self.sqrt_price_x64 < limits.sqrt_price_min_x64 || self.sqrt_price_x64 > limits.sqrt_price_max_x64 {
            return Err(VenueError::SlippageExceeded);
        }

        let (base, quote) = math(get_amounts_for_liquidity(
            self.sqrt_price_x64,
            math(sqrt_price_at_tick(tick_lower))?,
            math(sqrt_price_at_tick(tick_upper))?,
            liquidity,
            Rounding::Up,
        ))?;

        let delta = i128::try_from(liquidity).map_err(|_| VenueError::InvalidRequest("liquidity too large"))?;
        self.update_tick(tick_lower, delta, false)?;
        self.update_tick(tick_upper, delta, true)?;
        if self.in_range(tick_lower, tick_upper) {
            self.liquidity = add_delta(self.liquidity, delta)?;
        }

        let position_id = self.next_position_id;
        self.next_position_id += 1;
        self.positions
            .insert(position_id, LiquidityPosition { tick_lower, tick_upper, liquidity });
        Ok(MintReceipt { position_id, base, quote })
    }

    fn burn_liquidity(&mut self, position_id: u64, limits: Limits) -> VenueResult<(u128, u128)> {
        self.ensure_initialized()?;
        let position = *self
            .positions
            .get(&position_id)
            .ok_or(VenueError::PositionNotFound(position_id))?;
        if self.sqrt_price_x64 < limits.sqrt_price_min_x64 || self.sqrt_price_x64 > limits.sqrt_price_max_x64 {
            return Err(VenueError::SlippageExceeded);
        }

        let amounts = math(get_amounts_for_liquidity(
            self.sqrt_price_x64,
            math(sqrt_price_at_tick(position.tick_lower))?,
            math(sqrt_price_at_tick(position.tick_upper))?,
            position.liquidity,
            Rounding::Down,
        ))?;

        let delta = -i128::try_from(position.liquidity).map_err(|_| VenueError::InvalidRequest("liquidity too large"))?;
        self.update_tick(position.tick_lower, delta, false)?;
        self.update_tick(position.tick_upper, delta, true)?;
        if self.in_range(position.tick_lower, position.tick_upper) {
            self.liquidity = add_delta(self.liquidity, delta)?;
        }
        self.positions.remove(&position_id);
        Ok(amounts)
    }

    fn swap_exact_in(&mut self, direction: SwapDirection, amount_in: u128, limits: Limits) -> VenueResult<u128> {
        self.swap(direction, amount_in, true, limits)
    }

    fn swap_exact_out(&mut self, direction: SwapDirection, amount_out: u128, limits: Limits) -> VenueResult<u128> {
        self.swap(direction, amount_out, false, limits)
    }
}

fn math<T>(result: PerpResult<T>) -> VenueResult<T> {
    result.map_err(|_| VenueError::InvalidRequest("pool arithmetic failed"))
}

fn add_delta(liquidity: u128, delta: i128) -> VenueResult<u128> {
    if delta < 0 {
        liquidity
            .checked_sub(delta.unsigned_abs())
            .ok_or(VenueError::InvalidRequest("liquidity underflow"))
    } else {
        liquidity
            .checked_add(delta as u128)
            .ok_or(VenueError::InvalidRequest("liquidity overflow"))
    }
}

/// One swap step from `sqrt_price` towards `target` within constant `liquidity`
fn compute_swap_step(
    sqrt_price: u128,
    target: u128,
    liquidity: u128,
    remaining: u128,
    exact_in: bool,
    zero_for_one: bool,
) -> PerpResult<SwapStep> {
    let sqrt_price_next = if exact_in {
        let max_in = if zero_for_one {
            get_amount_base_delta(target, sqrt_price, liquidity, Rounding::Up)?
        } else {
            get_amount_quote_delta(sqrt_price, target, liquidity, Rounding::Up)?
        };
        if remaining >= max_in {
            target
        } else {
            next_sqrt_price_from_input(sqrt_price, liquidity, remaining, zero_for_one)?
        }
    } else {
        let max_out = if zero_for_one {
            get_amount_quote_delta(target, sqrt_price, liquidity, Rounding::Down)?
        } else {
            get_amount_base_delta(sqrt_price, target, liquidity, Rounding::Down)?
        };
        if remaining >= max_out {
            target
        } else {
            next_sqrt_price_from_output(sqrt_price, liquidity, remaining, zero_for_one)?
        }
    };

    let reached_target = sqrt_price_next == target;
    let (mut amount_in, mut amount_out) = if zero_for_one {
        (
            get_amount_base_delta(sqrt_price_next, sqrt_price, liquidity, Rounding::Up)?,
            get_amount_quote_delta(sqrt_price_next, sqrt_price, liquidity, Rounding::Down)?,
        )
    } else {
        (
            get_amount_quote_delta(sqrt_price, sqrt_price_next, liquidity, Rounding::Up)?,
            get_amount_base_delta(sqrt_price, sqrt_price_next, liquidity, Rounding::Down)?,
        )
    };

    // A step that stops short of its target consumes the whole remainder
    if exact_in && !reached_target {
        amount_in = remaining;
    }
    if !exact_in && (!reached_target || amount_out > remaining) {
        amount_out = remaining;
    }

    Ok(SwapStep { sqrt_price_next, amount_in, amount_out })
}

fn next_sqrt_price_from_input(sqrt_price: u128, liquidity: u128, amount_in: u128, zero_for_one: bool) -> PerpResult<u128> {
    if zero_for_one {
        // Base in: L * s / (L + amount * s), rounded up
        let numerator = U256::from(liquidity) << Q64_RESOLUTION;
        let product = U256::from(amount_in) * U256::from(sqrt_price);
        let next = mul_div_u256(numerator, U256::from(sqrt_price), numerator + product, Rounding::Up)?;
        u256_to_u128(next)
    } else {
        // Quote in: s + amount / L, rounded down
        let delta = (U256::from(amount_in) << Q64_RESOLUTION) / U256::from(liquidity);
        u256_to_u128(U256::from(sqrt_price) + delta)
    }
}

fn next_sqrt_price_from_output(sqrt_price: u128, liquidity: u128, amount_out: u128, zero_for_one: bool) -> PerpResult<u128> {
    if zero_for_one {
        // Quote out: s - amount / L, rounded so the price moves at least far enough
        let delta = mul_div_u256(U256::from(amount_out), U256::ONE << Q64_RESOLUTION, U256::from(liquidity), Rounding::Up)?;
        let next = U256::from(sqrt_price)
            .checked_sub(delta)
            .ok_or(PerpError::MathUnderflow)?;
        u256_to_u128(next)
    } else {
        // Base out: L * s / (L - amount * s), rounded up
        let numerator = U256::from(liquidity) << Q64_RESOLUTION;
        let product = U256::from(amount_out) * U256::from(sqrt_price);
        let denominator = numerator
            .checked_sub(product)
            .filter(|d| *d > U256::ZERO)
            .ok_or(PerpError::MathUnderflow)?;
        let next = mul_div_u256(numerator, U256::from(sqrt_price), denominator, Rounding::Up)?;
        u256_to_u128(next)
    }
}
