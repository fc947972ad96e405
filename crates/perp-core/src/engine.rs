//! # Position Settlement Engine
//!
//! Owns maker and taker positions, the funding ledger and the mark TWAP series, and
//! drives the venue, oracle and custody collaborators. Every public operation is
//! atomic: it runs against the live state and restores the pre-call snapshot on any
//! error. Each operation follows the same discipline:
//!
//! 1. read the venue price fresh, record it in the mark series and advance funding
//!    with the rate that prevailed since the last operation;
//! 2. act on the venue, crossing every active tick the price traverses;
//! 3. settle positions from global and range funding growth;
//! 4. re-derive the funding rate from the mark and index TWAPs.

use std::collections::BTreeMap;

use ethnum::U256;
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constants::BPS_DENOMINATOR;
use crate::errors::{PerpError, PerpResult};
use crate::funding::{maker_funding_owed, FundingLedger, RangeGrowth};
use crate::math::growth_math::{sub_growth, taker_funding_payment};
use crate::math::liquidity_math::base_value_in_quote;
use crate::math::safe_math::{
    apply_bps, mul_div_u128, safe_add_i128, safe_add_u128, safe_add_u64, safe_sub_i128, safe_sub_u64,
    u128_to_i128, Rounding,
};
use crate::math::tick_math::is_tick_valid;
use crate::oracle::TwapSeries;
use crate::settlement::{settle, to_internal, Settlement};
use crate::types::{AccountId, CloseOutcome, CloseReport, MakerPosition, Position, TakerPosition};
use crate::venue::{AmmVenue, Custody, IndexOracle, Limits, SwapDirection};

/// Perpetual settlement engine over a venue `V`, index oracle `O` and custody `C`
#[derive(Debug, Clone)]
pub struct PerpEngine<V, O, C> {
    config: EngineConfig,
    venue: V,
    oracle: O,
    custody: C,
    ledger: FundingLedger,
    mark_series: TwapSeries,
    positions: BTreeMap<u64, Position>,
    next_position_id: u64,
    /// Collateral posted by open positions
    total_margin: u64,
    /// Collateral routed to the insurance account
    insurance_collected: u64,
    /// Shortfall of insolvent closes (18 decimals)
    bad_debt: u128,
}

impl<V, O, C> PerpEngine<V, O, C>
where
    V: AmmVenue + Clone,
    O: IndexOracle + Clone,
    C: Custody + Clone,
{
    /// Create the venue pool and start funding at `now`
    pub fn new(config: EngineConfig, mut venue: V, oracle: O, custody: C, now: u32) -> PerpResult<Self> {
        config.validate()?;
        let starting_sqrt_price_x64 = config.starting_sqrt_price_x64()?;
        venue.create_pool(config.tick_spacing, starting_sqrt_price_x64)?;

        let mut mark_series = TwapSeries::initialize(now);
        mark_series.grow_capacity(config.observation_capacity);

        let mut engine = Self {
            config,
            venue,
            oracle,
            custody,
            ledger: FundingLedger::new(now),
            mark_series,
            positions: BTreeMap::new(),
            next_position_id: 1,
            total_margin: 0,
            insurance_collected: 0,
            bad_debt: 0,
        };
        engine.refresh_funding_rate(now)?;

        info!(
            "perp engine started: sqrt_price={} tick_spacing={} funding_interval={}s",
            starting_sqrt_price_x64, engine.config.tick_spacing, engine.config.funding_interval_secs
        );
        Ok(engine)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Provide `liquidity` over `[tick_lower, tick_upper)` backed by `margin`
    pub fn open_maker(
        &mut self,
        caller: AccountId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        margin: u64,
        now: u32,
    ) -> PerpResult<u64> {
        self.atomically(|engine| engine.open_maker_inner(caller, tick_lower, tick_upper, liquidity, margin, now))
    }

    /// Open a long or short of notional `margin * leverage`
    pub fn open_taker(
        &mut self,
        caller: AccountId,
        is_long: bool,
        margin: u64,
        leverage_bps: u32,
        now: u32,
    ) -> PerpResult<u64> {
        self.atomically(|engine| engine.open_taker_inner(caller, is_long, margin, leverage_bps, now))
    }

    /// Top up a position's margin. Leverage bounds are not re-checked.
    pub fn add_margin(&mut self, caller: AccountId, position_id: u64, amount: u64, now: u32) -> PerpResult<()> {
        self.atomically(|engine| engine.add_margin_inner(caller, position_id, amount, now))
    }

    /// Close a position. The holder may always close; anyone may close a position
    /// that settles as a liquidation.
    pub fn close(&mut self, caller: AccountId, position_id: u64, now: u32) -> PerpResult<CloseReport> {
        self.atomically(|engine| engine.close_inner(caller, position_id, now))
    }

    /// Advance funding and refresh the rate without touching positions
    pub fn update_funding(&mut self, now: u32) -> PerpResult<()> {
        self.atomically(|engine| {
            engine.begin_operation(now)?;
            engine.refresh_funding_rate(now)
        })
    }

    // ------------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------------

    /// Maker position `open_maker` would create
    pub fn quote_open_maker(
        &self,
        caller: AccountId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        margin: u64,
        now: u32,
    ) -> PerpResult<MakerPosition> {
        let mut scratch = self.clone();
        let position_id = scratch.open_maker(caller, tick_lower, tick_upper, liquidity, margin, now)?;
        scratch
            .position(position_id)
            .and_then(Position::as_maker)
            .cloned()
            .ok_or(PerpError::PositionNotFound(position_id))
    }

    /// Taker position `open_taker` would create
    pub fn quote_open_taker(
        &self,
        caller: AccountId,
        is_long: bool,
        margin: u64,
        leverage_bps: u32,
        now: u32,
    ) -> PerpResult<TakerPosition> {
        let mut scratch = self.clone();
        let position_id = scratch.open_taker(caller, is_long, margin, leverage_bps, now)?;
        scratch
            .position(position_id)
            .and_then(Position::as_taker)
            .cloned()
            .ok_or(PerpError::PositionNotFound(position_id))
    }

    /// Report `close` would produce
    pub fn quote_close(&self, caller: AccountId, position_id: u64, now: u32) -> PerpResult<CloseReport> {
        self.clone().close(caller, position_id, now)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self, position_id: u64) -> Option<&Position> {
        self.positions.get(&position_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&u64, &Position)> {
        self.positions.iter()
    }

    /// Current funding rate per second (Q64.64 price units; positive means longs pay)
    pub fn funding_rate(&self) -> i128 {
        self.ledger.funding_rate_per_second
    }

    pub fn ledger(&self) -> &FundingLedger {
        &self.ledger
    }

    pub fn mark_series(&self) -> &TwapSeries {
        &self.mark_series
    }

    /// Live mark TWAP over the configured window
    pub fn mark_twap(&self, now: u32) -> PerpResult<u128> {
        let (sqrt_price, _) = self.venue.sqrt_price_and_tick()?;
        self.mark_series
            .time_weighted_average(self.config.twap_window_secs, now, sqrt_price)
    }

    /// Range growth of a maker position as of the last funding advance
    pub fn maker_range_growth(&self, position_id: u64) -> PerpResult<RangeGrowth> {
        let maker = self
            .positions
            .get(&position_id)
            .and_then(Position::as_maker)
            .ok_or(PerpError::PositionNotFound(position_id))?;
        let (_, tick) = self.venue.sqrt_price_and_tick()?;
        self.ledger.range_growth(maker.tick_lower, maker.tick_upper, tick)
    }

    pub fn total_margin(&self) -> u64 {
        self.total_margin
    }

    pub fn insurance_collected(&self) -> u64 {
        self.insurance_collected
    }

    pub fn bad_debt(&self) -> u128 {
        self.bad_debt
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    /// Direct venue access. Price moves made here are not mirrored into the ledger.
    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> PerpResult<T>) -> PerpResult<T> {
        let snapshot = self.clone();
        let result = op(self);
        if let Err(err) = &result {
            debug!("operation reverted: {}", err);
            *self = snapshot;
        }
        result
    }

    fn open_maker_inner(
        &mut self,
        caller: AccountId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        margin: u64,
        now: u32,
    ) -> PerpResult<u64> {
        if margin == 0 {
            return Err(PerpError::ZeroMargin);
        }
        if liquidity == 0 {
            return Err(PerpError::ZeroLiquidity);
        }
        self.validate_range(tick_lower, tick_upper)?;

        let (sqrt_price, tick) = self.begin_operation(now)?;

        let lower_was_active = self.venue.is_bucket_active(tick_lower)?;
        let upper_was_active = self.venue.is_bucket_active(tick_upper)?;
        let receipt = self
            .venue
            .mint_liquidity(tick_lower, tick_upper, liquidity, Limits::NONE)?;

        let notional = safe_add_u128(base_value_in_quote(receipt.base, sqrt_price, Rounding::Up)?, receipt.quote)?;
        if notional == 0 {
            return Err(PerpError::ZeroLiquidity);
        }
        self.check_maker_ratio(margin, notional)?;

        if !lower_was_active {
            self.ledger.initialize_bucket(tick_lower, tick)?;
        }
        if !upper_was_active {
            self.ledger.initialize_bucket(tick_upper, tick)?;
        }
        let entry_growth = self.ledger.range_growth(tick_lower, tick_upper, tick)?;

        self.deposit(caller, margin)?;
        let position_id = self.insert_position(Position::Maker(MakerPosition {
            holder: caller,
            margin,
            entry_timestamp: now,
            tick_lower,
            tick_upper,
            liquidity,
            venue_position_id: receipt.position_id,
            base_borrowed: receipt.base,
            quote_borrowed: receipt.quote,
            entry_growth,
        }))?;
        self.refresh_funding_rate(now)?;

        info!(
            "maker {} opened by {}: range=[{}, {}) liquidity={} margin={} base={} quote={}",
            position_id, caller, tick_lower, tick_upper, liquidity, margin, receipt.base, receipt.quote
        );
        Ok(position_id)
    }

    fn open_taker_inner(
        &mut self,
        caller: AccountId,
        is_long: bool,
        margin: u64,
        leverage_bps: u32,
        now: u32,
    ) -> PerpResult<u64> {
        if margin == 0 {
            return Err(PerpError::ZeroMargin);
        }
        if margin < self.config.min_margin || margin > self.config.max_margin {
            return Err(PerpError::MarginOutOfBounds {
                margin,
                min: self.config.min_margin,
                max: self.config.max_margin,
            });
        }
        if leverage_bps < self.config.min_leverage_bps || leverage_bps > self.config.max_leverage_bps {
            return Err(PerpError::LeverageOutOfBounds {
                leverage_bps,
                min_bps: self.config.min_leverage_bps,
                max_bps: self.config.max_leverage_bps,
            });
        }

        self.begin_operation(now)?;

        let notional = apply_bps(to_internal(margin, self.config.collateral_decimals)?, leverage_bps)?;
        if notional == 0 {
            return Err(PerpError::ZeroSize);
        }
        let size = if is_long {
            self.swap(SwapDirection::QuoteToBase, notional, true)?
        } else {
            self.swap(SwapDirection::BaseToQuote, notional, false)?
        };
        if size == 0 {
            return Err(PerpError::ZeroSize);
        }

        self.deposit(caller, margin)?;
        let position_id = self.insert_position(Position::Taker(TakerPosition {
            holder: caller,
            is_long,
            size,
            margin,
            entry_value: notional,
            entry_cumulative_funding: self.ledger.cumulative_funding,
            entry_timestamp: now,
        }))?;
        self.refresh_funding_rate(now)?;

        info!(
            "taker {} opened by {}: {} size={} notional={} margin={}",
            position_id,
            caller,
            if is_long { "long" } else { "short" },
            size,
            notional,
            margin
        );
        Ok(position_id)
    }

    fn add_margin_inner(&mut self, caller: AccountId, position_id: u64, amount: u64, now: u32) -> PerpResult<()> {
        if amount == 0 {
            return Err(PerpError::ZeroMarginDelta);
        }
        let holder = self
            .positions
            .get(&position_id)
            .map(Position::holder)
            .ok_or(PerpError::PositionNotFound(position_id))?;
        if holder != caller {
            return Err(PerpError::Unauthorized);
        }

        self.begin_operation(now)?;
        self.deposit(caller, amount)?;

        let position = self
            .positions
            .get_mut(&position_id)
            .ok_or(PerpError::PositionNotFound(position_id))?;
        let margin = position.margin_mut();
        *margin = safe_add_u64(*margin, amount)?;
        let new_margin = *margin;

        self.refresh_funding_rate(now)?;
        info!("position {} margin topped up by {} to {}", position_id, amount, new_margin);
        Ok(())
    }

    fn close_inner(&mut self, caller: AccountId, position_id: u64, now: u32) -> PerpResult<CloseReport> {
        let position = self
            .positions
            .remove(&position_id)
            .ok_or(PerpError::PositionNotFound(position_id))?;

        self.begin_operation(now)?;
        let report = match position {
            Position::Maker(maker) => self.close_maker(caller, position_id, maker, now)?,
            Position::Taker(taker) => self.close_taker(caller, position_id, taker)?,
        };
        self.refresh_funding_rate(now)?;

        match report.outcome {
            CloseOutcome::Paid => info!(
                "position {} closed by holder: pnl={} funding={} payout={}",
                position_id, report.realized_pnl, report.funding, report.payout
            ),
            CloseOutcome::Liquidated => info!(
                "position {} liquidated by {}: fee={} reward={} insurance={} holder payout={}",
                position_id,
                caller,
                report.liquidation_fee,
                report.liquidator_reward,
                report.insurance_share,
                report.payout
            ),
            CloseOutcome::Insolvent => warn!(
                "position {} liquidated insolvent: effective margin {} recorded as bad debt",
                position_id, report.effective_margin
            ),
        }
        Ok(report)
    }

    fn close_taker(&mut self, caller: AccountId, position_id: u64, taker: TakerPosition) -> PerpResult<CloseReport> {
        let entry_value = u128_to_i128(taker.entry_value)?;
        let (realized_pnl, notional) = if taker.is_long {
            let proceeds = self.swap(SwapDirection::BaseToQuote, taker.size, true)?;
            (safe_sub_i128(u128_to_i128(proceeds)?, entry_value)?, proceeds)
        } else {
            let cost = self.swap(SwapDirection::QuoteToBase, taker.size, false)?;
            (safe_sub_i128(entry_value, u128_to_i128(cost)?)?, cost)
        };

        let funding = taker_funding_payment(
            taker.size,
            taker.is_long,
            sub_growth(self.ledger.cumulative_funding, taker.entry_cumulative_funding),
        )?;

        let settlement = settle(&self.config, taker.margin, realized_pnl, funding, notional)?;
        authorize(&settlement, caller, taker.holder)?;
        self.disburse(caller, taker.holder, taker.margin, &settlement, false)?;

        Ok(close_report(position_id, taker.holder, realized_pnl, funding, notional, &settlement, None))
    }

    fn close_maker(
        &mut self,
        caller: AccountId,
        position_id: u64,
        maker: MakerPosition,
        now: u32,
    ) -> PerpResult<CloseReport> {
        let (sqrt_price, tick) = self.venue.sqrt_price_and_tick()?;
        let growth = self.ledger.range_growth(maker.tick_lower, maker.tick_upper, tick)?;
        let funding = maker_funding_owed(
            maker.liquidity,
            maker.tick_lower,
            maker.tick_upper,
            &maker.entry_growth,
            &growth,
        )?;

        let (base_out, quote_out) = self
            .venue
            .burn_liquidity(maker.venue_position_id, Limits::NONE)?;
        for boundary in [maker.tick_lower, maker.tick_upper] {
            if !self.venue.is_bucket_active(boundary)? {
                self.ledger.clear_bucket(boundary)?;
            }
        }

        let mut realized_pnl = safe_sub_i128(u128_to_i128(quote_out)?, u128_to_i128(maker.quote_borrowed)?)?;
        let notional = safe_add_u128(
            base_value_in_quote(maker.base_borrowed, sqrt_price, Rounding::Up)?,
            maker.quote_borrowed,
        )?;

        // Flatten base exposure against the live venue: sell an excess, buy back a deficit.
        // Exposure the venue cannot absorb is marked at spot and carried by a new taker.
        let mut residual = None;
        if base_out > maker.base_borrowed {
            let excess = base_out - maker.base_borrowed;
            match self.swap(SwapDirection::BaseToQuote, excess, true) {
                Ok(proceeds) => realized_pnl = safe_add_i128(realized_pnl, u128_to_i128(proceeds)?)?,
                Err(err) if err.is_venue() => {
                    warn!("maker {} could not sell excess base {}: {}", position_id, excess, err);
                    let marked = base_value_in_quote(excess, sqrt_price, Rounding::Down)?;
                    realized_pnl = safe_add_i128(realized_pnl, u128_to_i128(marked)?)?;
                    residual = Some((true, excess, marked));
                }
                Err(err) => return Err(err),
            }
        } else if base_out < maker.base_borrowed {
            let deficit = maker.base_borrowed - base_out;
            match self.swap(SwapDirection::QuoteToBase, deficit, false) {
                Ok(cost) => realized_pnl = safe_sub_i128(realized_pnl, u128_to_i128(cost)?)?,
                Err(err) if err.is_venue() => {
                    warn!("maker {} could not buy back base deficit {}: {}", position_id, deficit, err);
                    let marked = base_value_in_quote(deficit, sqrt_price, Rounding::Up)?;
                    realized_pnl = safe_sub_i128(realized_pnl, u128_to_i128(marked)?)?;
                    residual = Some((false, deficit, marked));
                }
                Err(err) => return Err(err),
            }
        }

        let settlement = settle(&self.config, maker.margin, realized_pnl, funding, notional)?;
        authorize(&settlement, caller, maker.holder)?;

        // The holder's payout stays in the vault as margin of the new taker. A close that
        // pays nothing still hands over the exposure, as a zero-margin taker open to liquidation.
        let spawned_taker = match residual {
            Some((is_long, size, entry_value)) => {
                let taker = TakerPosition {
                    holder: maker.holder,
                    is_long,
                    size,
                    margin: settlement.holder_payout,
                    entry_value,
                    entry_cumulative_funding: self.ledger.cumulative_funding,
                    entry_timestamp: now,
                };
                let taker_id = self.insert_position(Position::Taker(taker))?;
                info!(
                    "maker {} converted residual {} base {} into taker {} with margin {}",
                    position_id,
                    if is_long { "long" } else { "short" },
                    size,
                    taker_id,
                    settlement.holder_payout
                );
                Some(taker_id)
            }
            None => None,
        };

        self.disburse(caller, maker.holder, maker.margin, &settlement, spawned_taker.is_some())?;
        Ok(close_report(
            position_id,
            maker.holder,
            realized_pnl,
            funding,
            notional,
            &settlement,
            spawned_taker,
        ))
    }

    /// Record the pre-operation price and integrate funding up to `now`
    fn begin_operation(&mut self, now: u32) -> PerpResult<(u128, i32)> {
        let (sqrt_price, tick) = self.venue.sqrt_price_and_tick()?;
        self.mark_series.write(now, sqrt_price)?;
        self.ledger.advance(now, sqrt_price)?;
        Ok((sqrt_price, tick))
    }

    fn refresh_funding_rate(&mut self, now: u32) -> PerpResult<()> {
        let (sqrt_price, _) = self.venue.sqrt_price_and_tick()?;
        let window = self.config.twap_window_secs;
        let mark = self.mark_series.time_weighted_average(window, now, sqrt_price)?;
        let index = self.oracle.time_weighted_average(window, now)?;
        self.ledger
            .refresh_rate(mark, index, self.config.funding_interval_secs)
    }

    /// Swap through the venue and mirror every tick crossing into the ledger.
    /// Returns the amount on the other side of the swap.
    fn swap(&mut self, direction: SwapDirection, amount: u128, exact_in: bool) -> PerpResult<u128> {
        let (_, tick_before) = self.venue.sqrt_price_and_tick()?;
        let other = if exact_in {
            self.venue.swap_exact_in(direction, amount, Limits::NONE)?
        } else {
            self.venue.swap_exact_out(direction, amount, Limits::NONE)?
        };
        let (_, tick_after) = self.venue.sqrt_price_and_tick()?;
        self.cross_traversed(tick_before, tick_after)?;
        Ok(other)
    }

    /// Cross active ticks in `(from, to]` moving up or `(to, from]` moving down
    fn cross_traversed(&mut self, from: i32, to: i32) -> PerpResult<()> {
        let mut tick = from;
        if to > from {
            loop {
                let (next, active) = self.venue.next_active_bucket(tick, false)?;
                if !active || next > to {
                    break;
                }
                self.ledger.cross_bucket(next)?;
                tick = next;
            }
        } else if to < from {
            loop {
                let (next, active) = self.venue.next_active_bucket(tick, true)?;
                if !active || next <= to {
                    break;
                }
                self.ledger.cross_bucket(next)?;
                tick = next - 1;
            }
        }
        Ok(())
    }

    fn validate_range(&self, tick_lower: i32, tick_upper: i32) -> PerpResult<()> {
        if tick_lower >= tick_upper {
            return Err(PerpError::InvalidTickRange { lower: tick_lower, upper: tick_upper });
        }
        for tick in [tick_lower, tick_upper] {
            if !is_tick_valid(tick) {
                return Err(PerpError::InvalidTick(tick));
            }
            if tick % self.config.tick_spacing != 0 {
                return Err(PerpError::TickNotAligned { tick, spacing: self.config.tick_spacing });
            }
        }
        Ok(())
    }

    /// Margin / notional must sit inside the configured maker band
    fn check_maker_ratio(&self, margin: u64, notional: u128) -> PerpResult<()> {
        let margin_internal = to_internal(margin, self.config.collateral_decimals)?;
        let scaled_margin = U256::from(margin_internal) * U256::from(BPS_DENOMINATOR);
        let min = U256::from(notional) * U256::from(self.config.min_maker_ratio_bps);
        let max = U256::from(notional) * U256::from(self.config.max_maker_ratio_bps);
        if scaled_margin < min || scaled_margin > max {
            let ratio_bps = mul_div_u128(margin_internal, BPS_DENOMINATOR as u128, notional, Rounding::Down)
                .unwrap_or(u128::MAX);
            return Err(PerpError::MakerRatioOutOfBounds {
                ratio_bps,
                min_bps: self.config.min_maker_ratio_bps,
                max_bps: self.config.max_maker_ratio_bps,
            });
        }
        Ok(())
    }

    fn deposit(&mut self, from: AccountId, amount: u64) -> PerpResult<()> {
        self.custody.transfer(from, self.config.vault_account, amount)?;
        self.total_margin = safe_add_u64(self.total_margin, amount)?;
        Ok(())
    }

    /// Pay out a settlement from the vault. With `retain_payout` the holder's share
    /// stays in the vault as margin of a spawned taker.
    fn disburse(
        &mut self,
        caller: AccountId,
        holder: AccountId,
        margin: u64,
        settlement: &Settlement,
        retain_payout: bool,
    ) -> PerpResult<()> {
        let vault = self.config.vault_account;
        self.total_margin = safe_sub_u64(self.total_margin, margin)?;

        if retain_payout {
            self.total_margin = safe_add_u64(self.total_margin, settlement.holder_payout)?;
        } else if settlement.holder_payout > 0 {
            self.custody.transfer(vault, holder, settlement.holder_payout)?;
        }
        if settlement.liquidator_reward > 0 {
            self.custody.transfer(vault, caller, settlement.liquidator_reward)?;
        }
        if settlement.insurance_share > 0 {
            self.custody
                .transfer(vault, self.config.insurance_account, settlement.insurance_share)?;
            self.insurance_collected = safe_add_u64(self.insurance_collected, settlement.insurance_share)?;
        }
        if settlement.bad_debt > 0 {
            self.bad_debt = safe_add_u128(self.bad_debt, settlement.bad_debt)?;
            warn!("bad debt of {} recorded, total {}", settlement.bad_debt, self.bad_debt);
        }
        Ok(())
    }

    fn insert_position(&mut self, position: Position) -> PerpResult<u64> {
        let position_id = self.next_position_id;
        self.next_position_id = position_id.checked_add(1).ok_or(PerpError::MathOverflow)?;
        self.positions.insert(position_id, position);
        Ok(position_id)
    }
}

/// Only liquidations may be settled by someone other than the holder
fn authorize(settlement: &Settlement, caller: AccountId, holder: AccountId) -> PerpResult<()> {
    if settlement.outcome == CloseOutcome::Paid && caller != holder {
        return Err(PerpError::Unauthorized);
    }
    Ok(())
}

fn close_report(
    position_id: u64,
    holder: AccountId,
    realized_pnl: i128,
    funding: i128,
    notional: u128,
    settlement: &Settlement,
    spawned_taker: Option<u64>,
) -> CloseReport {
    CloseReport {
        position_id,
        holder,
        outcome: settlement.outcome,
        realized_pnl,
        funding,
        effective_margin: settlement.effective_margin,
        notional,
        liquidation_fee: settlement.liquidation_fee,
        payout: if spawned_taker.is_some() { 0 } else { settlement.holder_payout },
        liquidator_reward: settlement.liquidator_reward,
        insurance_share: settlement.insurance_share,
        bad_debt: settlement.bad_debt,
        spawned_taker,
    }
}
