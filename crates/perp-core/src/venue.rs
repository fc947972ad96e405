//! # External Interfaces
//!
//! The engine prices positions off a concentrated-liquidity venue, funds them against
//! an index oracle and moves collateral through a custody ledger. All three are
//! supplied by the embedding system.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SQRT_PRICE_X64, MIN_SQRT_PRICE_X64};
use crate::errors::{PerpResult, VenueError};
use crate::types::AccountId;

pub type VenueResult<T> = Result<T, VenueError>;

/// Swap direction; base is token 0, quote is token 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Sell base for quote; price moves down
    BaseToQuote,
    /// Buy base with quote; price moves up
    QuoteToBase,
}

impl SwapDirection {
    pub fn is_price_down(&self) -> bool {
        matches!(self, SwapDirection::BaseToQuote)
    }
}

/// Sqrt price bounds a venue call must stay within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub sqrt_price_min_x64: u128,
    pub sqrt_price_max_x64: u128,
}

impl Limits {
    /// The full representable price range
    pub const NONE: Limits = Limits { sqrt_price_min_x64: MIN_SQRT_PRICE_X64, sqrt_price_max_x64: MAX_SQRT_PRICE_X64 };
}

impl Default for Limits {
    fn default() -> Self {
        Limits::NONE
    }
}

/// Amounts borrowed into a freshly minted range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub position_id: u64,
    pub base: u128,
    pub quote: u128,
}

/// Concentrated-liquidity venue executing swaps and range mints
pub trait AmmVenue {
    fn create_pool(&mut self, tick_spacing: i32, sqrt_price_x64: u128) -> VenueResult<()>;

    /// Current sqrt price and tick
    fn sqrt_price_and_tick(&self) -> VenueResult<(u128, i32)>;

    /// Whether any liquidity references `tick`
    fn is_bucket_active(&self, tick: i32) -> VenueResult<bool>;

    /// With `search_down`, the greatest active tick `<= tick`; otherwise the smallest
    /// active tick `> tick`. Returns the tick bound and `false` when there is none.
    fn next_active_bucket(&self, tick: i32, search_down: bool) -> VenueResult<(i32, bool)>;

    fn mint_liquidity(
        &mut self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        limits: Limits,
    ) -> VenueResult<MintReceipt>;

    /// Burn a whole position, returning `(base, quote)`
    fn burn_liquidity(&mut self, position_id: u64, limits: Limits) -> VenueResult<(u128, u128)>;

    /// Swap exactly `amount_in`, returning the amount out
    fn swap_exact_in(&mut self, direction: SwapDirection, amount_in: u128, limits: Limits) -> VenueResult<u128>;

    /// Swap for exactly `amount_out`, returning the amount in
    fn swap_exact_out(&mut self, direction: SwapDirection, amount_out: u128, limits: Limits) -> VenueResult<u128>;
}

/// Index price feed
pub trait IndexOracle {
    /// Time-weighted average index sqrt price (Q64.64) over `window` seconds
    fn time_weighted_average(&self, window: u32, now: u32) -> PerpResult<u128>;
}

/// Collateral ledger
pub trait Custody {
    /// Move `amount` collateral; fails as a whole on insufficient balance
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u64) -> PerpResult<()>;

    fn balance_of(&self, account: AccountId) -> u64;
}
