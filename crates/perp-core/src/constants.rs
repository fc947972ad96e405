//! # Protocol Constants
//!
//! Fixed-point scales, tick bounds and default risk parameters for the
//! perpetual settlement core.

// ============================================================================
// Mathematical Constants
// ============================================================================

/// Q64 fixed-point scale factor: 2^64
pub const Q64: u128 = 1u128 << 64;

/// Bits in the Q64 fractional part
pub const Q64_RESOLUTION: u32 = 64;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Decimals used for all internal base/quote amounts
pub const INTERNAL_DECIMALS: u8 = 18;

// ============================================================================
// Tick Constants
// ============================================================================

/// Minimum tick supported by the Q64.64 sqrt price range
pub const MIN_TICK: i32 = -443_636;

/// Maximum tick supported by the Q64.64 sqrt price range
pub const MAX_TICK: i32 = 443_636;

/// Sqrt price at `MIN_TICK` in Q64.64
pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;

/// Sqrt price at `MAX_TICK` in Q64.64
pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;

// ============================================================================
// Funding and Oracle Defaults
// ============================================================================

/// Funding interval over which a full mark/index premium is paid (1 day)
pub const DEFAULT_FUNDING_INTERVAL_SECS: u32 = 86_400;

/// Lookback window for mark and index TWAPs (15 minutes)
pub const DEFAULT_TWAP_WINDOW_SECS: u32 = 900;

/// Observation slots allocated for the mark series at startup
pub const DEFAULT_OBSERVATION_CAPACITY: u16 = 64;

/// Hard cap on observation slots
pub const MAX_OBSERVATION_CAPACITY: u16 = u16::MAX;

// ============================================================================
// Risk Defaults
// ============================================================================

/// Default collateral decimals (USDC-style)
pub const DEFAULT_COLLATERAL_DECIMALS: u8 = 6;

/// Default upper bound on taker margin (one billion at 6 decimals)
pub const DEFAULT_MAX_MARGIN: u64 = 1_000_000_000_000_000;

/// Default tick spacing
pub const DEFAULT_TICK_SPACING: i32 = 60;

/// Minimum taker leverage (1x)
pub const DEFAULT_MIN_LEVERAGE_BPS: u32 = 10_000;

/// Maximum taker leverage (10x)
pub const DEFAULT_MAX_LEVERAGE_BPS: u32 = 100_000;

/// Minimum maker margin / notional (5%)
pub const DEFAULT_MIN_MAKER_RATIO_BPS: u32 = 500;

/// Maximum maker margin / notional (100%)
pub const DEFAULT_MAX_MAKER_RATIO_BPS: u32 = 10_000;

/// Leverage at which a position becomes liquidatable (20x)
pub const DEFAULT_LIQUIDATION_LEVERAGE_BPS: u32 = 200_000;

/// Liquidation fee as a fraction of notional (0.5%)
pub const DEFAULT_LIQUIDATION_FEE_BPS: u32 = 50;

/// Share of the liquidation fee paid to the liquidator (50%)
pub const DEFAULT_LIQUIDATOR_SHARE_BPS: u32 = 5_000;
