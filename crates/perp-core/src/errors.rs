//! # Core Error Types
//!
//! Errors raised by the funding ledger, the TWAP series and the settlement engine.
//! Venue failures are kept in their own enum so the maker-close settlement path can
//! recognise and recover from them.

use thiserror::Error;

/// Failures reported by the AMM venue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("Pool not initialized")]
    PoolNotInitialized,

    #[error("Pool already initialized")]
    PoolAlreadyInitialized,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Slippage limit exceeded")]
    SlippageExceeded,

    #[error("Venue position {0} not found")]
    PositionNotFound(u64),

    #[error("Invalid venue request: {0}")]
    InvalidRequest(&'static str),
}

/// Core engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerpError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Margin must be non-zero")]
    ZeroMargin,

    #[error("Margin {margin} outside [{min}, {max}]")]
    MarginOutOfBounds { margin: u64, min: u64, max: u64 },

    #[error("Leverage {leverage_bps} bps outside [{min_bps}, {max_bps}]")]
    LeverageOutOfBounds { leverage_bps: u32, min_bps: u32, max_bps: u32 },

    #[error("Maker margin ratio {ratio_bps} bps outside [{min_bps}, {max_bps}]")]
    MakerRatioOutOfBounds { ratio_bps: u128, min_bps: u32, max_bps: u32 },

    #[error("Invalid tick range [{lower}, {upper})")]
    InvalidTickRange { lower: i32, upper: i32 },

    #[error("Tick {tick} not aligned to spacing {spacing}")]
    TickNotAligned { tick: i32, spacing: i32 },

    #[error("Liquidity must be non-zero")]
    ZeroLiquidity,

    #[error("Position size must be non-zero")]
    ZeroSize,

    #[error("Margin delta must be non-zero")]
    ZeroMarginDelta,

    #[error("Caller is not the position holder")]
    Unauthorized,

    #[error("Position {0} not found")]
    PositionNotFound(u64),

    #[error("Timestamp {now} precedes last update {last}")]
    InvalidTimestamp { now: u32, last: u32 },

    // ========================================================================
    // Venue and Custody Errors
    // ========================================================================

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Insufficient funds: account {account} holds {balance}, needs {amount}")]
    InsufficientFunds { account: u64, balance: u64, amount: u64 },

    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Conversion error")]
    ConversionError,

    #[error("Tick {0} out of range")]
    InvalidTick(i32),

    #[error("Sqrt price {0} out of range")]
    InvalidSqrtPrice(u128),

    // ========================================================================
    // Invariant Violations
    // ========================================================================

    #[error("Bucket {0} is not initialized")]
    BucketNotInitialized(i32),

    #[error("Bucket {0} is already initialized")]
    BucketAlreadyInitialized(i32),

    #[error("Observation series not initialized")]
    SeriesNotInitialized,

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration file error: {0}")]
    ConfigIo(String),
}

/// Result type using core errors
pub type PerpResult<T> = Result<T, PerpError>;

impl PerpError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Whether the error came from the AMM venue
    pub fn is_venue(&self) -> bool {
        matches!(self, Self::Venue(_))
    }

    /// Whether the error signals broken bucket or series bookkeeping
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::BucketNotInitialized(_)
                | Self::BucketAlreadyInitialized(_)
                | Self::SeriesNotInitialized
        )
    }
}
