//! # Mathematical Functions
//!
//! Fixed-point helpers for funding, tick and liquidity calculations.

pub mod growth_math;
pub mod liquidity_math;
pub mod safe_math;
pub mod tick_math;

// Re-export commonly used functions
pub use growth_math::*;
pub use liquidity_math::*;
pub use safe_math::*;
pub use tick_math::*;
