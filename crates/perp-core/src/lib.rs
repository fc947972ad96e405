//! # Feels Perp Core - Funding & Position Settlement
//!
//! Settlement core for perpetual futures priced off a concentrated-liquidity venue.
//! It provides:
//!
//! - A TWAP accumulator over a growable circular observation buffer
//! - A tick-indexed funding ledger using "growth outside" snapshots
//! - Maker and taker position lifecycle with funding, P&L and liquidation
//! - Interfaces for the venue, index oracle and custody the engine drives

pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod funding;
pub mod math;
pub mod oracle;
pub mod settlement;
pub mod types;
pub mod venue;

// Re-export commonly used items
pub use config::EngineConfig;
pub use constants::*;
pub use engine::PerpEngine;
pub use errors::{PerpError, PerpResult, VenueError};
pub use funding::{FundingLedger, RangeGrowth};
pub use oracle::{Observation, TwapSeries};
pub use settlement::{is_liquidatable, settle, Settlement};
pub use types::*;
pub use venue::{AmmVenue, Custody, IndexOracle, Limits, MintReceipt, SwapDirection, VenueResult};
