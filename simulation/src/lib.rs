//! Simulation framework for the Feels perp settlement core
//!
//! Provides utilities for:
//! - An in-memory concentrated-liquidity venue
//! - An index oracle with recorded price history
//! - A balance-map custody ledger
//! - A test environment driving the engine with a controllable clock

pub mod custody;
pub mod environment;
pub mod oracle;
pub mod pool;

pub use custody::LedgerCustody;
pub use environment::{SimEngine, TestEnvironment};
pub use oracle::SimIndexOracle;
pub use pool::{LiquidityPosition, SimPool, TickInfo};

use feels_perp_core::{PerpError, VenueError};

/// Simulation error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Engine error: {0}")]
    Engine(#[from] PerpError),

    #[error("Clock overflow")]
    ClockOverflow,
}

impl From<VenueError> for SimulationError {
    fn from(err: VenueError) -> Self {
        SimulationError::Engine(err.into())
    }
}

/// Simulation result type
pub type SimulationResult<T> = std::result::Result<T, SimulationError>;
