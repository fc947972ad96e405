//! Test environment wiring the settlement engine to the in-memory collaborators
//! with a controllable clock.

use feels_perp_core::{AccountId, AmmVenue, CloseReport, Custody, EngineConfig, PerpEngine, Position};
use log::debug;

use crate::custody::LedgerCustody;
use crate::oracle::SimIndexOracle;
use crate::pool::SimPool;
use crate::{SimulationError, SimulationResult};

/// Engine over the simulated collaborators
pub type SimEngine = PerpEngine<SimPool, SimIndexOracle, LedgerCustody>;

/// Engine plus clock
#[derive(Debug, Clone)]
pub struct TestEnvironment {
    pub engine: SimEngine,
    now: u32,
}

impl TestEnvironment {
    /// Start the engine at `start` with the index published at `index_sqrt_price_x64`
    pub fn new(config: EngineConfig, start: u32, index_sqrt_price_x64: u128) -> SimulationResult<Self> {
        let oracle = SimIndexOracle::new(start, index_sqrt_price_x64);
        let engine = PerpEngine::new(config, SimPool::new(), oracle, LedgerCustody::new(), start)?;
        Ok(Self { engine, now: start })
    }

    pub fn now(&self) -> u32 {
        self.now
    }

    /// Move the clock forward
    pub fn advance(&mut self, seconds: u32) -> SimulationResult<u32> {
        self.now = self
            .now
            .checked_add(seconds)
            .ok_or(SimulationError::ClockOverflow)?;
        debug!("clock advanced to {}", self.now);
        Ok(self.now)
    }

    /// Mint collateral into an account
    pub fn fund(&mut self, account: AccountId, amount: u64) -> SimulationResult<()> {
        self.engine.custody_mut().credit(account, amount)?;
        Ok(())
    }

    pub fn balance(&self, account: AccountId) -> u64 {
        self.engine.custody().balance_of(account)
    }

    /// Publish a new index price at the current time
    pub fn set_index_price(&mut self, sqrt_price_x64: u128) -> SimulationResult<()> {
        let now = self.now;
        self.engine.oracle_mut().set_price(now, sqrt_price_x64)?;
        Ok(())
    }

    pub fn sqrt_price(&self) -> SimulationResult<u128> {
        Ok(self.engine.venue().sqrt_price_and_tick()?.0)
    }

    pub fn open_maker(
        &mut self,
        holder: AccountId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        margin: u64,
    ) -> SimulationResult<u64> {
        let now = self.now;
        Ok(self
            .engine
            .open_maker(holder, tick_lower, tick_upper, liquidity, margin, now)?)
    }

    pub fn open_taker(
        &mut self,
        holder: AccountId,
        is_long: bool,
        margin: u64,
        leverage_bps: u32,
    ) -> SimulationResult<u64> {
        let now = self.now;
        Ok(self.engine.open_taker(holder, is_long, margin, leverage_bps, now)?)
    }

    pub fn add_margin(&mut self, holder: AccountId, position_id: u64, amount: u64) -> SimulationResult<()> {
        let now = self.now;
        Ok(self.engine.add_margin(holder, position_id, amount, now)?)
    }

    pub fn close(&mut self, caller: AccountId, position_id: u64) -> SimulationResult<CloseReport> {
        let now = self.now;
        Ok(self.engine.close(caller, position_id, now)?)
    }

    pub fn update_funding(&mut self) -> SimulationResult<()> {
        let now = self.now;
        Ok(self.engine.update_funding(now)?)
    }

    pub fn position(&self, position_id: u64) -> Option<&Position> {
        self.engine.position(position_id)
    }
}
