//! Index oracle backed by its own TWAP series.

use feels_perp_core::{IndexOracle, PerpResult, TwapSeries, DEFAULT_OBSERVATION_CAPACITY};

/// Index price feed whose history is recorded as it is set
#[derive(Debug, Clone)]
pub struct SimIndexOracle {
    series: TwapSeries,
    current_sqrt_price_x64: u128,
}

impl SimIndexOracle {
    pub fn new(now: u32, sqrt_price_x64: u128) -> Self {
        let mut series = TwapSeries::initialize(now);
        series.grow_capacity(DEFAULT_OBSERVATION_CAPACITY);
        Self { series, current_sqrt_price_x64: sqrt_price_x64 }
    }

    /// Publish a new index price effective from `now`
    pub fn set_price(&mut self, now: u32, sqrt_price_x64: u128) -> PerpResult<()> {
        self.series.write(now, self.current_sqrt_price_x64)?;
        self.current_sqrt_price_x64 = sqrt_price_x64;
        Ok(())
    }

    pub fn current(&self) -> u128 {
        self.current_sqrt_price_x64
    }
}

impl IndexOracle for SimIndexOracle {
    fn time_weighted_average(&self, window: u32, now: u32) -> PerpResult<u128> {
        self.series
            .time_weighted_average(window, now, self.current_sqrt_price_x64)
    }
}
