//! # Engine Configuration
//!
//! Risk and funding parameters, loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{PerpError, PerpResult};
use crate::math::tick_math::{is_tick_valid, sqrt_price_at_tick};
use crate::types::AccountId;

/// Settlement engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimals of the collateral token margin is posted in
    pub collateral_decimals: u8,

    /// Tick spacing of the venue pool
    pub tick_spacing: i32,

    /// Tick the pool is created at
    pub starting_tick: i32,

    /// Seconds over which a full mark/index premium is paid
    pub funding_interval_secs: u32,

    /// Lookback window for mark and index TWAPs
    pub twap_window_secs: u32,

    /// Observation slots allocated for the mark series
    pub observation_capacity: u16,

    /// Margin bounds for taker positions (collateral units)
    pub min_margin: u64,
    pub max_margin: u64,

    /// Taker leverage bounds (bps, 10_000 = 1x)
    pub min_leverage_bps: u32,
    pub max_leverage_bps: u32,

    /// Maker margin / notional band (bps)
    pub min_maker_ratio_bps: u32,
    pub max_maker_ratio_bps: u32,

    /// Leverage beyond which a position is liquidated (bps)
    pub liquidation_leverage_bps: u32,

    /// Liquidation fee as a fraction of notional (bps)
    pub liquidation_fee_bps: u32,

    /// Share of the liquidation fee paid to the liquidator (bps)
    pub liquidator_share_bps: u32,

    /// Account holding posted margin
    pub vault_account: AccountId,

    /// Account receiving the insurance share of liquidation fees
    pub insurance_account: AccountId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collateral_decimals: DEFAULT_COLLATERAL_DECIMALS,
            tick_spacing: DEFAULT_TICK_SPACING,
            starting_tick: 0,
            funding_interval_secs: DEFAULT_FUNDING_INTERVAL_SECS,
            twap_window_secs: DEFAULT_TWAP_WINDOW_SECS,
            observation_capacity: DEFAULT_OBSERVATION_CAPACITY,
            min_margin: 1,
            max_margin: DEFAULT_MAX_MARGIN,
            min_leverage_bps: DEFAULT_MIN_LEVERAGE_BPS,
            max_leverage_bps: DEFAULT_MAX_LEVERAGE_BPS,
            min_maker_ratio_bps: DEFAULT_MIN_MAKER_RATIO_BPS,
            max_maker_ratio_bps: DEFAULT_MAX_MAKER_RATIO_BPS,
            liquidation_leverage_bps: DEFAULT_LIQUIDATION_LEVERAGE_BPS,
            liquidation_fee_bps: DEFAULT_LIQUIDATION_FEE_BPS,
            liquidator_share_bps: DEFAULT_LIQUIDATOR_SHARE_BPS,
            vault_account: AccountId(1),
            insurance_account: AccountId(2),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> PerpResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PerpError::ConfigIo(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> PerpResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| PerpError::ConfigIo(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Q64.64 sqrt price at the starting tick
    pub fn starting_sqrt_price_x64(&self) -> PerpResult<u128> {
        sqrt_price_at_tick(self.starting_tick)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> PerpResult<String> {
        toml::to_string_pretty(self).map_err(|e| PerpError::ConfigIo(format!("failed to serialize config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> PerpResult<()> {
        if self.collateral_decimals > INTERNAL_DECIMALS {
            return Err(PerpError::invalid_config("collateral_decimals must be at most 18"));
        }
        if self.tick_spacing <= 0 {
            return Err(PerpError::invalid_config("tick_spacing must be positive"));
        }
        if !is_tick_valid(self.starting_tick) {
            return Err(PerpError::invalid_config("starting_tick outside the tick range"));
        }
        if self.funding_interval_secs == 0 {
            return Err(PerpError::invalid_config("funding_interval_secs must be greater than 0"));
        }
        if self.observation_capacity == 0 {
            return Err(PerpError::invalid_config("observation_capacity must be greater than 0"));
        }
        if self.min_margin == 0 || self.min_margin > self.max_margin {
            return Err(PerpError::invalid_config("margin bounds must satisfy 0 < min_margin <= max_margin"));
        }
        if self.min_leverage_bps == 0 || self.min_leverage_bps > self.max_leverage_bps {
            return Err(PerpError::invalid_config("leverage bounds must satisfy 0 < min <= max"));
        }
        if self.min_maker_ratio_bps == 0 || self.min_maker_ratio_bps > self.max_maker_ratio_bps {
            return Err(PerpError::invalid_config("maker ratio bounds must satisfy 0 < min <= max"));
        }
        if self.liquidation_leverage_bps <= self.max_leverage_bps {
            return Err(PerpError::invalid_config("liquidation_leverage_bps must exceed max_leverage_bps"));
        }
        if self.liquidation_fee_bps > BPS_DENOMINATOR || self.liquidator_share_bps > BPS_DENOMINATOR {
            return Err(PerpError::invalid_config("fee parameters must be at most 10000 bps"));
        }
        if self.vault_account == self.insurance_account {
            return Err(PerpError::invalid_config("vault and insurance accounts must differ"));
        }
        Ok(())
    }
}
