//! # Position Types
//!
//! Account identifiers, maker/taker position records and close reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::funding::RangeGrowth;

/// Opaque account identifier used for position holders and custody
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

/// Liquidity-providing position over `[tick_lower, tick_upper)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakerPosition {
    pub holder: AccountId,
    /// Posted margin (collateral units)
    pub margin: u64,
    pub entry_timestamp: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Position id assigned by the venue at mint
    pub venue_position_id: u64,
    /// Base borrowed into the range at mint
    pub base_borrowed: u128,
    /// Quote borrowed into the range at mint
    pub quote_borrowed: u128,
    /// Range funding growth at entry
    pub entry_growth: RangeGrowth,
}

/// Directional position holding a constant base size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakerPosition {
    pub holder: AccountId,
    pub is_long: bool,
    /// Base size
    pub size: u128,
    /// Posted margin (collateral units)
    pub margin: u64,
    /// Quote value at entry
    pub entry_value: u128,
    /// Global cumulative funding at entry (Q64.64)
    pub entry_cumulative_funding: i128,
    pub entry_timestamp: u32,
}

/// Open position owned by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Maker(MakerPosition),
    Taker(TakerPosition),
}

impl Position {
    pub fn holder(&self) -> AccountId {
        match self {
            Position::Maker(maker) => maker.holder,
            Position::Taker(taker) => taker.holder,
        }
    }

    pub fn margin(&self) -> u64 {
        match self {
            Position::Maker(maker) => maker.margin,
            Position::Taker(taker) => taker.margin,
        }
    }

    pub(crate) fn margin_mut(&mut self) -> &mut u64 {
        match self {
            Position::Maker(maker) => &mut maker.margin,
            Position::Taker(taker) => &mut taker.margin,
        }
    }

    pub fn as_maker(&self) -> Option<&MakerPosition> {
        match self {
            Position::Maker(maker) => Some(maker),
            Position::Taker(_) => None,
        }
    }

    pub fn as_taker(&self) -> Option<&TakerPosition> {
        match self {
            Position::Taker(taker) => Some(taker),
            Position::Maker(_) => None,
        }
    }
}

/// How a close was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseOutcome {
    /// Holder closed and received the full effective margin
    Paid,
    /// Margin after the liquidation fee breached the threshold
    Liquidated,
    /// Effective margin was negative; liquidated with zero payout
    Insolvent,
}

impl CloseOutcome {
    pub fn is_liquidation(&self) -> bool {
        !matches!(self, CloseOutcome::Paid)
    }
}

/// Result of closing a position.
///
/// Quote amounts are 18-decimal internal units; payouts and shares are collateral
/// units as transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReport {
    pub position_id: u64,
    pub holder: AccountId,
    pub outcome: CloseOutcome,
    /// Trading P&L realized through the venue (quote)
    pub realized_pnl: i128,
    /// Funding owed since entry; positive means the position paid
    pub funding: i128,
    /// `margin + pnl - funding`
    pub effective_margin: i128,
    /// Notional the fee and threshold were measured against
    pub notional: u128,
    /// Fee charged on liquidation (zero otherwise)
    pub liquidation_fee: u128,
    /// Collateral sent to the holder
    pub payout: u64,
    /// Collateral sent to the liquidating caller
    pub liquidator_reward: u64,
    /// Collateral sent to the insurance account
    pub insurance_share: u64,
    /// Shortfall recorded as bad debt
    pub bad_debt: u128,
    /// Taker opened for residual base exposure a maker close could not settle
    pub spawned_taker: Option<u64>,
}
