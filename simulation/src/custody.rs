//! Balance-map custody.

use std::collections::BTreeMap;

use feels_perp_core::{AccountId, Custody, PerpError, PerpResult};

/// Collateral balances keyed by account
#[derive(Debug, Clone, Default)]
pub struct LedgerCustody {
    balances: BTreeMap<AccountId, u64>,
}

impl LedgerCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint collateral into an account
    pub fn credit(&mut self, account: AccountId, amount: u64) -> PerpResult<()> {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.checked_add(amount).ok_or(PerpError::MathOverflow)?;
        Ok(())
    }
}

impl Custody for LedgerCustody {
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u64) -> PerpResult<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(PerpError::InsufficientFunds { account: from.0, balance, amount });
        }
        self.balances.insert(from, balance - amount);
        self.credit(to, amount)
    }

    fn balance_of(&self, account: AccountId) -> u64 {
        self.balances.get(&account).copied().unwrap_or(0)
    }
}
