//! Accounts and operator authorization.
//!
//! An account holds a sparse map of signed Par balances, one per market it has
//! ever kept a non-zero balance in. The non-zero count is what the verifier
//! bounds; keeping the map sparse makes that check O(count), not O(markets).
//!
//! Owners act through their own accounts by default. They can also grant
//! operator rights to other addresses, and the ledger itself can mark global
//! operators (the trade router runs as one).

use crate::types::{AccountId, Address, MarketId, Par, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    balances: HashMap<MarketId, Par>,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, timestamp: Timestamp) -> Self {
        Self {
            id,
            balances: HashMap::new(),
            created_at: timestamp,
        }
    }

    /// Absent means zero; the map only holds non-zero entries.
    pub fn get_par(&self, market: MarketId) -> Par {
        self.balances.get(&market).copied().unwrap_or_else(Par::zero)
    }

    pub fn set_par(&mut self, market: MarketId, par: Par) {
        if par.is_zero() {
            self.balances.remove(&market);
        } else {
            self.balances.insert(market, par);
        }
    }

    /// Count of markets with a non-zero balance. bounded by the verifier.
    pub fn market_count(&self) -> usize {
        self.balances.len()
    }

    pub fn markets(&self) -> impl Iterator<Item = MarketId> + '_ {
        self.balances.keys().copied()
    }

    pub fn has_borrows(&self) -> bool {
        self.balances.values().any(|p| p.is_negative())
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

/// Who may act for whom. An owner is always authorized for their own
/// sub-accounts; local operators are per-owner grants; global operators are
/// engine-level (the router).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorRegistry {
    local: HashMap<Address, HashSet<Address>>,
    global: HashSet<Address>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local_operator(&mut self, owner: Address, operator: Address, trusted: bool) {
        let set = self.local.entry(owner).or_default();
        if trusted {
            set.insert(operator);
        } else {
            set.remove(&operator);
        }
    }

    pub fn set_global_operator(&mut self, operator: Address, trusted: bool) {
        if trusted {
            self.global.insert(operator);
        } else {
            self.global.remove(&operator);
        }
    }

    pub fn is_operator(&self, sender: Address, owner: Address) -> bool {
        sender == owner
            || self.global.contains(&sender)
            || self
                .local
                .get(&owner)
                .is_some_and(|set| set.contains(&sender))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("Sender {sender} is not authorized to operate account {account}")]
    Unauthorized { sender: Address, account: AccountId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account::new(AccountId::new(Address(1), 0), Timestamp::from_millis(0))
    }

    #[test]
    fn absent_balance_is_zero() {
        let acct = account();
        assert!(acct.get_par(MarketId(5)).is_zero());
        assert_eq!(acct.market_count(), 0);
    }

    #[test]
    fn set_par_maintains_sparse_set() {
        let mut acct = account();

        acct.set_par(MarketId(0), Par::new(dec!(100)));
        acct.set_par(MarketId(1), Par::new(dec!(-50)));
        assert_eq!(acct.market_count(), 2);
        assert!(acct.has_borrows());

        // zeroing a balance drops the entry
        acct.set_par(MarketId(1), Par::zero());
        assert_eq!(acct.market_count(), 1);
        assert!(!acct.has_borrows());
    }

    #[test]
    fn owner_is_always_operator() {
        let ops = OperatorRegistry::new();
        assert!(ops.is_operator(Address(1), Address(1)));
        assert!(!ops.is_operator(Address(2), Address(1)));
    }

    #[test]
    fn local_operator_grant_and_revoke() {
        let mut ops = OperatorRegistry::new();
        ops.set_local_operator(Address(1), Address(2), true);
        assert!(ops.is_operator(Address(2), Address(1)));
        // not symmetric
        assert!(!ops.is_operator(Address(1), Address(2)));

        ops.set_local_operator(Address(1), Address(2), false);
        assert!(!ops.is_operator(Address(2), Address(1)));
    }

    #[test]
    fn global_operator_covers_all_owners() {
        let mut ops = OperatorRegistry::new();
        ops.set_global_operator(Address(9), true);
        assert!(ops.is_operator(Address(9), Address(1)));
        assert!(ops.is_operator(Address(9), Address(2)));

        ops.set_global_operator(Address(9), false);
        assert!(!ops.is_operator(Address(9), Address(1)));
    }
}
