//! Borrow expiry table.
//!
//! An expiry record marks an (account, market) borrow as due at an absolute
//! timestamp. Past-due borrows become liquidatable with the spread premium
//! waived, regardless of collateralization. A record attached to a
//! non-negative balance is always stale: it is never trusted and gets cleared
//! on sight.

use crate::types::{AccountId, MarketId, Par, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryTable {
    entries: HashMap<(AccountId, MarketId), Timestamp>,
}

impl ExpiryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the expiry for a borrow. `None` clears.
    pub fn set(&mut self, account: AccountId, market: MarketId, expiry: Option<Timestamp>) {
        match expiry {
            Some(ts) => {
                self.entries.insert((account, market), ts);
            }
            None => {
                self.entries.remove(&(account, market));
            }
        }
    }

    /// The expiry that currently applies, given the balance it is attached to.
    /// Non-negative balances never have a live expiry.
    pub fn effective(&self, account: AccountId, market: MarketId, par: Par) -> Option<Timestamp> {
        if !par.is_negative() {
            return None;
        }
        self.entries.get(&(account, market)).copied()
    }

    /// Drop the record when the balance it guarded went non-negative.
    pub fn clear_if_stale(&mut self, account: AccountId, market: MarketId, par: Par) {
        if !par.is_negative() {
            self.entries.remove(&(account, market));
        }
    }

    pub fn is_expired(
        &self,
        account: AccountId,
        market: MarketId,
        par: Par,
        now: Timestamp,
    ) -> bool {
        match self.effective(account, market, par) {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
