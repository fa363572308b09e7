//! Action batch vocabulary.
//!
//! Callers describe what they want as an ordered list of actions; the executor
//! consumes the list exactly once and either commits all of it or none of it.
//! Amounts are expressed in either denomination (Wei or Par) as a signed delta
//! or an absolute target, which is enough to say "repay everything" (target 0)
//! without knowing the accrued debt up front.

use crate::types::{AccountId, Address, MarketId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denomination {
    Wei,
    Par,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reference {
    /// Signed change relative to the current balance
    Delta,
    /// Absolute balance to end up at
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub denomination: Denomination,
    pub reference: Reference,
    pub value: Decimal,
}

impl AssetAmount {
    pub fn wei_delta(value: Decimal) -> Self {
        Self {
            denomination: Denomination::Wei,
            reference: Reference::Delta,
            value,
        }
    }

    pub fn wei_target(value: Decimal) -> Self {
        Self {
            denomination: Denomination::Wei,
            reference: Reference::Target,
            value,
        }
    }

    pub fn par_delta(value: Decimal) -> Self {
        Self {
            denomination: Denomination::Par,
            reference: Reference::Delta,
            value,
        }
    }

    pub fn par_target(value: Decimal) -> Self {
        Self {
            denomination: Denomination::Par,
            reference: Reference::Target,
            value,
        }
    }

    /// "close this balance out", whatever it currently is
    pub fn zero_target() -> Self {
        Self::wei_target(Decimal::ZERO)
    }
}

/// Which side(s) of a funds movement must pass the collateralization check.
/// Excluding an account lets its negative balance persist for this batch; the
/// balance-count cap and min-borrow floor are never waived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceCheckFlag {
    Both,
    FromAccount,
    ToAccount,
    None,
}

/// Typed payload for the Call action. SetExpiry is handled by the ledger
/// itself; Raw is dispatched to a registered call handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallData {
    SetExpiry {
        market: MarketId,
        expiry: Option<Timestamp>,
    },
    Raw(Vec<u8>),
}

// 3.0: one balance-changing step. constructed by the caller, consumed exactly
// once by the executor, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Move tokens from an external wallet into `account`
    Deposit {
        account: AccountId,
        market: MarketId,
        from: Address,
        amount: AssetAmount,
    },
    /// Move tokens out of `account` to an external wallet
    Withdraw {
        account: AccountId,
        market: MarketId,
        to: Address,
        amount: AssetAmount,
    },
    /// Move balance between two ledger accounts. `amount` is resolved against
    /// `from_account`; `to_account` receives the exact negation
    Transfer {
        from_account: AccountId,
        to_account: AccountId,
        market: MarketId,
        amount: AssetAmount,
    },
    /// Exchange `input_market` for `output_market` against a maker account,
    /// with the output side priced by the named trader
    Trade {
        taker_account: AccountId,
        maker_account: AccountId,
        input_market: MarketId,
        output_market: MarketId,
        trader: Address,
        input_amount: AssetAmount,
        data: Vec<u8>,
    },
    /// Repay part of `liquid_account`'s debt and seize held collateral at the
    /// spread-adjusted price
    Liquidate {
        solid_account: AccountId,
        liquid_account: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    },
    /// Liquidation fallback for accounts with no collateral left: repayment
    /// comes out of the owed market's excess supply
    Vaporize {
        solid_account: AccountId,
        vapor_account: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    },
    /// Invoke an external handler (or the built-in expiry table) for `account`
    Call {
        account: AccountId,
        callee: Address,
        data: CallData,
    },
}

impl Action {
    /// Accounts the sender must be authorized for, in declaration order.
    /// Liquidation/vaporization counterparties are not primary: the solid
    /// account acts on them, they do not act.
    pub fn primary_accounts(&self) -> Vec<AccountId> {
        match self {
            Action::Deposit { account, .. }
            | Action::Withdraw { account, .. }
            | Action::Call { account, .. } => vec![*account],
            Action::Transfer {
                from_account,
                to_account,
                ..
            } => vec![*from_account, *to_account],
            Action::Trade { taker_account, .. } => vec![*taker_account],
            Action::Liquidate { solid_account, .. } => vec![*solid_account],
            Action::Vaporize { solid_account, .. } => vec![*solid_account],
        }
    }

    /// Every account whose balances this action may touch.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        match self {
            Action::Deposit { account, .. }
            | Action::Withdraw { account, .. }
            | Action::Call { account, .. } => vec![*account],
            Action::Transfer {
                from_account,
                to_account,
                ..
            } => vec![*from_account, *to_account],
            Action::Trade {
                taker_account,
                maker_account,
                ..
            } => vec![*taker_account, *maker_account],
            Action::Liquidate {
                solid_account,
                liquid_account,
                ..
            } => vec![*solid_account, *liquid_account],
            Action::Vaporize {
                solid_account,
                vapor_account,
                ..
            } => vec![*solid_account, *vapor_account],
        }
    }

    /// Markets whose indices must be current before this action applies.
    pub fn touched_markets(&self) -> Vec<MarketId> {
        match self {
            Action::Deposit { market, .. }
            | Action::Withdraw { market, .. }
            | Action::Transfer { market, .. } => vec![*market],
            Action::Trade {
                input_market,
                output_market,
                ..
            } => vec![*input_market, *output_market],
            Action::Liquidate {
                owed_market,
                held_market,
                ..
            }
            | Action::Vaporize {
                owed_market,
                held_market,
                ..
            } => vec![*owed_market, *held_market],
            Action::Call { data, .. } => match data {
                CallData::SetExpiry { market, .. } => vec![*market],
                CallData::Raw(_) => vec![],
            },
        }
    }
}
