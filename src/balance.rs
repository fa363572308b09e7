//! Par/Wei conversion and amount resolution.
//!
//! Par is stored principal; Wei is current value under the market's indices.
//! Balances are kept in whole base units, so every conversion must round, and
//! the rounding direction is economically load-bearing: it always favors the
//! protocol. Signed floor does exactly that in one rule: a credit (positive)
//! loses its fraction, a debt (negative) grows by its fraction. Do not replace
//! this with symmetric rounding; solvency accounting depends on the bias.

use crate::actions::{AssetAmount, Denomination, Reference};
use crate::index::InterestIndex;
use crate::types::{Par, Wei};
use rust_decimal::Decimal;

/// Round toward negative infinity: down for credits, up-in-magnitude for debts.
pub fn round_protocol_favor(raw: Decimal) -> Decimal {
    raw.floor()
}

fn index_for(signed: Decimal, index: &InterestIndex) -> Decimal {
    if signed < Decimal::ZERO {
        index.borrow
    } else {
        index.supply
    }
}

/// Current value of a stored principal.
pub fn par_to_wei(par: Par, index: &InterestIndex) -> Wei {
    let raw = par.value() * index_for(par.value(), index);
    Wei::new(round_protocol_favor(raw))
}

/// Principal that corresponds to a current value.
pub fn wei_to_par(wei: Wei, index: &InterestIndex) -> Par {
    let divisor = index_for(wei.value(), index);
    let raw = wei.value() / divisor;
    Par::new(round_protocol_favor(raw))
}

/// Outcome of resolving an `AssetAmount` against one account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAmount {
    pub new_par: Par,
    /// Wei moved into (+) or out of (-) the account by this change
    pub wei_delta: Wei,
}

/// Turn a caller-facing amount into a concrete new Par balance and the Wei
/// that changes hands, using the market's current (post-accrual) indices.
pub fn resolve_amount(
    old_par: Par,
    amount: &AssetAmount,
    index: &InterestIndex,
) -> ResolvedAmount {
    let old_wei = par_to_wei(old_par, index);

    match (amount.denomination, amount.reference) {
        (Denomination::Wei, Reference::Delta) => {
            let new_wei = Wei::new(old_wei.value() + amount.value);
            let new_par = wei_to_par(new_wei, index);
            ResolvedAmount {
                new_par,
                wei_delta: Wei::new(amount.value),
            }
        }
        (Denomination::Wei, Reference::Target) => {
            let target = Wei::new(amount.value);
            let new_par = wei_to_par(target, index);
            ResolvedAmount {
                new_par,
                wei_delta: target.sub(old_wei),
            }
        }
        (Denomination::Par, Reference::Delta) => {
            let new_par = old_par.add(amount.value);
            let new_wei = par_to_wei(new_par, index);
            ResolvedAmount {
                new_par,
                wei_delta: new_wei.sub(old_wei),
            }
        }
        (Denomination::Par, Reference::Target) => {
            let new_par = Par::new(amount.value);
            let new_wei = par_to_wei(new_par, index);
            ResolvedAmount {
                new_par,
                wei_delta: new_wei.sub(old_wei),
            }
        }
    }
}
