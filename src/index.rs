//! Interest index accrual.
//!
//! Every market carries a borrow index and a supply index. Balances store Par;
//! multiplying by the applicable index yields current Wei. Compounding the
//! indices is how interest accrues without touching any account: borrowers'
//! debt grows with the borrow index, suppliers' credit with the supply index.
//!
//! The supply index grows by apportioning the interest borrowers actually pay
//! across total supply, net of the protocol earnings spread. Indices only ever
//! move up; an index that would pass the configured ceiling aborts accrual
//! instead of wrapping.

use crate::types::{Rate, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Accrual state for one market. `borrow >= supply >= 1` in practice since
/// borrowers pay the spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestIndex {
    pub borrow: Decimal,
    pub supply: Decimal,
    pub last_update: Timestamp,
}

impl InterestIndex {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            borrow: Decimal::ONE,
            supply: Decimal::ONE,
            last_update: timestamp,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccrualError {
    #[error("Accrual would push index to {index}, past ceiling {ceiling}")]
    IndexOverflow { index: Decimal, ceiling: Decimal },
}

/// Bring an index current for `now`. No-op when no time has elapsed, so
/// repeated accrual at one timestamp is idempotent.
///
/// `borrow_wei` / `supply_wei` are the market totals valued at the old index;
/// `earnings_rate` is the supplier share of paid interest (rest is protocol
/// earnings).
pub fn accrue_index(
    index: &InterestIndex,
    now: Timestamp,
    rate: Rate,
    borrow_wei: Wei,
    supply_wei: Wei,
    earnings_rate: Decimal,
    max_index: Decimal,
) -> Result<InterestIndex, AccrualError> {
    let elapsed = index.last_update.elapsed_secs(&now);
    if elapsed.is_zero() {
        return Ok(*index);
    }

    // simple (non-exponential) compounding per accrual window
    let borrow_accrual = rate.value() * elapsed;
    let new_borrow = index.borrow * (Decimal::ONE + borrow_accrual);
    if new_borrow > max_index {
        return Err(AccrualError::IndexOverflow {
            index: new_borrow,
            ceiling: max_index,
        });
    }

    // interest actually paid this window, spread across suppliers
    let interest_wei = borrow_wei.value() * borrow_accrual;
    let supplier_share = interest_wei * earnings_rate;
    let supply_accrual = if supply_wei.value() > Decimal::ZERO {
        supplier_share / supply_wei.value()
    } else {
        Decimal::ZERO
    };
    let new_supply = index.supply * (Decimal::ONE + supply_accrual);
    if new_supply > max_index {
        return Err(AccrualError::IndexOverflow {
            index: new_supply,
            ceiling: max_index,
        });
    }

    Ok(InterestIndex {
        borrow: new_borrow,
        supply: new_supply,
        last_update: now,
    })
}
