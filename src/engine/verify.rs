// 8.3 engine/verify.rs: deferred solvency verification. Runs once per batch,
// after every action has applied to the staged state, over the unique touched
// accounts in first-touch order. The balance-check flag narrows which accounts
// get the collateralization check. The balance-count cap holds for every
// touched account (liquidation can only shrink it); the minimum borrow floor
// applies only to accounts under verification, so a seizure capped at the
// held balance may leave a counterparty with residual dust debt for
// vaporization to clear.

use super::core::Ledger;
use super::executor::ExecutionContext;
use super::results::LedgerError;
use crate::account::Account;
use crate::actions::BalanceCheckFlag;
use crate::balance::par_to_wei;
use crate::market::{MarketError, MarketState};
use crate::types::AccountId;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Oracle-priced account health, after per-market margin premiums.
#[derive(Debug, Clone, Copy)]
pub struct AccountValues {
    pub supply_value: Decimal,
    pub borrow_value: Decimal,
}

impl AccountValues {
    pub fn is_collateralized(&self, margin_ratio: Decimal) -> bool {
        self.borrow_value.is_zero() || self.supply_value >= self.borrow_value * margin_ratio
    }
}

impl Ledger {
    /// Returns the number of accounts that went through the full
    /// collateralization check.
    pub(super) fn verify_touched(
        &self,
        ctx: &ExecutionContext,
        flag: BalanceCheckFlag,
    ) -> Result<usize, LedgerError> {
        let mut verified = 0;
        for account in &ctx.touched {
            self.check_balance_cap(ctx, *account)?;

            if ctx.skip_verify.contains(account) {
                continue;
            }
            self.check_borrow_floor(ctx, *account)?;

            let role = ctx.roles.get(account).copied().unwrap_or_default();
            let in_scope = match flag {
                BalanceCheckFlag::Both => true,
                BalanceCheckFlag::FromAccount => role.debited,
                BalanceCheckFlag::ToAccount => role.credited,
                BalanceCheckFlag::None => false,
            };
            if !in_scope {
                continue;
            }

            let values = self.staged_account_values(ctx, *account)?;
            if !values.is_collateralized(self.risk.margin_ratio) {
                return Err(LedgerError::Undercollateralized {
                    account: *account,
                    supply_value: values.supply_value,
                    borrow_value: values.borrow_value,
                    required_ratio: self.risk.margin_ratio,
                });
            }
            verified += 1;
        }
        Ok(verified)
    }

    /// Balance-count cap. Holds for every touched account regardless of flag
    /// scope or the liquidation skip set.
    fn check_balance_cap(
        &self,
        ctx: &ExecutionContext,
        account: AccountId,
    ) -> Result<(), LedgerError> {
        let Some(state) = ctx.accounts.get(&account) else {
            return Ok(());
        };
        let count = state.market_count();
        let max = self.risk.max_markets_with_balances;
        if count > max {
            return Err(LedgerError::TooManyBalances {
                account,
                count,
                max,
            });
        }
        Ok(())
    }

    /// Per-market borrow floor. Never waived by the flag, but liquidation
    /// counterparties are exempt: a capped seizure may leave dust debt.
    fn check_borrow_floor(
        &self,
        ctx: &ExecutionContext,
        account: AccountId,
    ) -> Result<(), LedgerError> {
        let Some(state) = ctx.accounts.get(&account) else {
            return Ok(());
        };
        for market in state.markets() {
            let par = state.get_par(market);
            if !par.is_negative() {
                continue;
            }
            let market_state = ctx.market(market)?;
            let wei = par_to_wei(par, &market_state.index);
            let price = self.oracle.price(market)?;
            let value = wei.abs() * price.value();
            if value < self.risk.min_borrowed_value {
                return Err(LedgerError::BorrowTooSmall {
                    account,
                    market,
                    value,
                    minimum: self.risk.min_borrowed_value,
                });
            }
        }
        Ok(())
    }

    /// Premium-adjusted account values. A market's margin premium penalizes
    /// both sides: borrows count for more, supplies count for less.
    fn values_with(
        &self,
        accounts: &HashMap<AccountId, Account>,
        markets: &[MarketState],
        account: AccountId,
    ) -> Result<AccountValues, LedgerError> {
        let mut supply_value = Decimal::ZERO;
        let mut borrow_value = Decimal::ZERO;
        let Some(state) = accounts.get(&account) else {
            return Ok(AccountValues {
                supply_value,
                borrow_value,
            });
        };
        for market in state.markets() {
            let par = state.get_par(market);
            let market_state = markets
                .get(market.0 as usize)
                .ok_or(MarketError::MarketNotFound(market))?;
            let wei = par_to_wei(par, &market_state.index);
            let price = self.oracle.price(market)?;
            let value = wei.abs() * price.value();
            let adjustment = Decimal::ONE + market_state.config.margin_premium;
            if wei.is_negative() {
                borrow_value += value * adjustment;
            } else {
                supply_value += value / adjustment;
            }
        }
        Ok(AccountValues {
            supply_value,
            borrow_value,
        })
    }

    pub(super) fn staged_account_values(
        &self,
        ctx: &ExecutionContext,
        account: AccountId,
    ) -> Result<AccountValues, LedgerError> {
        self.values_with(&ctx.accounts, &ctx.markets, account)
    }

    /// Same computation over committed state. Keeper and liquidator query.
    pub fn account_values(&self, account: AccountId) -> Result<AccountValues, LedgerError> {
        self.values_with(&self.accounts, &self.markets, account)
    }

    pub fn is_collateralized(&self, account: AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .account_values(account)?
            .is_collateralized(self.risk.margin_ratio))
    }
}
