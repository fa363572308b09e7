// 8.4 engine/liquidate.rs: forced deleveraging. Liquidation moves an
// underwater (or expired) account's debt and collateral to a solvent account
// at a spread; vaporization cancels debt that no collateral backs, drawing on
// the owed market's excess pool and writing off the remainder.
//
// Both run inside a batch: the target account is exempted from the
// collateralization check (it is strictly healthier afterwards) while the
// solid account is verified like any other touched account.

use super::core::Ledger;
use super::executor::ExecutionContext;
use super::results::{LedgerError, LiquidationOutcome, VaporizationOutcome};
use crate::actions::{Action, AssetAmount, BalanceCheckFlag};
use crate::balance::{par_to_wei, resolve_amount, wei_to_par};
use crate::events::{EventPayload, LiquidationEvent, ShortfallEvent, VaporizationEvent};
use crate::types::{AccountId, Address, MarketId, Wei};
use rust_decimal::Decimal;

impl Ledger {
    /// Single-action convenience wrapper. The sender must be authorized for
    /// the solid account; the liquid account needs no consent.
    pub fn liquidate(
        &mut self,
        sender: Address,
        solid_account: AccountId,
        liquid_account: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    ) -> Result<LiquidationOutcome, LedgerError> {
        self.execute_operation(
            sender,
            &[Action::Liquidate {
                solid_account,
                liquid_account,
                owed_market,
                held_market,
                amount,
            }],
            BalanceCheckFlag::Both,
        )?;
        self.last_liquidation_outcome()
    }

    pub fn vaporize(
        &mut self,
        sender: Address,
        solid_account: AccountId,
        vapor_account: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    ) -> Result<VaporizationOutcome, LedgerError> {
        self.execute_operation(
            sender,
            &[Action::Vaporize {
                solid_account,
                vapor_account,
                owed_market,
                held_market,
                amount,
            }],
            BalanceCheckFlag::Both,
        )?;
        self.last_vaporization_outcome()
    }

    pub(super) fn apply_liquidate(
        &self,
        ctx: &mut ExecutionContext,
        solid: AccountId,
        liquid: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    ) -> Result<(), LedgerError> {
        let owed_index = ctx.market(owed_market)?.index;
        let held_index = ctx.market(held_market)?.index;

        let liquid_owed_par = ctx.get_par(liquid, owed_market);
        if !liquid_owed_par.is_negative() {
            return Err(LedgerError::OwedBalanceNotNegative {
                account: liquid,
                market: owed_market,
            });
        }
        let liquid_held_par = ctx.get_par(liquid, held_market);
        if liquid_held_par.is_negative() {
            return Err(LedgerError::HeldBalanceNegative {
                account: liquid,
                market: held_market,
            });
        }

        // liquidatable = undercollateralized, or past a posted expiry on the
        // owed balance. the spread is waived only when expiry alone triggers
        let values = self.staged_account_values(ctx, liquid)?;
        let undercollateralized = !values.is_collateralized(self.risk.margin_ratio);
        let expired =
            ctx.expiries
                .is_expired(liquid, owed_market, liquid_owed_par, self.time());
        if !undercollateralized && !expired {
            return Err(LedgerError::AccountNotLiquidatable { account: liquid });
        }
        let expiry_triggered = expired && !undercollateralized;

        let resolved = resolve_amount(liquid_owed_par, &amount, &owed_index);
        if !resolved.wei_delta.is_positive() || resolved.new_par.is_positive() {
            return Err(LedgerError::LiquidationAmountOutOfRange { account: liquid });
        }
        let mut repaid = resolved.wei_delta;

        let owed_price = self.oracle.price(owed_market)?;
        let held_price = self.oracle.price(held_market)?;
        let spread = if expiry_triggered {
            Decimal::ZERO
        } else {
            self.liquidation_spread(ctx, held_market, owed_market)?
        };
        let ratio = owed_price.value() / held_price.value() * (Decimal::ONE + spread);

        let held_wei = par_to_wei(liquid_held_par, &held_index);
        let mut seized = Wei::new(repaid.value() * ratio);
        if seized > held_wei {
            // not enough collateral for the requested repay; scale both down
            // so the whole held balance is consumed exactly
            seized = held_wei;
            repaid = Wei::new(held_wei.value() / ratio);
            if !repaid.is_positive() {
                return Err(LedgerError::LiquidationAmountOutOfRange { account: liquid });
            }
        }

        let liquid_owed_new = wei_to_par(par_to_wei(liquid_owed_par, &owed_index).add(repaid), &owed_index);
        let liquid_held_new = wei_to_par(held_wei.sub(seized), &held_index);
        let solid_owed_new = wei_to_par(
            par_to_wei(ctx.get_par(solid, owed_market), &owed_index).sub(repaid),
            &owed_index,
        );
        let solid_held_new = wei_to_par(
            par_to_wei(ctx.get_par(solid, held_market), &held_index).add(seized),
            &held_index,
        );

        self.set_par_staged(ctx, liquid, owed_market, liquid_owed_new)?;
        self.set_par_staged(ctx, liquid, held_market, liquid_held_new)?;
        self.set_par_staged(ctx, solid, owed_market, solid_owed_new)?;
        self.set_par_staged(ctx, solid, held_market, solid_held_new)?;

        ctx.mark_debited(solid);
        ctx.mark_credited(solid);
        ctx.skip_verify.insert(liquid);

        ctx.staged_events
            .push(EventPayload::Liquidation(LiquidationEvent {
                solid_account: solid,
                liquid_account: liquid,
                owed_market,
                held_market,
                owed_wei_repaid: repaid,
                held_wei_seized: seized,
                spread,
                expiry_triggered,
            }));
        Ok(())
    }

    pub(super) fn apply_vaporize(
        &self,
        ctx: &mut ExecutionContext,
        solid: AccountId,
        vapor: AccountId,
        owed_market: MarketId,
        held_market: MarketId,
        amount: AssetAmount,
    ) -> Result<(), LedgerError> {
        let owed_index = ctx.market(owed_market)?.index;

        let vapor_owed_par = ctx.get_par(vapor, owed_market);
        if !vapor_owed_par.is_negative() {
            return Err(LedgerError::OwedBalanceNotNegative {
                account: vapor,
                market: owed_market,
            });
        }
        // an account qualifies for vaporization only once it holds nothing
        let held_par = ctx.get_par(vapor, held_market);
        if !held_par.is_zero() {
            return Err(LedgerError::HeldBalanceNotZero {
                account: vapor,
                market: held_market,
            });
        }
        if let Some(state) = ctx.accounts.get(&vapor) {
            for market in state.markets() {
                if state.get_par(market).is_positive() {
                    return Err(LedgerError::HeldBalanceNotZero {
                        account: vapor,
                        market,
                    });
                }
            }
        }

        let resolved = resolve_amount(vapor_owed_par, &amount, &owed_index);
        if !resolved.wei_delta.is_positive() || resolved.new_par.is_positive() {
            return Err(LedgerError::LiquidationAmountOutOfRange { account: vapor });
        }
        let repaid = resolved.wei_delta;

        let excess = ctx.market(owed_market)?.excess_wei();
        let drawn = if repaid <= excess { repaid } else { excess };
        let written_off = repaid.sub(drawn);

        self.set_par_staged(ctx, vapor, owed_market, resolved.new_par)?;
        ctx.touch(solid);
        ctx.skip_verify.insert(vapor);

        ctx.staged_events
            .push(EventPayload::Vaporization(VaporizationEvent {
                solid_account: solid,
                vapor_account: vapor,
                owed_market,
                owed_wei_repaid: repaid,
                drawn_from_excess: drawn,
            }));
        if written_off.is_positive() {
            ctx.staged_events
                .push(EventPayload::ShortfallWrittenOff(ShortfallEvent {
                    market: owed_market,
                    account: vapor,
                    written_off_wei: written_off,
                }));
        }
        Ok(())
    }

    /// Composite spread: the base liquidation spread amplified by both
    /// markets' spread premiums.
    fn liquidation_spread(
        &self,
        ctx: &ExecutionContext,
        held_market: MarketId,
        owed_market: MarketId,
    ) -> Result<Decimal, LedgerError> {
        let held_premium = ctx.market(held_market)?.config.spread_premium;
        let owed_premium = ctx.market(owed_market)?.config.spread_premium;
        Ok(self.risk.liquidation_spread
            * (Decimal::ONE + held_premium)
            * (Decimal::ONE + owed_premium))
    }

    fn last_liquidation_outcome(&self) -> Result<LiquidationOutcome, LedgerError> {
        for event in self.events.iter().rev() {
            if let EventPayload::Liquidation(liq) = &event.payload {
                return Ok(LiquidationOutcome {
                    owed_wei_repaid: liq.owed_wei_repaid,
                    held_wei_seized: liq.held_wei_seized,
                    expiry_triggered: liq.expiry_triggered,
                });
            }
        }
        Err(LedgerError::EmptyOperation)
    }

    fn last_vaporization_outcome(&self) -> Result<VaporizationOutcome, LedgerError> {
        for event in self.events.iter().rev() {
            if let EventPayload::Vaporization(vap) = &event.payload {
                let written_off = vap.owed_wei_repaid.sub(vap.drawn_from_excess);
                return Ok(VaporizationOutcome {
                    owed_wei_repaid: vap.owed_wei_repaid,
                    drawn_from_excess: vap.drawn_from_excess,
                    written_off,
                });
            }
        }
        Err(LedgerError::EmptyOperation)
    }
}
