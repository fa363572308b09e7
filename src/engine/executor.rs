//! Atomic action-batch execution.
//!
//! State machine per batch: Pending -> Applying -> Verifying -> Committed or
//! Aborted. All mutation happens on a staged copy of the accounts, markets and
//! expiry table; the copy is installed only after every action applied and
//! every touched primary account passed the solvency verifier. A failure at
//! any step drops the staged copy on the floor, so no partial effect can ever
//! survive. Events are staged the same way and only reach the audit stream on
//! commit.
//!
//! Re-entrancy: external collaborators (traders, call handlers) run inside the
//! commit phase and must not re-invoke the executor on the in-flight batch.
//! A single in-commit flag on the ledger enforces this; it is a correctness
//! invariant of the whole design, not an optimization.

use super::core::Ledger;
use super::results::LedgerError;
use crate::account::{Account, AccountError};
use crate::actions::{Action, AssetAmount, BalanceCheckFlag, CallData};
use crate::balance::{par_to_wei, resolve_amount, wei_to_par};
use crate::events::{
    BalanceChangeEvent, EventPayload, ExpirySetEvent, IndexUpdatedEvent,
    OperationAbortedEvent, OperationCommittedEvent, TradeEvent, TransferEvent,
};
use crate::expiry::ExpiryTable;
use crate::index::accrue_index;
use crate::market::{MarketError, MarketState};
use crate::traders::TradeContext;
use crate::types::{AccountId, Address, MarketId, Par, Timestamp, Wei};
use std::collections::{HashMap, HashSet};

/// How an account participated in the batch's fund movements. Decides which
/// accounts the balance-check flag scopes the collateralization check to.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct AccountRole {
    pub debited: bool,
    pub credited: bool,
}

/// Staged, copy-on-write view of everything a batch may mutate.
pub(super) struct ExecutionContext {
    pub accounts: HashMap<AccountId, Account>,
    pub markets: Vec<MarketState>,
    pub expiries: ExpiryTable,
    /// unique touched accounts in first-touch order
    pub touched: Vec<AccountId>,
    touched_set: HashSet<AccountId>,
    pub roles: HashMap<AccountId, AccountRole>,
    /// counterparties already checked by the liquidation engine
    pub skip_verify: HashSet<AccountId>,
    pub staged_events: Vec<EventPayload>,
}

impl ExecutionContext {
    pub fn touch(&mut self, account: AccountId) {
        if self.touched_set.insert(account) {
            self.touched.push(account);
        }
    }

    pub fn mark_debited(&mut self, account: AccountId) {
        self.roles.entry(account).or_default().debited = true;
    }

    pub fn mark_credited(&mut self, account: AccountId) {
        self.roles.entry(account).or_default().credited = true;
    }

    pub fn account_mut(&mut self, id: AccountId, now: Timestamp) -> &mut Account {
        self.accounts
            .entry(id)
            .or_insert_with(|| Account::new(id, now))
    }

    pub fn get_par(&self, account: AccountId, market: MarketId) -> Par {
        self.accounts
            .get(&account)
            .map(|a| a.get_par(market))
            .unwrap_or_else(Par::zero)
    }

    pub fn market(&self, id: MarketId) -> Result<&MarketState, LedgerError> {
        self.markets
            .get(id.0 as usize)
            .ok_or_else(|| MarketError::MarketNotFound(id).into())
    }

    pub fn market_mut(&mut self, id: MarketId) -> Result<&mut MarketState, LedgerError> {
        self.markets
            .get_mut(id.0 as usize)
            .ok_or_else(|| MarketError::MarketNotFound(id).into())
    }
}

impl Ledger {
    /// Execute an ordered action batch atomically. Either every action applies
    /// and every touched primary account passes verification, or nothing
    /// happens at all.
    pub fn execute_operation(
        &mut self,
        sender: Address,
        actions: &[Action],
        balance_check: BalanceCheckFlag,
    ) -> Result<(), LedgerError> {
        if self.in_commit {
            return Err(LedgerError::OperationInProgress);
        }
        self.in_commit = true;
        let result = self.execute_guarded(sender, actions, balance_check);
        self.in_commit = false;

        if let Err(err) = &result {
            self.emit_event(EventPayload::OperationAborted(OperationAbortedEvent {
                sender,
                reason: err.to_string(),
            }));
        }
        result
    }

    fn execute_guarded(
        &mut self,
        sender: Address,
        actions: &[Action],
        balance_check: BalanceCheckFlag,
    ) -> Result<(), LedgerError> {
        if actions.is_empty() {
            return Err(LedgerError::EmptyOperation);
        }
        let mut ctx = self.begin();
        for action in actions {
            self.apply_action(&mut ctx, sender, action)?;
        }
        let verified = self.verify_touched(&ctx, balance_check)?;
        self.commit(ctx, sender, actions.len(), verified);
        Ok(())
    }

    pub(super) fn begin(&self) -> ExecutionContext {
        ExecutionContext {
            accounts: self.accounts.clone(),
            markets: self.markets.clone(),
            expiries: self.expiries.clone(),
            touched: Vec::new(),
            touched_set: HashSet::new(),
            roles: HashMap::new(),
            skip_verify: HashSet::new(),
            staged_events: Vec::new(),
        }
    }

    pub(super) fn commit(
        &mut self,
        ctx: ExecutionContext,
        sender: Address,
        actions: usize,
        accounts_verified: usize,
    ) {
        self.accounts = ctx.accounts;
        self.markets = ctx.markets;
        self.expiries = ctx.expiries;
        for payload in ctx.staged_events {
            self.emit_event(payload);
        }
        self.emit_event(EventPayload::OperationCommitted(OperationCommittedEvent {
            sender,
            actions,
            accounts_verified,
        }));
    }

    /// Apply one action to the staged state. Returns the realized output for
    /// Trade actions so the router can chain hops.
    pub(super) fn apply_action(
        &self,
        ctx: &mut ExecutionContext,
        sender: Address,
        action: &Action,
    ) -> Result<Option<Wei>, LedgerError> {
        for market in action.touched_markets() {
            self.accrue_staged(ctx, market)?;
        }
        for account in action.primary_accounts() {
            self.check_auth(sender, account)?;
        }

        match action {
            Action::Deposit {
                account,
                market,
                from: _,
                amount,
            } => {
                let old_par = ctx.get_par(*account, *market);
                let index = ctx.market(*market)?.index;
                let resolved = resolve_amount(old_par, amount, &index);
                if resolved.wei_delta.is_negative() {
                    return Err(LedgerError::NegativeDeposit {
                        account: *account,
                        market: *market,
                        wei: resolved.wei_delta,
                    });
                }
                self.set_par_staged(ctx, *account, *market, resolved.new_par)?;
                ctx.market(*market)?.validate_supply_cap()?;
                ctx.mark_credited(*account);
                ctx.staged_events
                    .push(EventPayload::Deposit(BalanceChangeEvent {
                        account: *account,
                        market: *market,
                        wei_delta: resolved.wei_delta,
                        new_par: resolved.new_par,
                    }));
                Ok(None)
            }

            Action::Withdraw {
                account,
                market,
                to: _,
                amount,
            } => {
                let old_par = ctx.get_par(*account, *market);
                let index = ctx.market(*market)?.index;
                let resolved = resolve_amount(old_par, amount, &index);
                if resolved.wei_delta.is_positive() {
                    return Err(LedgerError::PositiveWithdrawal {
                        account: *account,
                        market: *market,
                        wei: resolved.wei_delta,
                    });
                }
                self.set_par_staged(ctx, *account, *market, resolved.new_par)?;
                ctx.mark_debited(*account);
                ctx.staged_events
                    .push(EventPayload::Withdrawal(BalanceChangeEvent {
                        account: *account,
                        market: *market,
                        wei_delta: resolved.wei_delta,
                        new_par: resolved.new_par,
                    }));
                Ok(None)
            }

            Action::Transfer {
                from_account,
                to_account,
                market,
                amount,
            } => {
                if from_account == to_account {
                    return Err(LedgerError::SelfTransfer {
                        account: *from_account,
                    });
                }
                let index = ctx.market(*market)?.index;
                let from_old = ctx.get_par(*from_account, *market);
                let resolved = resolve_amount(from_old, amount, &index);
                if resolved.wei_delta.is_zero() {
                    return Err(LedgerError::ZeroAmount);
                }
                // the receiving side gets the exact negation in wei
                let to_old_wei = par_to_wei(ctx.get_par(*to_account, *market), &index);
                let to_new_par = wei_to_par(to_old_wei.sub(resolved.wei_delta), &index);

                self.set_par_staged(ctx, *from_account, *market, resolved.new_par)?;
                self.set_par_staged(ctx, *to_account, *market, to_new_par)?;

                if resolved.wei_delta.is_negative() {
                    ctx.mark_debited(*from_account);
                    ctx.mark_credited(*to_account);
                } else {
                    ctx.mark_credited(*from_account);
                    ctx.mark_debited(*to_account);
                }
                ctx.staged_events
                    .push(EventPayload::Transfer(TransferEvent {
                        from_account: *from_account,
                        to_account: *to_account,
                        market: *market,
                        wei_moved: resolved.wei_delta.negate(),
                    }));
                Ok(None)
            }

            Action::Trade {
                taker_account,
                maker_account,
                input_market,
                output_market,
                trader,
                input_amount,
                data,
            } => self.apply_trade(
                ctx,
                sender,
                *taker_account,
                *maker_account,
                *input_market,
                *output_market,
                *trader,
                input_amount,
                data,
            ),

            Action::Liquidate {
                solid_account,
                liquid_account,
                owed_market,
                held_market,
                amount,
            } => {
                self.apply_liquidate(
                    ctx,
                    *solid_account,
                    *liquid_account,
                    *owed_market,
                    *held_market,
                    *amount,
                )?;
                Ok(None)
            }

            Action::Vaporize {
                solid_account,
                vapor_account,
                owed_market,
                held_market,
                amount,
            } => {
                self.apply_vaporize(
                    ctx,
                    *solid_account,
                    *vapor_account,
                    *owed_market,
                    *held_market,
                    *amount,
                )?;
                Ok(None)
            }

            Action::Call {
                account,
                callee,
                data,
            } => {
                ctx.touch(*account);
                match data {
                    CallData::SetExpiry { market, expiry } => {
                        ctx.expiries.set(*account, *market, *expiry);
                        // an expiry on a non-negative balance is stale on arrival
                        let par = ctx.get_par(*account, *market);
                        ctx.expiries.clear_if_stale(*account, *market, par);
                        ctx.staged_events
                            .push(EventPayload::ExpirySet(ExpirySetEvent {
                                account: *account,
                                market: *market,
                                expiry: *expiry,
                            }));
                    }
                    CallData::Raw(bytes) => {
                        let handler = self
                            .call_handlers
                            .get(callee)
                            .ok_or(LedgerError::CallHandlerMissing(*callee))?;
                        handler.handle_call(*account, bytes)?;
                    }
                }
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_trade(
        &self,
        ctx: &mut ExecutionContext,
        sender: Address,
        taker: AccountId,
        maker: AccountId,
        input_market: MarketId,
        output_market: MarketId,
        trader_id: Address,
        input_amount: &AssetAmount,
        data: &[u8],
    ) -> Result<Option<Wei>, LedgerError> {
        if input_market == output_market {
            return Err(LedgerError::SelfTrade {
                market: input_market,
            });
        }
        let trader = self
            .traders
            .get(&trader_id)
            .ok_or(LedgerError::TraderMissing(trader_id))?;
        // the maker's owner must have authorized either the trader or the sender
        if !self.operators.is_operator(trader_id, maker.owner)
            && !self.operators.is_operator(sender, maker.owner)
        {
            return Err(LedgerError::TraderNotAuthorized {
                trader: trader_id,
                maker,
            });
        }

        let input_index = ctx.market(input_market)?.index;
        let output_index = ctx.market(output_market)?.index;

        let taker_input_old = ctx.get_par(taker, input_market);
        let resolved = resolve_amount(taker_input_old, input_amount, &input_index);
        if !resolved.wei_delta.is_negative() {
            return Err(LedgerError::ZeroAmount);
        }
        let input_paid = resolved.wei_delta.negate();

        let trade_ctx = TradeContext {
            input_market,
            output_market,
            maker_account: maker,
            taker_account: taker,
            input_wei: input_paid,
            data,
        };
        let output_wei = trader.trade(&trade_ctx)?;
        if !output_wei.is_positive() {
            return Err(LedgerError::TradeNoOp {
                maker,
                market: output_market,
            });
        }

        // maker receives input, gives output. the output balance must actually
        // move in the giving direction; a no-op or reversed trade is rejected
        let maker_input_old_wei = par_to_wei(ctx.get_par(maker, input_market), &input_index);
        let maker_input_new = wei_to_par(maker_input_old_wei.add(input_paid), &input_index);

        let maker_output_old = ctx.get_par(maker, output_market);
        let maker_output_old_wei = par_to_wei(maker_output_old, &output_index);
        let maker_output_new = wei_to_par(maker_output_old_wei.sub(output_wei), &output_index);
        if maker_output_new.value() >= maker_output_old.value() {
            return Err(LedgerError::TradeNoOp {
                maker,
                market: output_market,
            });
        }

        let taker_output_old_wei = par_to_wei(ctx.get_par(taker, output_market), &output_index);
        let taker_output_new = wei_to_par(taker_output_old_wei.add(output_wei), &output_index);

        self.set_par_staged(ctx, taker, input_market, resolved.new_par)?;
        self.set_par_staged(ctx, maker, input_market, maker_input_new)?;
        self.set_par_staged(ctx, maker, output_market, maker_output_new)?;
        self.set_par_staged(ctx, taker, output_market, taker_output_new)?;

        ctx.mark_debited(taker);
        ctx.mark_credited(taker);
        ctx.mark_debited(maker);
        ctx.mark_credited(maker);

        ctx.staged_events.push(EventPayload::Trade(TradeEvent {
            taker_account: taker,
            maker_account: maker,
            input_market,
            output_market,
            trader: trader_id,
            input_wei: input_paid,
            output_wei,
        }));
        Ok(Some(output_wei))
    }

    /// One balance write: flag checks, totals bookkeeping, sparse-set upkeep,
    /// stale-expiry cleanup, touched-set accounting.
    pub(super) fn set_par_staged(
        &self,
        ctx: &mut ExecutionContext,
        account: AccountId,
        market: MarketId,
        new_par: Par,
    ) -> Result<(), LedgerError> {
        let old_par = ctx.get_par(account, market);
        {
            let state = ctx.market_mut(market)?;
            state.validate_par_transition(old_par.value(), new_par.value())?;
            state.apply_par_transition(old_par.value(), new_par.value())?;
        }
        let now = self.time();
        ctx.account_mut(account, now).set_par(market, new_par);
        ctx.expiries.clear_if_stale(account, market, new_par);
        ctx.touch(account);
        Ok(())
    }

    /// Direct two-sided balance change against an off-ledger converter:
    /// the taker's input leaves the ledger, the converted output enters.
    /// Used by the router for external-liquidity and wrap/unwrap hops.
    pub(super) fn apply_converter_swap(
        &self,
        ctx: &mut ExecutionContext,
        account: AccountId,
        input_market: MarketId,
        output_market: MarketId,
        input_wei: Wei,
        trader_id: Address,
        data: &[u8],
    ) -> Result<Wei, LedgerError> {
        let trader = self
            .traders
            .get(&trader_id)
            .ok_or(LedgerError::TraderMissing(trader_id))?;

        let trade_ctx = TradeContext {
            input_market,
            output_market,
            maker_account: account,
            taker_account: account,
            input_wei,
            data,
        };
        let output_wei = trader.trade(&trade_ctx)?;
        if !output_wei.is_positive() {
            return Err(LedgerError::TradeNoOp {
                maker: account,
                market: output_market,
            });
        }

        let input_index = ctx.market(input_market)?.index;
        let output_index = ctx.market(output_market)?.index;

        let input_old_wei = par_to_wei(ctx.get_par(account, input_market), &input_index);
        let input_new = wei_to_par(input_old_wei.sub(input_wei), &input_index);
        let output_old_wei = par_to_wei(ctx.get_par(account, output_market), &output_index);
        let output_new = wei_to_par(output_old_wei.add(output_wei), &output_index);

        self.set_par_staged(ctx, account, input_market, input_new)?;
        self.set_par_staged(ctx, account, output_market, output_new)?;
        ctx.mark_debited(account);
        ctx.mark_credited(account);

        ctx.staged_events.push(EventPayload::Trade(TradeEvent {
            taker_account: account,
            maker_account: account,
            input_market,
            output_market,
            trader: trader_id,
            input_wei,
            output_wei,
        }));
        Ok(output_wei)
    }

    pub(super) fn accrue_staged(
        &self,
        ctx: &mut ExecutionContext,
        id: MarketId,
    ) -> Result<(), LedgerError> {
        let now = self.time();
        let (new_index, changed) = {
            let state = ctx.market(id)?;
            let model = self
                .rate_models
                .get(&id)
                .ok_or(MarketError::MarketNotFound(id))?;
            let borrow_wei = state.total_borrow_wei();
            let supply_wei = state.total_supply_wei();
            let rate = model.interest_rate(id, borrow_wei, supply_wei);
            let new_index = accrue_index(
                &state.index,
                now,
                rate,
                borrow_wei,
                supply_wei,
                self.risk().earnings_rate,
                self.risk().max_index,
            )?;
            let changed = new_index != state.index;
            (new_index, changed)
        };
        if changed {
            ctx.market_mut(id)?.index = new_index;
            ctx.staged_events
                .push(EventPayload::IndexUpdated(IndexUpdatedEvent {
                    market: id,
                    borrow_index: new_index.borrow,
                    supply_index: new_index.supply,
                }));
        }
        Ok(())
    }

    pub(super) fn check_auth(&self, sender: Address, account: AccountId) -> Result<(), LedgerError> {
        if self.operators.is_operator(sender, account.owner) {
            Ok(())
        } else {
            Err(AccountError::Unauthorized { sender, account }.into())
        }
    }
}
