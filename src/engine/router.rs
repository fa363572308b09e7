// 8.5 engine/router.rs: generic multi-hop trade routing. A path of market ids
// is walked hop by hop, each hop priced by its own trader (external liquidity,
// peer-to-peer maker, or an isolation-mode wrap/unwrap converter), with each
// hop's realized output becoming the next hop's input. The whole path runs as
// one batch: staged state, deferred verification, full rollback on any hop
// failure.
//
// Isolation-mode rules are enforced here, not in the traders: an
// isolation-mode market is only entered through a wrapper and only left
// through an unwrapper, and either way the converter must be trusted by the
// market's token issuer. Validation failures carry the offending hop index.

use super::core::Ledger;
use super::executor::ExecutionContext;
use super::results::{LedgerError, SwapResult};
use crate::actions::{Action, AssetAmount, BalanceCheckFlag};
use crate::balance::resolve_amount;
use crate::events::{EventPayload, ExpirySetEvent};
use crate::traders::{TraderKind, TraderParam};
use crate::types::{AccountId, Address, MarketId, Timestamp, Wei};
use rust_decimal::Decimal;

/// Caller-side knobs for a routed swap.
#[derive(Debug, Clone, Copy)]
pub struct UserConfig {
    pub deadline: Option<Timestamp>,
    pub balance_check: BalanceCheckFlag,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            deadline: None,
            balance_check: BalanceCheckFlag::Both,
        }
    }
}

impl Ledger {
    /// Swap along `market_path`, spending from and receiving into `account`.
    /// `amount_in` is resolved against the account's balance in the first path
    /// market and must debit it; the realized final output must reach
    /// `min_output_wei`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_input_for_output(
        &mut self,
        sender: Address,
        account: AccountId,
        market_path: &[MarketId],
        amount_in: AssetAmount,
        min_output_wei: Decimal,
        traders: &[TraderParam],
        maker_accounts: &[AccountId],
        config: UserConfig,
    ) -> Result<SwapResult, LedgerError> {
        self.run_routed_batch(sender, config, |ledger, ctx| {
            let result = ledger.run_path(
                ctx,
                sender,
                account,
                market_path,
                &amount_in,
                min_output_wei,
                traders,
                maker_accounts,
            )?;
            let actions = result.hops;
            Ok((result, actions))
        })
    }

    /// Swap variant that first moves collateral between two account numbers of
    /// the same owner, runs the path against the destination account, and
    /// posts (or refreshes) an expiry on the borrowed path-input market.
    #[allow(clippy::too_many_arguments)]
    pub fn modify_position_with_swap(
        &mut self,
        sender: Address,
        owner: Address,
        from_number: u32,
        to_number: u32,
        collateral_market: MarketId,
        collateral_amount: AssetAmount,
        market_path: &[MarketId],
        amount_in: AssetAmount,
        min_output_wei: Decimal,
        traders: &[TraderParam],
        maker_accounts: &[AccountId],
        expiry: Option<Timestamp>,
        config: UserConfig,
    ) -> Result<SwapResult, LedgerError> {
        if from_number == to_number {
            return Err(LedgerError::SameAccountNumber {
                number: from_number,
            });
        }
        let from_account = AccountId::new(owner, from_number);
        let to_account = AccountId::new(owner, to_number);

        self.run_routed_batch(sender, config, |ledger, ctx| {
            ledger.apply_action(
                ctx,
                sender,
                &Action::Transfer {
                    from_account,
                    to_account,
                    market: collateral_market,
                    amount: collateral_amount,
                },
            )?;
            let result = ledger.run_path(
                ctx,
                sender,
                to_account,
                market_path,
                &amount_in,
                min_output_wei,
                traders,
                maker_accounts,
            )?;
            if expiry.is_some() {
                let market = market_path[0];
                ctx.expiries.set(to_account, market, expiry);
                let par = ctx.get_par(to_account, market);
                ctx.expiries.clear_if_stale(to_account, market, par);
                ctx.staged_events
                    .push(EventPayload::ExpirySet(ExpirySetEvent {
                        account: to_account,
                        market,
                        expiry,
                    }));
            }
            let actions = result.hops + 1;
            Ok((result, actions))
        })
    }

    /// Guard, stage, run, verify, commit. Mirrors `execute_operation` but for
    /// closure-driven batches.
    fn run_routed_batch<F>(
        &mut self,
        sender: Address,
        config: UserConfig,
        body: F,
    ) -> Result<SwapResult, LedgerError>
    where
        F: FnOnce(&Ledger, &mut ExecutionContext) -> Result<(SwapResult, usize), LedgerError>,
    {
        if self.in_commit {
            return Err(LedgerError::OperationInProgress);
        }
        self.in_commit = true;
        let result = (|| {
            if let Some(deadline) = config.deadline {
                let now = self.time();
                if now >= deadline {
                    return Err(LedgerError::DeadlineExpired { deadline, now });
                }
            }
            let mut ctx = self.begin();
            let (swap, actions) = body(self, &mut ctx)?;
            let verified = self.verify_touched(&ctx, config.balance_check)?;
            self.commit(ctx, sender, actions, verified);
            Ok(swap)
        })();
        self.in_commit = false;

        if let Err(err) = &result {
            self.emit_event(EventPayload::OperationAborted(
                crate::events::OperationAbortedEvent {
                    sender,
                    reason: err.to_string(),
                },
            ));
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_path(
        &self,
        ctx: &mut ExecutionContext,
        sender: Address,
        account: AccountId,
        market_path: &[MarketId],
        amount_in: &AssetAmount,
        min_output_wei: Decimal,
        traders: &[TraderParam],
        maker_accounts: &[AccountId],
    ) -> Result<SwapResult, LedgerError> {
        self.validate_path(ctx, market_path, traders, maker_accounts)?;
        self.check_auth(sender, account)?;

        for market in market_path {
            self.accrue_staged(ctx, *market)?;
        }

        // resolve the path input once, against the post-accrual index
        let first = market_path[0];
        let index = ctx.market(first)?.index;
        let old_par = ctx.get_par(account, first);
        let resolved = resolve_amount(old_par, amount_in, &index);
        if !resolved.wei_delta.is_negative() {
            return Err(LedgerError::ZeroAmount);
        }
        let input_wei = resolved.wei_delta.negate();

        let mut hop_input = input_wei;
        let mut output = Wei::zero();
        for (hop, param) in traders.iter().enumerate() {
            let input_market = market_path[hop];
            let output_market = market_path[hop + 1];
            output = match param.kind {
                TraderKind::InternalLiquidity => {
                    let maker = maker_accounts[param.maker_account_index];
                    let realized = self.apply_action(
                        ctx,
                        sender,
                        &Action::Trade {
                            taker_account: account,
                            maker_account: maker,
                            input_market,
                            output_market,
                            trader: param.converter,
                            input_amount: AssetAmount::wei_delta(-hop_input.value()),
                            data: param.data.clone(),
                        },
                    )?;
                    // a Trade action always reports its realized output
                    realized.ok_or(LedgerError::TradeNoOp {
                        maker,
                        market: output_market,
                    })?
                }
                TraderKind::ExternalLiquidity
                | TraderKind::IsolationModeWrapper
                | TraderKind::IsolationModeUnwrapper => self.apply_converter_swap(
                    ctx,
                    account,
                    input_market,
                    output_market,
                    hop_input,
                    param.converter,
                    &param.data,
                )?,
            };
            hop_input = output;
        }

        if output.value() < min_output_wei {
            return Err(LedgerError::SlippageExceeded {
                minimum: min_output_wei,
                actual: output.value(),
            });
        }

        Ok(SwapResult {
            input_wei,
            output_wei: output,
            hops: traders.len(),
        })
    }

    /// Structural and isolation-mode validation. All failures name the hop.
    fn validate_path(
        &self,
        ctx: &ExecutionContext,
        market_path: &[MarketId],
        traders: &[TraderParam],
        maker_accounts: &[AccountId],
    ) -> Result<(), LedgerError> {
        if market_path.len() < 2 {
            return Err(LedgerError::PathTooShort {
                len: market_path.len(),
            });
        }
        if traders.len() != market_path.len() - 1 {
            return Err(LedgerError::PathTraderMismatch {
                markets: market_path.len(),
                expected: market_path.len() - 1,
                actual: traders.len(),
            });
        }
        for (hop, window) in market_path.windows(2).enumerate() {
            if window[0] == window[1] {
                return Err(LedgerError::PathRepeatsMarket {
                    hop,
                    market: window[1],
                });
            }
        }

        for (hop, param) in traders.iter().enumerate() {
            let input_market = market_path[hop];
            let output_market = market_path[hop + 1];
            let input_isolated = ctx.market(input_market)?.config.is_isolation_mode;
            let output_isolated = ctx.market(output_market)?.config.is_isolation_mode;

            match (input_isolated, output_isolated) {
                (false, false) => {
                    if param.is_isolation_kind() {
                        return Err(LedgerError::WrongTraderKind {
                            hop,
                            market: input_market,
                        });
                    }
                }
                // entering an isolation-mode market: wrapper only, and the
                // wrapper must be trusted by that market's issuer
                (false, true) => {
                    if param.kind != TraderKind::IsolationModeWrapper {
                        return Err(LedgerError::WrongTraderKind {
                            hop,
                            market: output_market,
                        });
                    }
                    if !self.converters.is_trusted(output_market, param.converter) {
                        return Err(LedgerError::UntrustedConverter {
                            hop,
                            market: output_market,
                            converter: param.converter,
                        });
                    }
                }
                // leaving one: unwrapper only, trusted for the input market
                (true, false) => {
                    if param.kind != TraderKind::IsolationModeUnwrapper {
                        return Err(LedgerError::WrongTraderKind {
                            hop,
                            market: input_market,
                        });
                    }
                    if !self.converters.is_trusted(input_market, param.converter) {
                        return Err(LedgerError::UntrustedConverter {
                            hop,
                            market: input_market,
                            converter: param.converter,
                        });
                    }
                }
                // no single trader can wrap and unwrap in one hop
                (true, true) => {
                    return Err(LedgerError::WrongTraderKind {
                        hop,
                        market: input_market,
                    });
                }
            }

            if param.kind == TraderKind::InternalLiquidity
                && param.maker_account_index >= maker_accounts.len()
            {
                return Err(LedgerError::MakerIndexOutOfBounds {
                    hop,
                    index: param.maker_account_index,
                    len: maker_accounts.len(),
                });
            }
        }
        Ok(())
    }
}
