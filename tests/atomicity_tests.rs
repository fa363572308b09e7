//! Batch atomicity tests.
//!
//! A batch either fully applies or leaves the ledger exactly as it was:
//! balances, market totals, expiry records, and the audit stream (bar the
//! abort record) must all be untouched by a failed batch.

use margin_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const USDC: MarketId = MarketId(0);
const WETH: MarketId = MarketId(1);

fn acct(owner: u64, number: u32) -> AccountId {
    AccountId::new(Address(owner), number)
}

fn deposit(account: AccountId, market: MarketId, wei: Decimal) -> Action {
    Action::Deposit {
        account,
        market,
        from: account.owner,
        amount: AssetAmount::wei_delta(wei),
    }
}

fn withdraw(account: AccountId, market: MarketId, wei: Decimal) -> Action {
    Action::Withdraw {
        account,
        market,
        to: account.owner,
        amount: AssetAmount::wei_delta(wei),
    }
}

fn setup() -> Ledger {
    let oracle = SharedOracle::new();
    oracle.set_price(USDC, dec!(1));
    oracle.set_price(WETH, dec!(2000));
    let mut ledger = Ledger::new(
        LedgerConfig::default(),
        RiskConfig::default(),
        Box::new(oracle),
    );
    ledger
        .add_market(MarketConfig::standard("USDC"), Box::new(FixedRateModel::zero()))
        .unwrap();
    ledger
        .add_market(MarketConfig::standard("WETH"), Box::new(FixedRateModel::zero()))
        .unwrap();
    ledger
}

/// Balances and totals for later comparison.
fn snapshot(ledger: &Ledger, accounts: &[AccountId]) -> Vec<(Decimal, Decimal, Decimal, Decimal)> {
    accounts
        .iter()
        .map(|a| {
            (
                ledger.get_par(*a, USDC).value(),
                ledger.get_par(*a, WETH).value(),
                ledger.get_market(USDC).unwrap().total_supply_par,
                ledger.get_market(WETH).unwrap().total_borrow_par,
            )
        })
        .collect()
}

#[test]
fn failing_third_action_reverts_the_first_two() {
    let mut ledger = setup();
    let a = acct(1, 0);

    ledger
        .execute_operation(a.owner, &[deposit(a, USDC, dec!(5000))], BalanceCheckFlag::Both)
        .unwrap();
    let before = snapshot(&ledger, &[a]);

    // first two actions are fine in isolation; the third violates solvency
    let result = ledger.execute_operation(
        a.owner,
        &[
            deposit(a, USDC, dec!(1000)),
            withdraw(a, WETH, dec!(-1)),
            withdraw(a, WETH, dec!(-100)),
        ],
        BalanceCheckFlag::Both,
    );
    assert!(matches!(result, Err(LedgerError::Undercollateralized { .. })));

    assert_eq!(snapshot(&ledger, &[a]), before);
}

#[test]
fn failed_batch_does_not_touch_other_accounts() {
    let mut ledger = setup();
    let a = acct(1, 0);
    let b = acct(2, 0);

    ledger
        .execute_operation(a.owner, &[deposit(a, USDC, dec!(1000))], BalanceCheckFlag::Both)
        .unwrap();
    ledger
        .execute_operation(b.owner, &[deposit(b, USDC, dec!(2000))], BalanceCheckFlag::Both)
        .unwrap();
    let before = snapshot(&ledger, &[a, b]);

    // transfer applies, then the borrow fails verification
    let result = ledger.execute_operation(
        a.owner,
        &[
            Action::Transfer {
                from_account: a,
                to_account: b,
                market: USDC,
                amount: AssetAmount::wei_delta(dec!(-500)),
            },
            withdraw(a, WETH, dec!(-50)),
        ],
        BalanceCheckFlag::Both,
    );
    assert!(result.is_err());
    assert_eq!(snapshot(&ledger, &[a, b]), before);
}

#[test]
fn failed_swap_reverts_every_hop() {
    let mut ledger = setup();
    let a = acct(1, 0);
    let amm = Address(100);
    let broken = Address(101);

    ledger.register_trader(
        amm,
        Box::new(ConstantRateTrader::new(amm).with_rate(USDC, WETH, dec!(0.0005))),
    );
    ledger.register_trader(broken, Box::new(FailingTrader { id: broken }));

    ledger
        .execute_operation(a.owner, &[deposit(a, USDC, dec!(10000))], BalanceCheckFlag::Both)
        .unwrap();
    let before = snapshot(&ledger, &[a]);

    // first hop prices fine, second hop's trader refuses
    let result = ledger.swap_exact_input_for_output(
        a.owner,
        a,
        &[USDC, WETH, USDC],
        AssetAmount::wei_delta(dec!(-10000)),
        dec!(0),
        &[TraderParam::external(amm), TraderParam::external(broken)],
        &[],
        UserConfig::default(),
    );
    assert!(matches!(result, Err(LedgerError::Trader(_))));
    assert_eq!(snapshot(&ledger, &[a]), before);
}

#[test]
fn slippage_failure_reverts_realized_hops() {
    let mut ledger = setup();
    let a = acct(1, 0);
    let amm = Address(100);

    ledger.register_trader(
        amm,
        Box::new(ConstantRateTrader::new(amm).with_rate(USDC, WETH, dec!(0.0005))),
    );
    ledger
        .execute_operation(a.owner, &[deposit(a, USDC, dec!(10000))], BalanceCheckFlag::Both)
        .unwrap();
    let before = snapshot(&ledger, &[a]);

    // 10000 USDC yields 5 WETH; demand 6
    let result = ledger.swap_exact_input_for_output(
        a.owner,
        a,
        &[USDC, WETH],
        AssetAmount::wei_delta(dec!(-10000)),
        dec!(6),
        &[TraderParam::external(amm)],
        &[],
        UserConfig::default(),
    );
    assert!(matches!(result, Err(LedgerError::SlippageExceeded { .. })));
    assert_eq!(snapshot(&ledger, &[a]), before);
}

#[test]
fn aborted_batch_adds_only_the_abort_event() {
    let mut ledger = setup();
    let a = acct(1, 0);
    let events_before = ledger.events().len();

    let _ = ledger.execute_operation(
        a.owner,
        &[
            deposit(a, USDC, dec!(100)),
            withdraw(a, WETH, dec!(-100)),
        ],
        BalanceCheckFlag::Both,
    );

    let new = &ledger.events()[events_before..];
    assert_eq!(new.len(), 1);
    assert!(matches!(new[0].payload, EventPayload::OperationAborted(_)));
}

#[test]
fn failed_batch_leaves_expiry_table_alone() {
    let mut ledger = setup();
    let a = acct(1, 0);

    ledger
        .execute_operation(
            a.owner,
            &[
                deposit(a, USDC, dec!(5000)),
                withdraw(a, WETH, dec!(-1)),
                Action::Call {
                    account: a,
                    callee: Address(0),
                    data: CallData::SetExpiry {
                        market: WETH,
                        expiry: Some(Timestamp::from_millis(60_000)),
                    },
                },
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    assert!(ledger.expiry_of(a, WETH).is_some());

    // the failing batch tries to clear the expiry first
    let result = ledger.execute_operation(
        a.owner,
        &[
            Action::Call {
                account: a,
                callee: Address(0),
                data: CallData::SetExpiry {
                    market: WETH,
                    expiry: None,
                },
            },
            withdraw(a, WETH, dec!(-100)),
        ],
        BalanceCheckFlag::Both,
    );
    assert!(result.is_err());
    assert_eq!(ledger.expiry_of(a, WETH), Some(Timestamp::from_millis(60_000)));
}

proptest! {
    /// A batch whose final action always fails leaves the account exactly as
    /// it started, whatever the earlier actions did.
    #[test]
    fn poisoned_batch_is_a_no_op(
        seed in 100i64..10_000i64,
        steps in proptest::collection::vec((0usize..3, 1i64..500i64), 1..8),
    ) {
        let mut ledger = setup();
        let a = acct(1, 0);
        let b = acct(1, 1);

        ledger.execute_operation(
            a.owner,
            &[deposit(a, USDC, Decimal::from(seed))],
            BalanceCheckFlag::Both,
        ).unwrap();
        let before = snapshot(&ledger, &[a, b]);

        let mut actions: Vec<Action> = steps.iter().map(|&(kind, amount)| {
            let amount = Decimal::from(amount);
            match kind {
                0 => deposit(a, USDC, amount),
                1 => withdraw(a, USDC, -amount),
                _ => Action::Transfer {
                    from_account: a,
                    to_account: b,
                    market: USDC,
                    amount: AssetAmount::wei_delta(-amount),
                },
            }
        }).collect();
        // guaranteed failure: a deposit that removes funds
        actions.push(Action::Deposit {
            account: a,
            market: USDC,
            from: a.owner,
            amount: AssetAmount::wei_delta(dec!(-1)),
        });

        let result = ledger.execute_operation(a.owner, &actions, BalanceCheckFlag::Both);
        prop_assert!(result.is_err());
        prop_assert_eq!(snapshot(&ledger, &[a, b]), before);
    }
}
