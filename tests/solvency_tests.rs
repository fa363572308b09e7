//! Solvency invariant tests.
//!
//! These tests verify the deferred verification pass: the collateralization
//! ratio, the non-zero-balance cap, the minimum borrow floor, and the
//! balance-check-flag scoping that narrows which accounts get checked.

use margin_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

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

/// Ledger with `n` unit-priced markets and zero interest.
fn ledger_with_n_markets(n: usize, risk: RiskConfig) -> Ledger {
    let oracle = SharedOracle::new();
    for i in 0..n {
        oracle.set_price(MarketId(i as u32), dec!(1));
    }
    let mut ledger = Ledger::new(LedgerConfig::default(), risk, Box::new(oracle));
    for i in 0..n {
        ledger
            .add_market(
                MarketConfig::standard(&format!("TOK{i}")),
                Box::new(FixedRateModel::zero()),
            )
            .unwrap();
    }
    ledger
}

#[test]
fn balance_cap_fails_exactly_on_the_thirty_third_market() {
    let mut ledger = ledger_with_n_markets(33, RiskConfig::default());
    let a = acct(1, 0);

    // 32 separate batches commit and persist
    for i in 0..32u32 {
        ledger
            .execute_operation(
                a.owner,
                &[deposit(a, MarketId(i), dec!(100))],
                BalanceCheckFlag::Both,
            )
            .unwrap();
    }
    assert_eq!(ledger.account_market_count(a), 32);

    // the 33rd distinct market breaks the cap
    let result = ledger.execute_operation(
        a.owner,
        &[deposit(a, MarketId(32), dec!(100))],
        BalanceCheckFlag::Both,
    );
    assert!(matches!(
        result,
        Err(LedgerError::TooManyBalances { count: 33, max: 32, .. })
    ));

    // earlier deposits survive untouched; the failed one does not
    assert_eq!(ledger.account_market_count(a), 32);
    for i in 0..32u32 {
        assert_eq!(ledger.get_par(a, MarketId(i)).value(), dec!(100));
    }
    assert!(ledger.get_par(a, MarketId(32)).is_zero());

    // topping up an existing balance is still fine at the cap
    ledger
        .execute_operation(
            a.owner,
            &[deposit(a, MarketId(0), dec!(50))],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    assert_eq!(ledger.get_par(a, MarketId(0)).value(), dec!(150));
}

#[test]
fn cap_violation_inside_one_batch_rolls_back_everything() {
    let mut ledger = ledger_with_n_markets(33, RiskConfig::default());
    let a = acct(1, 0);

    let actions: Vec<Action> = (0..33u32)
        .map(|i| deposit(a, MarketId(i), dec!(100)))
        .collect();
    let result = ledger.execute_operation(a.owner, &actions, BalanceCheckFlag::Both);
    assert!(matches!(result, Err(LedgerError::TooManyBalances { .. })));

    // no deposit from the batch survives
    assert_eq!(ledger.account_market_count(a), 0);
    for i in 0..33u32 {
        assert!(ledger.get_par(a, MarketId(i)).is_zero());
    }
}

#[test]
fn undercollateralized_batch_names_the_account() {
    let mut ledger = ledger_with_n_markets(2, RiskConfig::default());
    let a = acct(1, 0);

    // 100 collateral cannot carry a 100 borrow at ratio 1.15
    let result = ledger.execute_operation(
        a.owner,
        &[
            deposit(a, MarketId(0), dec!(100)),
            withdraw(a, MarketId(1), dec!(-100)),
        ],
        BalanceCheckFlag::Both,
    );
    match result {
        Err(LedgerError::Undercollateralized {
            account,
            supply_value,
            borrow_value,
            ..
        }) => {
            assert_eq!(account, a);
            assert_eq!(supply_value, dec!(100));
            assert_eq!(borrow_value, dec!(100));
        }
        other => panic!("expected Undercollateralized, got {other:?}"),
    }
}

#[test]
fn borrow_below_minimum_value_rejected() {
    let mut ledger = ledger_with_n_markets(2, RiskConfig::default());
    let a = acct(1, 0);

    // plenty of collateral, but the $50 borrow is under the $100 floor
    let result = ledger.execute_operation(
        a.owner,
        &[
            deposit(a, MarketId(0), dec!(10000)),
            withdraw(a, MarketId(1), dec!(-50)),
        ],
        BalanceCheckFlag::Both,
    );
    assert!(matches!(result, Err(LedgerError::BorrowTooSmall { .. })));

    // at the floor it passes
    ledger
        .execute_operation(
            a.owner,
            &[
                deposit(a, MarketId(0), dec!(10000)),
                withdraw(a, MarketId(1), dec!(-100)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
}

#[test]
fn check_flag_none_permits_negative_balance() {
    let mut ledger = ledger_with_n_markets(1, RiskConfig::default());
    let a = acct(1, 0);

    // rejected under the normal flag
    let result = ledger.execute_operation(
        a.owner,
        &[withdraw(a, MarketId(0), dec!(-500))],
        BalanceCheckFlag::Both,
    );
    assert!(matches!(result, Err(LedgerError::Undercollateralized { .. })));

    // the caller opted out: the negative balance persists
    ledger
        .execute_operation(
            a.owner,
            &[withdraw(a, MarketId(0), dec!(-500))],
            BalanceCheckFlag::None,
        )
        .unwrap();
    assert_eq!(ledger.get_par(a, MarketId(0)).value(), dec!(-500));
}

#[test]
fn check_flag_scopes_to_one_side_of_a_transfer() {
    let mut ledger = ledger_with_n_markets(1, RiskConfig::default());
    let a = acct(1, 0);
    let b = acct(1, 1);

    ledger
        .execute_operation(
            a.owner,
            &[deposit(a, MarketId(0), dec!(100))],
            BalanceCheckFlag::Both,
        )
        .unwrap();

    // moving 300 drives the source negative. checking only the receiving side
    // lets it through; checking the source rejects it.
    let transfer = Action::Transfer {
        from_account: a,
        to_account: b,
        market: MarketId(0),
        amount: AssetAmount::wei_delta(dec!(-300)),
    };

    let rejected =
        ledger.execute_operation(a.owner, &[transfer.clone()], BalanceCheckFlag::FromAccount);
    assert!(matches!(rejected, Err(LedgerError::Undercollateralized { .. })));
    assert_eq!(ledger.get_par(a, MarketId(0)).value(), dec!(100));

    ledger
        .execute_operation(a.owner, &[transfer], BalanceCheckFlag::ToAccount)
        .unwrap();
    assert_eq!(ledger.get_par(a, MarketId(0)).value(), dec!(-200));
    assert_eq!(ledger.get_par(b, MarketId(0)).value(), dec!(300));
}

#[test]
fn check_flag_never_waives_the_balance_cap() {
    let mut ledger = ledger_with_n_markets(33, RiskConfig::default());
    let a = acct(1, 0);

    let actions: Vec<Action> = (0..33u32)
        .map(|i| deposit(a, MarketId(i), dec!(100)))
        .collect();
    let result = ledger.execute_operation(a.owner, &actions, BalanceCheckFlag::None);
    assert!(matches!(result, Err(LedgerError::TooManyBalances { .. })));
}

#[test]
fn margin_premium_tightens_the_ratio() {
    let mut ledger = ledger_with_n_markets(2, RiskConfig::default());
    let a = acct(1, 0);

    // 10% premium on the borrowed market: 1000 borrow counts as 1100,
    // needing 1265 collateral at ratio 1.15
    ledger.set_margin_premium(MarketId(1), dec!(0.10)).unwrap();

    let result = ledger.execute_operation(
        a.owner,
        &[
            deposit(a, MarketId(0), dec!(1200)),
            withdraw(a, MarketId(1), dec!(-1000)),
        ],
        BalanceCheckFlag::Both,
    );
    assert!(matches!(result, Err(LedgerError::Undercollateralized { .. })));

    ledger
        .execute_operation(
            a.owner,
            &[
                deposit(a, MarketId(0), dec!(1265)),
                withdraw(a, MarketId(1), dec!(-1000)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
}

#[test]
fn liquidation_at_zero_spread_seizes_by_price_ratio() {
    // owed market X at $1, held market Y at $1.74, no spread at all
    let oracle = SharedOracle::new();
    oracle.set_price(MarketId(0), dec!(1));
    oracle.set_price(MarketId(1), dec!(1.74));
    let risk = RiskConfig {
        margin_ratio: dec!(2.0),
        liquidation_spread: Decimal::ZERO,
        min_borrowed_value: Decimal::ZERO,
        ..RiskConfig::default()
    };
    let mut ledger = Ledger::new(LedgerConfig::default(), risk, Box::new(oracle));
    ledger
        .add_market(MarketConfig::standard("X"), Box::new(FixedRateModel::zero()))
        .unwrap();
    ledger
        .add_market(MarketConfig::standard("Y"), Box::new(FixedRateModel::zero()))
        .unwrap();

    let liquid = acct(2, 0);
    let solid = acct(9, 0);

    // held 100 Y ($174) against owed 100 X ($100): under ratio 2.0 the
    // account is liquidatable
    ledger
        .execute_operation(
            liquid.owner,
            &[
                deposit(liquid, MarketId(1), dec!(100)),
                withdraw(liquid, MarketId(0), dec!(-100)),
            ],
            BalanceCheckFlag::None,
        )
        .unwrap();
    ledger
        .execute_operation(
            solid.owner,
            &[deposit(solid, MarketId(0), dec!(1000))],
            BalanceCheckFlag::Both,
        )
        .unwrap();

    let outcome = ledger
        .liquidate(
            solid.owner,
            solid,
            liquid,
            MarketId(0),
            MarketId(1),
            AssetAmount::zero_target(),
        )
        .unwrap();

    // 100 X-value seized from Y: 100 / 1.74 = 57.47... wei of Y
    assert_eq!(outcome.owed_wei_repaid.value(), dec!(100));
    assert!(outcome.held_wei_seized.value() > dec!(57.47));
    assert!(outcome.held_wei_seized.value() < dec!(57.48));

    // debt cleared; Y reduced by 100/1.74, floored against the account
    assert!(ledger.get_par(liquid, MarketId(0)).is_zero());
    assert_eq!(ledger.get_par(liquid, MarketId(1)).value(), dec!(42));
    assert_eq!(ledger.get_par(solid, MarketId(0)).value(), dec!(900));
    assert_eq!(ledger.get_par(solid, MarketId(1)).value(), dec!(57));
}

#[test]
fn capped_liquidation_may_leave_dust_debt_for_vaporization() {
    // both markets at $1, default risk: 5% spread, $100 borrow floor
    let mut ledger = ledger_with_n_markets(2, RiskConfig::default());
    let liquid = acct(2, 0);
    let solid = acct(9, 0);

    // deeply underwater: 60 Y held against 150 X owed
    ledger
        .execute_operation(
            liquid.owner,
            &[
                deposit(liquid, MarketId(1), dec!(60)),
                withdraw(liquid, MarketId(0), dec!(-150)),
            ],
            BalanceCheckFlag::None,
        )
        .unwrap();
    ledger
        .execute_operation(
            solid.owner,
            &[deposit(solid, MarketId(0), dec!(1000))],
            BalanceCheckFlag::Both,
        )
        .unwrap();

    // a full repay would seize 157.5, so the seizure caps at the 60 held and
    // the repaid amount scales down to 60 / 1.05. The residual debt is worth
    // $93, under the $100 floor; the counterparty is exempt from the floor, so
    // the batch still commits.
    let outcome = ledger
        .liquidate(
            solid.owner,
            solid,
            liquid,
            MarketId(0),
            MarketId(1),
            AssetAmount::zero_target(),
        )
        .unwrap();
    assert_eq!(outcome.held_wei_seized.value(), dec!(60));

    assert_eq!(ledger.get_par(liquid, MarketId(0)).value(), dec!(-93));
    assert!(ledger.get_par(liquid, MarketId(1)).is_zero());
    assert_eq!(ledger.get_par(solid, MarketId(1)).value(), dec!(60));

    // the stranded debt clears through vaporization against the excess pool
    let vapor = ledger
        .vaporize(
            solid.owner,
            solid,
            liquid,
            MarketId(0),
            MarketId(1),
            AssetAmount::zero_target(),
        )
        .unwrap();
    assert_eq!(vapor.owed_wei_repaid.value(), dec!(93));
    assert!(vapor.written_off.is_zero());
    assert!(ledger.get_par(liquid, MarketId(0)).is_zero());
}

proptest! {
    /// Any batch the ledger commits under the full check leaves every touched
    /// account collateralized.
    #[test]
    fn committed_batches_leave_accounts_collateralized(
        collateral in 100i64..100_000i64,
        borrow in 1i64..10_000i64,
    ) {
        let mut ledger = ledger_with_n_markets(2, RiskConfig {
            min_borrowed_value: Decimal::ZERO,
            ..RiskConfig::default()
        });
        let a = acct(1, 0);

        let result = ledger.execute_operation(
            a.owner,
            &[
                deposit(a, MarketId(0), Decimal::from(collateral)),
                withdraw(a, MarketId(1), Decimal::from(-borrow)),
            ],
            BalanceCheckFlag::Both,
        );

        if result.is_ok() {
            prop_assert!(ledger.is_collateralized(a).unwrap());
        } else {
            // rejected batches leave no trace
            prop_assert_eq!(ledger.account_market_count(a), 0);
        }
    }
}
