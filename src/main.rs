//! Margin Ledger Core Simulation.
//!
//! Demonstrates the full lending-ledger lifecycle including interest accrual,
//! atomic action batches, multi-hop routed swaps, isolation-mode wrapping, and
//! the liquidation/vaporization paths.

use margin_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const USDC: MarketId = MarketId(0);
const WETH: MarketId = MarketId(1);
const WBTC: MarketId = MarketId(2);

fn main() {
    println!("Margin Ledger Core Simulation");
    println!("Cross-Collateral Lending, Atomic Batches, Full Lifecycle\n");

    scenario_1_lend_and_borrow();
    scenario_2_atomic_rollback();
    scenario_3_routed_swap();
    scenario_4_isolation_mode();
    scenario_5_liquidation();
    scenario_6_expiry_liquidation();
    scenario_7_vaporization();

    println!("\nAll simulations completed successfully.");
}

fn setup() -> (Ledger, SharedOracle) {
    let oracle = SharedOracle::new();
    oracle.set_price(USDC, dec!(1));
    oracle.set_price(WETH, dec!(2000));
    oracle.set_price(WBTC, dec!(60000));

    let mut ledger = Ledger::new(
        LedgerConfig::default(),
        RiskConfig::default(),
        Box::new(oracle.clone()),
    );
    ledger
        .add_market(MarketConfig::standard("USDC"), Box::new(KinkedRateModel::default()))
        .unwrap();
    ledger
        .add_market(MarketConfig::standard("WETH"), Box::new(KinkedRateModel::default()))
        .unwrap();
    ledger
        .add_market(MarketConfig::standard("WBTC"), Box::new(KinkedRateModel::default()))
        .unwrap();
    (ledger, oracle)
}

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

/// Supply, borrow, and watch interest accrue.
fn scenario_1_lend_and_borrow() {
    println!("Scenario 1: Lend and Borrow\n");

    let (mut ledger, _oracle) = setup();
    let alice = acct(1, 0);
    let bob = acct(2, 0);

    ledger
        .execute_operation(alice.owner, &[deposit(alice, USDC, dec!(100000))], BalanceCheckFlag::Both)
        .unwrap();
    println!("  Alice supplies 100,000 USDC");

    ledger
        .execute_operation(
            bob.owner,
            &[
                deposit(bob, WETH, dec!(10)),
                withdraw(bob, USDC, dec!(-10000)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    println!("  Bob posts 10 WETH and borrows 10,000 USDC");

    let year_ms: i64 = 365 * 24 * 60 * 60 * 1000;
    ledger.advance_time(year_ms);
    ledger.accrue(USDC).unwrap();

    let bob_debt = ledger.get_wei(bob, USDC).unwrap();
    let alice_supply = ledger.get_wei(alice, USDC).unwrap();
    println!("  One year later:");
    println!("    Bob owes {} USDC", bob_debt.abs().round_dp(2));
    println!("    Alice holds {} USDC\n", alice_supply.value().round_dp(2));
}

/// A failing action aborts the whole batch.
fn scenario_2_atomic_rollback() {
    println!("Scenario 2: Atomic Rollback\n");

    let (mut ledger, _oracle) = setup();
    let alice = acct(1, 0);

    let result = ledger.execute_operation(
        alice.owner,
        &[
            deposit(alice, USDC, dec!(1000)),
            // uncollateralized borrow; verification must reject the batch
            withdraw(alice, WBTC, dec!(-1)),
        ],
        BalanceCheckFlag::Both,
    );

    match result {
        Err(err) => println!("  Batch rejected: {err}"),
        Ok(()) => unreachable!("undercollateralized batch must not commit"),
    }
    println!(
        "  Alice's USDC after rollback: {} (deposit did not survive)\n",
        ledger.get_par(alice, USDC).value()
    );
}

/// Multi-hop swap through external liquidity.
fn scenario_3_routed_swap() {
    println!("Scenario 3: Routed Multi-Hop Swap\n");

    let (mut ledger, _oracle) = setup();
    let alice = acct(1, 0);
    let amm = Address(100);

    ledger.register_trader(
        amm,
        Box::new(
            ConstantRateTrader::new(amm)
                .with_rate(USDC, WETH, dec!(0.0005))
                .with_rate(WETH, WBTC, dec!(0.033)),
        ),
    );

    ledger
        .execute_operation(alice.owner, &[deposit(alice, USDC, dec!(150000))], BalanceCheckFlag::Both)
        .unwrap();
    println!("  Alice deposits 150,000 USDC");

    let result = ledger
        .swap_exact_input_for_output(
            alice.owner,
            alice,
            &[USDC, WETH, WBTC],
            AssetAmount::wei_delta(dec!(-150000)),
            dec!(0),
            &[TraderParam::external(amm), TraderParam::external(amm)],
            &[],
            UserConfig::default(),
        )
        .unwrap();

    println!(
        "  USDC -> WETH -> WBTC across {} hops: spent {} USDC, booked {} WBTC\n",
        result.hops,
        result.input_wei.value(),
        ledger.get_par(alice, WBTC).value()
    );
}

/// Wrapping into an isolation-mode market through a trusted converter.
fn scenario_4_isolation_mode() {
    println!("Scenario 4: Isolation-Mode Wrapping\n");

    let (mut ledger, oracle) = setup();

    let iso = ledger
        .add_market(
            MarketConfig::isolation_mode("plvGLP"),
            Box::new(FixedRateModel::zero()),
        )
        .unwrap();
    oracle.set_price(iso, dec!(2000));
    let issuer = Address(50);
    let wrapper = Address(200);
    let rogue = Address(201);
    ledger.set_token_issuer(iso, issuer);
    ledger.set_trusted_converter(iso, issuer, wrapper, true).unwrap();

    ledger.register_trader(
        wrapper,
        Box::new(ConstantRateTrader::new(wrapper).with_rate(WETH, iso, dec!(1))),
    );
    ledger.register_trader(
        rogue,
        Box::new(ConstantRateTrader::new(rogue).with_rate(WETH, iso, dec!(1))),
    );

    let alice = acct(1, 0);
    ledger
        .execute_operation(alice.owner, &[deposit(alice, WETH, dec!(5))], BalanceCheckFlag::Both)
        .unwrap();

    let rejected = ledger.swap_exact_input_for_output(
        alice.owner,
        alice,
        &[WETH, iso],
        AssetAmount::wei_delta(dec!(-5)),
        dec!(0),
        &[TraderParam::wrapper(rogue)],
        &[],
        UserConfig::default(),
    );
    println!("  Untrusted converter: {}", rejected.unwrap_err());

    let result = ledger
        .swap_exact_input_for_output(
            alice.owner,
            alice,
            &[WETH, iso],
            AssetAmount::wei_delta(dec!(-5)),
            dec!(0),
            &[TraderParam::wrapper(wrapper)],
            &[],
            UserConfig::default(),
        )
        .unwrap();
    println!(
        "  Trusted wrapper: 5 WETH wrapped into {} isolation-mode tokens\n",
        result.output_wei.value()
    );
}

/// Undercollateralized account liquidated at the spread.
fn scenario_5_liquidation() {
    println!("Scenario 5: Liquidation\n");

    let (mut ledger, oracle) = setup();
    let liquidator = acct(9, 0);
    let borrower = acct(2, 0);

    ledger
        .execute_operation(
            borrower.owner,
            &[
                deposit(borrower, USDC, dec!(2300)),
                withdraw(borrower, WETH, dec!(-1)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    ledger
        .execute_operation(
            liquidator.owner,
            &[
                deposit(liquidator, USDC, dec!(10000)),
                deposit(liquidator, WETH, dec!(2)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    println!("  Borrower: 2,300 USDC collateral, 1 WETH borrowed @ $2,000");

    oracle.set_price(WETH, dec!(2100));
    println!("  WETH rises to $2,100; borrower is undercollateralized");

    let outcome = ledger
        .liquidate(
            liquidator.owner,
            liquidator,
            borrower,
            WETH,
            USDC,
            AssetAmount::zero_target(),
        )
        .unwrap();
    println!(
        "  Liquidated: {} WETH repaid, {} USDC seized (5% spread)\n",
        outcome.owed_wei_repaid.value(),
        outcome.held_wei_seized.value()
    );
}

/// Expired borrow liquidated with the spread waived.
fn scenario_6_expiry_liquidation() {
    println!("Scenario 6: Expiry-Triggered Liquidation\n");

    let (mut ledger, _oracle) = setup();
    let liquidator = acct(9, 0);
    let borrower = acct(2, 0);

    ledger
        .execute_operation(
            borrower.owner,
            &[
                deposit(borrower, USDC, dec!(5000)),
                withdraw(borrower, WETH, dec!(-1)),
                Action::Call {
                    account: borrower,
                    callee: Address(0),
                    data: CallData::SetExpiry {
                        market: WETH,
                        expiry: Some(Timestamp::from_millis(86_400_000)),
                    },
                },
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    ledger
        .execute_operation(
            liquidator.owner,
            &[
                deposit(liquidator, USDC, dec!(10000)),
                deposit(liquidator, WETH, dec!(2)),
            ],
            BalanceCheckFlag::Both,
        )
        .unwrap();
    println!("  Borrower's 1 WETH borrow expires in 24h; account stays healthy");

    ledger.advance_time(86_400_000);
    let outcome = ledger
        .liquidate(
            liquidator.owner,
            liquidator,
            borrower,
            WETH,
            USDC,
            AssetAmount::zero_target(),
        )
        .unwrap();
    println!(
        "  Past expiry: {} USDC seized to clear the WETH debt, spread waived: {}\n",
        outcome.held_wei_seized.value(),
        outcome.expiry_triggered
    );
}

/// Debt with no collateral behind it is cancelled against the excess pool.
fn scenario_7_vaporization() {
    println!("Scenario 7: Vaporization\n");

    let (mut ledger, _oracle) = setup();
    let supplier = acct(5, 0);
    let keeper = acct(9, 0);
    let ghost = acct(3, 0);

    ledger
        .execute_operation(supplier.owner, &[deposit(supplier, USDC, dec!(50000))], BalanceCheckFlag::Both)
        .unwrap();
    // simulate bad debt left behind by a liquidation that ran out of collateral
    ledger
        .execute_operation(ghost.owner, &[withdraw(ghost, USDC, dec!(-800))], BalanceCheckFlag::None)
        .unwrap();
    println!("  Ghost account owes 800 USDC with zero collateral");

    let excess = ledger.get_market(USDC).unwrap().excess_wei();
    println!("  USDC excess pool: {}", excess.value());

    let outcome = ledger
        .vaporize(
            keeper.owner,
            keeper,
            ghost,
            USDC,
            WETH,
            AssetAmount::zero_target(),
        )
        .unwrap();
    println!(
        "  Vaporized: {} repaid, {} drawn from excess, {} written off\n",
        outcome.owed_wei_repaid.value(),
        outcome.drawn_from_excess.value(),
        outcome.written_off.value()
    );
}
