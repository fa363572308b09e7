// 7.0 config.rs: all settings in one place. global risk params and engine knobs.
// 7.1 RiskConfig holds the protocol-wide solvency constants; per-market premiums
//     layer on top of these (see market.rs).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// Protocol-wide risk parameters read by the verifier and liquidation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    // Required collateralization: supply value must be >= borrow value * margin_ratio
    pub margin_ratio: Decimal,
    // Base liquidation discount handed to liquidators, before per-market spread premiums
    pub liquidation_spread: Decimal,
    // Fraction of paid borrow interest passed to suppliers (rest is protocol earnings)
    pub earnings_rate: Decimal,
    // Minimum quote value for any single borrowed market balance. blocks dust
    // positions that are uneconomical to liquidate
    pub min_borrowed_value: Decimal,
    // Hard cap on distinct non-zero market balances per account
    pub max_markets_with_balances: usize,
    // Accrual indices above this ceiling indicate a runaway rate; accrual aborts
    pub max_index: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            margin_ratio: dec!(1.15),        // 115% collateralization
            liquidation_spread: dec!(0.05),  // 5% seizure premium
            earnings_rate: dec!(0.90),       // suppliers keep 90% of interest
            min_borrowed_value: dec!(100),   // $100 floor per borrowed market
            max_markets_with_balances: 32,
            max_index: dec!(1e18),
        }
    }
}

/** 7.2: engine knobs. verbosity and event retention, nothing economic */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    // Print every emitted event to stdout
    pub verbose: bool,
    // Bound on the retained audit event ring
    pub max_events: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_events: 100_000,
        }
    }
}
