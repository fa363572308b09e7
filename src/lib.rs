// margin-core: cross-collateral margin lending ledger.
// solvency-first architecture: every balance change passes deferred
// verification before it commits. all computation is deterministic with no
// external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, Address, AccountId, Par, Wei
//   2.x  index.rs: lazily-accrued borrow/supply interest indices
//   3.x  actions.rs: action batch vocabulary and amount forms
//   4.x  balance.rs: Par<->Wei conversion, protocol-favor rounding
//   5.x  expiry.rs: per-(account, market) borrow expiries
//   6.x  rates.rs: interest rate models (fixed, kinked)
//   7.x  config.rs: risk params and ledger knobs
//   8.x  engine/: core ledger: executor, verifier, router, liquidations
//   9.x  oracle.rs: price lookup boundary (test oracle included)
//   10.x account.rs: sparse balances + operator grants
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market config + runtime state and totals
//   13.x traders.rs: trade boundary, isolation-mode converter trust

// core ledger modules
pub mod account;
pub mod actions;
pub mod balance;
pub mod engine;
pub mod events;
pub mod expiry;
pub mod index;
pub mod market;
pub mod types;

// integration modules
pub mod config;
pub mod oracle;
pub mod rates;
pub mod traders;

// re exports for convenience
pub use account::*;
pub use actions::*;
pub use balance::*;
pub use engine::*;
pub use events::*;
pub use expiry::*;
pub use index::*;
pub use market::*;
pub use traders::*;
pub use types::*;
pub use config::{LedgerConfig, RiskConfig};
pub use oracle::{OracleError, PriceOracle, SharedOracle, TestOracle};
pub use rates::{FixedRateModel, InterestRateModel, KinkedRateModel};
