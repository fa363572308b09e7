// 8.0 engine/: the ledger core. core.rs owns state and registries, executor.rs
// runs atomic action batches over a staged copy, verify.rs is the deferred
// solvency pass, router.rs walks multi-hop trade paths, liquidate.rs holds the
// forced-deleveraging arithmetic, results.rs the outcome types and error
// taxonomy.

mod core;
mod executor;
mod liquidate;
mod results;
mod router;
mod verify;

pub use core::{CallHandler, Ledger};
pub use results::{LedgerError, LiquidationOutcome, SwapResult, VaporizationOutcome};
pub use router::UserConfig;
pub use verify::AccountValues;
