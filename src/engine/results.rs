// 8.0.2: result types and the full error taxonomy for ledger operations.
//
// validation errors reject before any mutation; solvency errors reject at
// verification with the batch fully rolled back; permission errors reject at
// the point of use; arithmetic errors are fatal and never saturated. every
// variant names the offending account/market/hop so callers can reconstruct
// exactly what was rejected.

use crate::account::AccountError;
use crate::index::AccrualError;
use crate::market::MarketError;
use crate::oracle::OracleError;
use crate::traders::TraderError;
use crate::types::{AccountId, Address, MarketId, Timestamp, Wei};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct SwapResult {
    pub input_wei: Wei,
    pub output_wei: Wei,
    pub hops: usize,
}

#[derive(Debug, Clone)]
pub struct LiquidationOutcome {
    pub owed_wei_repaid: Wei,
    pub held_wei_seized: Wei,
    pub expiry_triggered: bool,
}

#[derive(Debug, Clone)]
pub struct VaporizationOutcome {
    pub owed_wei_repaid: Wei,
    pub drawn_from_excess: Wei,
    pub written_off: Wei,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    // ---- validation: rejected before any mutation ----
    #[error("Operation contains no actions")]
    EmptyOperation,

    #[error("Deadline {deadline:?} expired at {now:?}")]
    DeadlineExpired { deadline: Timestamp, now: Timestamp },

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Deposit into {account} market {market} must not remove funds (wei {wei})")]
    NegativeDeposit {
        account: AccountId,
        market: MarketId,
        wei: Wei,
    },

    #[error("Withdrawal from {account} market {market} must not add funds (wei {wei})")]
    PositiveWithdrawal {
        account: AccountId,
        market: MarketId,
        wei: Wei,
    },

    #[error("Transfer endpoints must differ ({account})")]
    SelfTransfer { account: AccountId },

    #[error("Trade input and output markets must differ ({market})")]
    SelfTrade { market: MarketId },

    #[error("Position transfer requires two distinct account numbers (got {number})")]
    SameAccountNumber { number: u32 },

    #[error("Market path needs at least two markets (got {len})")]
    PathTooShort { len: usize },

    #[error("Market path repeats {market} at hop {hop}")]
    PathRepeatsMarket { hop: usize, market: MarketId },

    #[error("Path of {markets} markets needs {expected} trader params (got {actual})")]
    PathTraderMismatch {
        markets: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Hop {hop}: trader kind not allowed for {market}")]
    WrongTraderKind { hop: usize, market: MarketId },

    #[error("Hop {hop}: converter {converter} is not trusted for isolation market {market}")]
    UntrustedConverter {
        hop: usize,
        market: MarketId,
        converter: Address,
    },

    #[error("Hop {hop}: maker account index {index} out of bounds (have {len})")]
    MakerIndexOutOfBounds {
        hop: usize,
        index: usize,
        len: usize,
    },

    #[error("Swap output {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: Decimal, actual: Decimal },

    #[error("Liquidation amount must move owed balance of {account} toward zero, not past it")]
    LiquidationAmountOutOfRange { account: AccountId },

    // ---- solvency: rejected at verification, batch rolled back ----
    #[error("Account {account} undercollateralized: supply value {supply_value} < borrow value {borrow_value} x ratio {required_ratio}")]
    Undercollateralized {
        account: AccountId,
        supply_value: Decimal,
        borrow_value: Decimal,
        required_ratio: Decimal,
    },

    #[error("Account {account} holds {count} non-zero balances, max is {max}")]
    TooManyBalances {
        account: AccountId,
        count: usize,
        max: usize,
    },

    #[error("Account {account} borrow in {market} worth {value} is below the {minimum} floor")]
    BorrowTooSmall {
        account: AccountId,
        market: MarketId,
        value: Decimal,
        minimum: Decimal,
    },

    #[error("Account {account} owed balance in {market} is not negative")]
    OwedBalanceNotNegative { account: AccountId, market: MarketId },

    #[error("Account {account} held balance in {market} is negative")]
    HeldBalanceNegative { account: AccountId, market: MarketId },

    #[error("Account {account} held balance in {market} must be zero to vaporize")]
    HeldBalanceNotZero { account: AccountId, market: MarketId },

    #[error("Account {account} is collateralized and not expired; nothing to liquidate")]
    AccountNotLiquidatable { account: AccountId },

    // ---- trade verification ----
    #[error("Trade against maker {maker} in {market} did not move the balance as required")]
    TradeNoOp { maker: AccountId, market: MarketId },

    // ---- permission: rejected at point of use ----
    #[error("Another operation is already in its commit phase")]
    OperationInProgress,

    #[error("Trader {trader} is not an authorized operator for maker {maker}")]
    TraderNotAuthorized { trader: Address, maker: AccountId },

    #[error("No trader registered at {0}")]
    TraderMissing(Address),

    #[error("No call handler registered at {0}")]
    CallHandlerMissing(Address),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Trader(#[from] TraderError),

    // ---- collaborator and arithmetic failures ----
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Accrual(#[from] AccrualError),
}

impl LedgerError {
    /// Rough taxonomy bucket, mostly for assertions and operator tooling.
    pub fn is_solvency(&self) -> bool {
        matches!(
            self,
            LedgerError::Undercollateralized { .. }
                | LedgerError::TooManyBalances { .. }
                | LedgerError::BorrowTooSmall { .. }
                | LedgerError::OwedBalanceNotNegative { .. }
                | LedgerError::HeldBalanceNegative { .. }
                | LedgerError::HeldBalanceNotZero { .. }
                | LedgerError::AccountNotLiquidatable { .. }
        )
    }

    pub fn is_permission(&self) -> bool {
        matches!(
            self,
            LedgerError::OperationInProgress
                | LedgerError::TraderNotAuthorized { .. }
                | LedgerError::Account(_)
                | LedgerError::Trader(TraderError::NotIssuer { .. })
        )
    }
}
