// 11.0: every committed state change produces an event. used for audit trails,
// state reconstruction, and notifying external systems. the EventPayload enum
// lists all event types. aborted batches emit nothing but the abort record.

use crate::types::{AccountId, Address, MarketId, Par, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Registry events
    MarketAdded(MarketAddedEvent),
    MarketRecycled(MarketRecycledEvent),
    IndexUpdated(IndexUpdatedEvent),

    // Balance events
    Deposit(BalanceChangeEvent),
    Withdrawal(BalanceChangeEvent),
    Transfer(TransferEvent),
    Trade(TradeEvent),

    // Risk events
    Liquidation(LiquidationEvent),
    Vaporization(VaporizationEvent),
    ShortfallWrittenOff(ShortfallEvent),
    ExpirySet(ExpirySetEvent),

    // Batch events
    OperationCommitted(OperationCommittedEvent),
    OperationAborted(OperationAbortedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAddedEvent {
    pub market: MarketId,
    pub token: String,
    pub is_isolation_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecycledEvent {
    pub market: MarketId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexUpdatedEvent {
    pub market: MarketId,
    pub borrow_index: Decimal,
    pub supply_index: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChangeEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub wei_delta: Wei,
    pub new_par: Par,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub market: MarketId,
    pub wei_moved: Wei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub taker_account: AccountId,
    pub maker_account: AccountId,
    pub input_market: MarketId,
    pub output_market: MarketId,
    pub trader: Address,
    pub input_wei: Wei,
    pub output_wei: Wei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub solid_account: AccountId,
    pub liquid_account: AccountId,
    pub owed_market: MarketId,
    pub held_market: MarketId,
    pub owed_wei_repaid: Wei,
    pub held_wei_seized: Wei,
    /// spread actually applied; zero when the liquidation was expiry-triggered
    pub spread: Decimal,
    pub expiry_triggered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaporizationEvent {
    pub solid_account: AccountId,
    pub vapor_account: AccountId,
    pub owed_market: MarketId,
    pub owed_wei_repaid: Wei,
    pub drawn_from_excess: Wei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortfallEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub written_off_wei: Wei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySetEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub expiry: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationCommittedEvent {
    pub sender: Address,
    pub actions: usize,
    pub accounts_verified: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationAbortedEvent {
    pub sender: Address,
    pub reason: String,
}
