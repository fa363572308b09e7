// 8.1 engine/core.rs: main ledger struct. holds the market registry, all
// accounts, operator grants, the expiry table, and the collaborator seams
// (oracle, rate models, traders, call handlers). balance mutation only ever
// happens through the executor in executor.rs.

use super::results::LedgerError;
use crate::account::{Account, OperatorRegistry};
use crate::config::{LedgerConfig, RiskConfig};
use crate::events::{Event, EventId, EventPayload, IndexUpdatedEvent, MarketAddedEvent, MarketRecycledEvent};
use crate::expiry::ExpiryTable;
use crate::index::accrue_index;
use crate::market::{MarketConfig, MarketError, MarketState};
use crate::oracle::PriceOracle;
use crate::rates::InterestRateModel;
use crate::traders::{Trader, TraderError, TrustedConverterRegistry};
use crate::types::{AccountId, Address, MarketId, Par, Timestamp, Wei};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Handler for the raw Call action. Runs synchronously, sees the account it
/// was invoked for, and cannot touch balances.
pub trait CallHandler {
    fn handle_call(&self, account: AccountId, data: &[u8]) -> Result<(), LedgerError>;
}

pub struct Ledger {
    pub(super) config: LedgerConfig,
    pub(super) risk: RiskConfig,
    /// dense registry: MarketId(i) lives at index i, never removed
    pub(super) markets: Vec<MarketState>,
    pub(super) token_index: HashMap<String, MarketId>,
    pub(super) accounts: HashMap<AccountId, Account>,
    pub(super) operators: OperatorRegistry,
    pub(super) expiries: ExpiryTable,
    pub(super) converters: TrustedConverterRegistry,
    pub(super) oracle: Box<dyn PriceOracle>,
    pub(super) rate_models: HashMap<MarketId, Box<dyn InterestRateModel>>,
    pub(super) traders: HashMap<Address, Box<dyn Trader>>,
    pub(super) call_handlers: HashMap<Address, Box<dyn CallHandler>>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    /// re-entrancy guard: set for the whole commit phase of a batch.
    /// correctness invariant, not an optimization
    pub(super) in_commit: bool,
}

impl Ledger {
    pub fn new(config: LedgerConfig, risk: RiskConfig, oracle: Box<dyn PriceOracle>) -> Self {
        Self {
            config,
            risk,
            markets: Vec::new(),
            token_index: HashMap::new(),
            accounts: HashMap::new(),
            operators: OperatorRegistry::new(),
            expiries: ExpiryTable::new(),
            converters: TrustedConverterRegistry::new(),
            oracle,
            rate_models: HashMap::new(),
            traders: HashMap::new(),
            call_handlers: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
            in_commit: false,
        }
    }

    // ---- clock (injected, deterministic) ----

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    // ---- market registry ----

    /// List a new market. Ids are dense and monotonically assigned; a second
    /// market for the same token is rejected.
    pub fn add_market(
        &mut self,
        config: MarketConfig,
        rate_model: Box<dyn InterestRateModel>,
    ) -> Result<MarketId, LedgerError> {
        if self.token_index.contains_key(&config.token) {
            return Err(MarketError::DuplicateToken(config.token).into());
        }
        let id = MarketId(self.markets.len() as u32);
        self.token_index.insert(config.token.clone(), id);
        let token = config.token.clone();
        let is_isolation_mode = config.is_isolation_mode;
        self.markets
            .push(MarketState::new(id, config, self.current_time));
        self.rate_models.insert(id, rate_model);

        self.emit_event(EventPayload::MarketAdded(MarketAddedEvent {
            market: id,
            token,
            is_isolation_mode,
        }));
        Ok(id)
    }

    pub fn get_market(&self, id: MarketId) -> Result<&MarketState, LedgerError> {
        self.markets
            .get(id.0 as usize)
            .ok_or_else(|| MarketError::MarketNotFound(id).into())
    }

    fn market_mut(&mut self, id: MarketId) -> Result<&mut MarketState, LedgerError> {
        self.markets
            .get_mut(id.0 as usize)
            .ok_or_else(|| MarketError::MarketNotFound(id).into())
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    // ---- admin mutation points the executor reads ----

    pub fn set_is_closing(&mut self, id: MarketId, is_closing: bool) -> Result<(), LedgerError> {
        self.market_mut(id)?.config.is_closing = is_closing;
        Ok(())
    }

    pub fn set_margin_premium(&mut self, id: MarketId, premium: Decimal) -> Result<(), LedgerError> {
        self.market_mut(id)?.config.margin_premium = premium;
        Ok(())
    }

    pub fn set_spread_premium(&mut self, id: MarketId, premium: Decimal) -> Result<(), LedgerError> {
        self.market_mut(id)?.config.spread_premium = premium;
        Ok(())
    }

    pub fn set_max_wei(&mut self, id: MarketId, max_wei: Decimal) -> Result<(), LedgerError> {
        self.market_mut(id)?.config.max_wei = max_wei;
        Ok(())
    }

    /// One-way recycle transition; freezes supply/borrow, allows final unwind.
    pub fn set_recycled(&mut self, id: MarketId) -> Result<(), LedgerError> {
        let now = self.current_time;
        self.market_mut(id)?.set_recycled(now)?;
        self.emit_event(EventPayload::MarketRecycled(MarketRecycledEvent {
            market: id,
        }));
        Ok(())
    }

    // ---- collaborator registration ----

    pub fn register_trader(&mut self, id: Address, trader: Box<dyn Trader>) {
        self.traders.insert(id, trader);
    }

    pub fn register_call_handler(&mut self, id: Address, handler: Box<dyn CallHandler>) {
        self.call_handlers.insert(id, handler);
    }

    pub fn set_token_issuer(&mut self, market: MarketId, issuer: Address) {
        self.converters.set_issuer(market, issuer);
    }

    /// Issuer-gated capability grant for isolation-mode conversion.
    pub fn set_trusted_converter(
        &mut self,
        market: MarketId,
        sender: Address,
        converter: Address,
        trusted: bool,
    ) -> Result<(), TraderError> {
        self.converters.set_trusted(market, sender, converter, trusted)
    }

    pub fn set_local_operator(&mut self, owner: Address, operator: Address, trusted: bool) {
        self.operators.set_local_operator(owner, operator, trusted);
    }

    pub fn set_global_operator(&mut self, operator: Address, trusted: bool) {
        self.operators.set_global_operator(operator, trusted);
    }

    // ---- queries ----

    pub fn get_par(&self, account: AccountId, market: MarketId) -> Par {
        self.accounts
            .get(&account)
            .map(|a| a.get_par(market))
            .unwrap_or_else(Par::zero)
    }

    /// Current value of a balance under the market's stored indices. Call
    /// after a batch (which accrues) for an exact figure.
    pub fn get_wei(&self, account: AccountId, market: MarketId) -> Result<Wei, LedgerError> {
        let par = self.get_par(account, market);
        let state = self.get_market(market)?;
        Ok(crate::balance::par_to_wei(par, &state.index))
    }

    pub fn account_market_count(&self, account: AccountId) -> usize {
        self.accounts
            .get(&account)
            .map(|a| a.market_count())
            .unwrap_or(0)
    }

    pub fn expiry_of(&self, account: AccountId, market: MarketId) -> Option<Timestamp> {
        let par = self.get_par(account, market);
        self.expiries.effective(account, market, par)
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    // ---- accrual ----

    /// Bring one market's indices current. Internal callers run this against
    /// staged state; this entry point exists for keepers and tests.
    pub fn accrue(&mut self, id: MarketId) -> Result<(), LedgerError> {
        let now = self.current_time;
        let (rate, borrow_wei, supply_wei) = {
            let state = self.get_market(id)?;
            let model = self
                .rate_models
                .get(&id)
                .ok_or(MarketError::MarketNotFound(id))?;
            let borrow_wei = state.total_borrow_wei();
            let supply_wei = state.total_supply_wei();
            (model.interest_rate(id, borrow_wei, supply_wei), borrow_wei, supply_wei)
        };
        let earnings_rate = self.risk.earnings_rate;
        let max_index = self.risk.max_index;
        let state = self.market_mut(id)?;
        let new_index = accrue_index(
            &state.index,
            now,
            rate,
            borrow_wei,
            supply_wei,
            earnings_rate,
            max_index,
        )?;
        let changed = new_index != state.index;
        state.index = new_index;
        if changed {
            let borrow_index = new_index.borrow;
            let supply_index = new_index.supply;
            self.emit_event(EventPayload::IndexUpdated(IndexUpdatedEvent {
                market: id,
                borrow_index,
                supply_index,
            }));
        }
        Ok(())
    }

    // ---- events ----

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
