// 9.0 oracle.rs: price lookup boundary. the ledger consumes prices as a pure
// synchronous function market -> price; feed aggregation, staleness policy and
// signing all live outside this crate.

use crate::types::{MarketId, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("No price available for market {0}")]
    NoPrice(MarketId),

    #[error("Oracle reported non-positive price {value} for market {market}")]
    InvalidPrice { market: MarketId, value: Decimal },
}

// Trait for price sources. Implementations can wrap a Chainlink-style feed,
// a median aggregator, or a fixed table for tests.
pub trait PriceOracle {
    fn price(&self, market: MarketId) -> Result<Price, OracleError>;
}

/// Deterministic in-memory oracle. Prices are set explicitly; tests and the
/// simulator drive it by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestOracle {
    prices: HashMap<MarketId, Decimal>,
}

impl TestOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, market: MarketId, value: Decimal) {
        self.prices.insert(market, value);
    }

    /// (raw value, decimals) entry point matching how external feeds report.
    pub fn set_scaled_price(&mut self, market: MarketId, raw: Decimal, decimals: u32) {
        if let Some(price) = Price::from_scaled(raw, decimals) {
            self.prices.insert(market, price.value());
        }
    }
}

impl PriceOracle for TestOracle {
    fn price(&self, market: MarketId) -> Result<Price, OracleError> {
        let value = *self
            .prices
            .get(&market)
            .ok_or(OracleError::NoPrice(market))?;
        Price::new(value).ok_or(OracleError::InvalidPrice { market, value })
    }
}

/// Cloneable handle over a [`TestOracle`] so prices can still be moved after
/// the ledger has taken ownership of its oracle box.
#[derive(Debug, Clone, Default)]
pub struct SharedOracle {
    inner: Rc<RefCell<TestOracle>>,
}

impl SharedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, market: MarketId, value: Decimal) {
        self.inner.borrow_mut().set_price(market, value);
    }

    pub fn set_scaled_price(&self, market: MarketId, raw: Decimal, decimals: u32) {
        self.inner.borrow_mut().set_scaled_price(market, raw, decimals);
    }
}

impl PriceOracle for SharedOracle {
    fn price(&self, market: MarketId) -> Result<Price, OracleError> {
        self.inner.borrow().price(market)
    }
}
