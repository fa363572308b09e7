//! Trade execution boundary and isolation-mode capability grants.
//!
//! A trader prices one hop: given an input amount it reports the output
//! amount. External liquidity, peer-to-peer (internal) liquidity, and the
//! wrap/unwrap converters for isolation-mode markets all implement the same
//! shape; the router decides which kinds are legal on which hops.
//!
//! Trusting a converter for an isolation-mode market is a capability grant
//! made by the market's token issuer, held as a plain market -> converter-set
//! mapping rather than anything dynamic.

use crate::types::{AccountId, Address, MarketId, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraderKind {
    /// Off-ledger liquidity (AMM, RFQ, order book)
    ExternalLiquidity,
    /// Another ledger account acts as the maker
    InternalLiquidity,
    /// Wraps an underlying token into an isolation-mode market
    IsolationModeWrapper,
    /// Unwraps an isolation-mode market back to its underlying
    IsolationModeUnwrapper,
}

/// One hop's trader selection inside a generic trade path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderParam {
    pub kind: TraderKind,
    /// Converter identity; must be a registered trader, and trusted for the
    /// isolation-mode market where applicable
    pub converter: Address,
    /// Which entry of the caller's maker-account list an internal-liquidity
    /// hop trades against
    pub maker_account_index: usize,
    /// Opaque bytes forwarded to the trader
    pub data: Vec<u8>,
}

impl TraderParam {
    pub fn external(converter: Address) -> Self {
        Self {
            kind: TraderKind::ExternalLiquidity,
            converter,
            maker_account_index: 0,
            data: Vec::new(),
        }
    }

    pub fn internal(converter: Address, maker_account_index: usize) -> Self {
        Self {
            kind: TraderKind::InternalLiquidity,
            converter,
            maker_account_index,
            data: Vec::new(),
        }
    }

    pub fn wrapper(converter: Address) -> Self {
        Self {
            kind: TraderKind::IsolationModeWrapper,
            converter,
            maker_account_index: 0,
            data: Vec::new(),
        }
    }

    pub fn unwrapper(converter: Address) -> Self {
        Self {
            kind: TraderKind::IsolationModeUnwrapper,
            converter,
            maker_account_index: 0,
            data: Vec::new(),
        }
    }

    pub fn is_isolation_kind(&self) -> bool {
        matches!(
            self.kind,
            TraderKind::IsolationModeWrapper | TraderKind::IsolationModeUnwrapper
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TraderError {
    #[error("Trader {trader} has no liquidity for {input_market} -> {output_market}")]
    NoLiquidity {
        trader: Address,
        input_market: MarketId,
        output_market: MarketId,
    },

    #[error("Trader {trader} does not serve pair {input_market} -> {output_market}")]
    InvalidPair {
        trader: Address,
        input_market: MarketId,
        output_market: MarketId,
    },

    #[error("Trader {trader} produced a non-positive output {output} for input {input}")]
    NonPositiveOutput {
        trader: Address,
        input: Decimal,
        output: Decimal,
    },

    #[error("Sender {sender} is not the issuer of market {market}")]
    NotIssuer { sender: Address, market: MarketId },
}

/// What a trader sees for one hop. All amounts are positive magnitudes.
#[derive(Debug, Clone)]
pub struct TradeContext<'a> {
    pub input_market: MarketId,
    pub output_market: MarketId,
    pub maker_account: AccountId,
    pub taker_account: AccountId,
    pub input_wei: Wei,
    pub data: &'a [u8],
}

// Pure synchronous pricing function. No suspension, no callback re-entry:
// a trader either returns the output amount or fails.
pub trait Trader {
    fn trade(&self, ctx: &TradeContext<'_>) -> Result<Wei, TraderError>;
}

/// market -> set of converters its issuer trusts. Isolation-mode tokens only
/// enter or leave through these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustedConverterRegistry {
    issuers: HashMap<MarketId, Address>,
    trusted: HashMap<MarketId, HashSet<Address>>,
}

impl TrustedConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_issuer(&mut self, market: MarketId, issuer: Address) {
        self.issuers.insert(market, issuer);
    }

    pub fn set_trusted(
        &mut self,
        market: MarketId,
        sender: Address,
        converter: Address,
        trusted: bool,
    ) -> Result<(), TraderError> {
        match self.issuers.get(&market) {
            Some(issuer) if *issuer == sender => {
                let set = self.trusted.entry(market).or_default();
                if trusted {
                    set.insert(converter);
                } else {
                    set.remove(&converter);
                }
                Ok(())
            }
            _ => Err(TraderError::NotIssuer { sender, market }),
        }
    }

    pub fn is_trusted(&self, market: MarketId, converter: Address) -> bool {
        self.trusted
            .get(&market)
            .is_some_and(|set| set.contains(&converter))
    }
}

/// Fixed-rate trader: output = input * rate. Covers external liquidity, wrap
/// and unwrap conversions in tests and the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantRateTrader {
    pub id: Address,
    /// output units per input unit, keyed by (input, output) pair
    rates: HashMap<(MarketId, MarketId), Decimal>,
}

impl ConstantRateTrader {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, input: MarketId, output: MarketId, rate: Decimal) -> Self {
        self.rates.insert((input, output), rate);
        self
    }
}

impl Trader for ConstantRateTrader {
    fn trade(&self, ctx: &TradeContext<'_>) -> Result<Wei, TraderError> {
        let rate = self
            .rates
            .get(&(ctx.input_market, ctx.output_market))
            .ok_or(TraderError::InvalidPair {
                trader: self.id,
                input_market: ctx.input_market,
                output_market: ctx.output_market,
            })?;
        let output = ctx.input_wei.value() * rate;
        if output <= Decimal::ZERO {
            return Err(TraderError::NonPositiveOutput {
                trader: self.id,
                input: ctx.input_wei.value(),
                output,
            });
        }
        Ok(Wei::new(output))
    }
}

/// Trader that always refuses. Used to exercise abort paths.
#[derive(Debug, Clone, Copy)]
pub struct FailingTrader {
    pub id: Address,
}

impl Trader for FailingTrader {
    fn trade(&self, ctx: &TradeContext<'_>) -> Result<Wei, TraderError> {
        Err(TraderError::NoLiquidity {
            trader: self.id,
            input_market: ctx.input_market,
            output_market: ctx.output_market,
        })
    }
}
